//! opfsx — command-line explorer for a private sandboxed store.
//!
//! The private store is emulated by a directory on disk (`[storage] root`).
//! Host paths given to `import` and `export` are opened as separate volumes.

mod render;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::TryRecvError};

use opfsx_core::event::{Command, ServiceEvent};
use opfsx_core::fs::path::{resolve, validate_absolute};
use opfsx_core::fs::pool;
use opfsx_core::{
    language_for, ApplicationRegistry, Config, DiskStore, FileService, FixedPicker, Store,
};

#[derive(Parser)]
#[command(name = "opfsx")]
#[command(about = "Browse and manage a private sandboxed store")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a directory (parents included)
    Mkdir { path: String },
    /// Create an empty file
    Touch { path: String },
    /// Remove entries
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Copy entries into a directory
    Cp {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },
    /// Move entries into a directory
    Mv {
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,
    },
    /// Rename an entry in place
    Rename { path: String, name: String },
    /// Copy host files or directories into the store
    Import {
        #[arg(required = true)]
        host_paths: Vec<PathBuf>,
        /// Destination directory in the store
        #[arg(long, default_value = "/")]
        into: String,
    },
    /// Copy store entries to a host directory
    Export {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Host destination directory
        #[arg(long)]
        to: PathBuf,
    },
    /// Print a file as text
    Cat { path: String },
    /// Decode a pool file header
    Inspect { path: String },
    /// Show which application would open a file
    Open {
        path: String,
        /// Application id
        #[arg(long)]
        app: Option<String>,
    },
    /// Show storage usage
    Usage,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Logs to a file so command output stays clean. `RUST_LOG` overrides the
/// default `debug` level.
fn init_tracing(log_file: &Path) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();
    Ok(())
}

/// Splits the last item off `paths` as the destination.
fn split_destination(mut paths: Vec<String>) -> anyhow::Result<(Vec<String>, String)> {
    let dest = paths.pop().context("missing destination")?;
    Ok((paths, dest))
}

/// Opens the parent of `host_path` as a volume and returns the store path of
/// `host_path` inside it.
async fn open_host_volume(host_path: &Path) -> anyhow::Result<(DiskStore, String)> {
    let host_path = tokio::fs::canonicalize(host_path)
        .await
        .with_context(|| format!("resolving {}", host_path.display()))?;
    let name = host_path
        .file_name()
        .context("cannot import a filesystem root")?
        .to_string_lossy()
        .into_owned();
    let parent = host_path.parent().context("cannot import a filesystem root")?;
    let volume = DiskStore::open(parent).await?;
    Ok((volume, resolve(&["/", name.as_str()])))
}

fn print_events(rx: &mut broadcast::Receiver<ServiceEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => {
                if let Some(line) = render::event(&event) {
                    eprintln!("{line}");
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event receiver lagged");
            }
            Err(_) => break,
        }
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let store = DiskStore::open(&config.storage.root)
        .await?
        .with_quota(config.storage.quota_bytes)
        .with_chunk_size(config.transfer.chunk_size);
    let service = FileService::new(Arc::new(store), &config)?;
    let mut events = service.subscribe();

    match cli.command {
        Commands::Ls { path, json } => {
            service.jump_absolute(&path).await?;
            let state = service.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(state.as_ref())?);
            } else {
                println!("{}", render::listing(&state));
            }
        }
        Commands::Mkdir { path } => service.dispatch(Command::Mkdir(path)).await?,
        Commands::Touch { path } => service.dispatch(Command::CreateFile(path)).await?,
        Commands::Rm { paths } => service.dispatch(Command::Remove(paths)).await?,
        Commands::Cp { paths } => {
            let (paths, dest) = split_destination(paths)?;
            service.dispatch(Command::Copy(paths, dest)).await?;
        }
        Commands::Mv { paths } => {
            let (paths, dest) = split_destination(paths)?;
            service.dispatch(Command::Move(paths, dest)).await?;
        }
        Commands::Rename { path, name } => service.dispatch(Command::Rename(path, name)).await?,
        Commands::Import { host_paths, into } => {
            service.jump_absolute(&into).await?;
            for host_path in &host_paths {
                let (volume, source) = open_host_volume(host_path).await?;
                service.save(&volume, &[source]).await?;
                print_events(&mut events);
            }
        }
        Commands::Export { paths, to } => {
            let volume: Arc<dyn Store> = Arc::new(DiskStore::open(&to).await?);
            let picker = FixedPicker::new(volume, "/");
            service.save_to_disk(&paths, &picker).await?;
        }
        Commands::Cat { path } => print!("{}", service.read_text(&path).await?),
        Commands::Inspect { path } => {
            let target = validate_absolute(&path)?;
            let decoded = pool::decode_file(service.store().as_ref(), &target).await?;
            println!("{}", render::pool_name(&target, decoded.as_ref()));
        }
        Commands::Open { path, app } => {
            let target = validate_absolute(&path)?;
            service.store().stat(&target).await?;
            let mut registry = ApplicationRegistry::with_builtin();
            let instance = registry
                .open_file(&target, app.as_deref())?
                .cloned()
                .with_context(|| format!("no application can open {target}"))?;
            let app_name = registry
                .find(&instance.app_id)
                .map(|a| a.name.clone())
                .unwrap_or_default();
            println!(
                "{}",
                render::instance(&instance, &app_name, language_for(&instance.ext_name))
            );
        }
        Commands::Usage => {
            service.refresh().await?;
            println!("{}", render::usage(&service.snapshot().usage));
        }
    }

    print_events(&mut events);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.log.file)?;

    tracing::debug!(root = %config.storage.root.display(), "starting");
    run(cli, config).await
}
