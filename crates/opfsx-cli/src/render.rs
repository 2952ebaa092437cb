//! Plain-text rendering of core types.

use opfsx_core::event::ServiceEvent;
use opfsx_core::fs::pool::PoolName;
use opfsx_core::service::format_bytes;
use opfsx_core::{ApplicationInstance, DirectoryEntry, EntryKind, NavigationState, UsageSnapshot};

fn kind_marker(kind: EntryKind) -> char {
    match kind {
        EntryKind::Directory => 'd',
        EntryKind::File => '-',
        EntryKind::PoolFile => 'p',
    }
}

fn entry_line(entry: &DirectoryEntry) -> String {
    let size = if entry.is_dir() {
        String::new()
    } else {
        format_bytes(entry.size())
    };
    let mut line = format!("{} {:>12}  {}", kind_marker(entry.kind), size, entry.name);
    if entry.is_dir() {
        line.push('/');
    }
    if let Some(subname) = &entry.subname {
        line.push_str(&format!("  -> {subname}"));
    }
    line
}

/// One line per entry followed by a usage footer.
pub fn listing(state: &NavigationState) -> String {
    let mut out = format!("{}\n", state.current_path);
    for entry in &state.current_items {
        out.push_str(&entry_line(entry));
        out.push('\n');
    }
    out.push_str(&usage(&state.usage));
    out
}

pub fn usage(usage: &UsageSnapshot) -> String {
    format!(
        "usage: {} / {} ({:.2}%)",
        usage.usage_label, usage.quota_label, usage.usage_percent
    )
}

pub fn pool_name(path: &str, name: Option<&PoolName>) -> String {
    match name {
        Some(PoolName::Named(name)) => format!("{path}: pool file for {name}"),
        Some(PoolName::Unassociated) => format!("{path}: unassociated pool file"),
        None => format!("{path}: not a pool file"),
    }
}

pub fn instance(instance: &ApplicationInstance, app_name: &str, language: &str) -> String {
    format!(
        "{} opened in {app_name} ({language}) as {}",
        instance.file_path, instance.id
    )
}

/// Transfer notices; other events render as `None`.
pub fn event(event: &ServiceEvent) -> Option<String> {
    match event {
        ServiceEvent::TransferDone { path, .. } => Some(format!("wrote {path}")),
        ServiceEvent::OperationFailed { operation, error } => {
            Some(format!("{operation} failed: {error}"))
        }
        _ => None,
    }
}
