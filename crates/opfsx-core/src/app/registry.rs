//! Application registry: which handler opens which file.
//!
//! Resolution is "first matching registrant wins". An application matches a
//! file if its `supported_file_types` contains the file's extension or the
//! wildcard `"*"`.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::fs::path;

const WILDCARD: &str = "*";

/// How an application presents a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AppKind {
    TextEditor,
    ImageViewer,
}

/// A registered handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    /// Extensions with leading dot, or `"*"` for any file.
    pub supported_file_types: Vec<String>,
    pub kind: AppKind,
}

impl Application {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        supported_file_types: &[&str],
        kind: AppKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supported_file_types: supported_file_types.iter().map(|s| s.to_string()).collect(),
            kind,
        }
    }

    /// The built-in text editor, which accepts any file.
    pub fn text_editor() -> Self {
        Self::new("editor", "Text Editor", &[WILDCARD], AppKind::TextEditor)
    }

    /// The built-in image viewer.
    pub fn image_viewer() -> Self {
        Self::new(
            "image-viewer",
            "Image Viewer",
            &[".png", ".jpg", ".jpeg"],
            AppKind::ImageViewer,
        )
    }

    /// Returns `true` if this application can open files with `ext`.
    pub fn supports(&self, ext: &str) -> bool {
        self.supported_file_types
            .iter()
            .any(|t| t == WILDCARD || t.eq_ignore_ascii_case(ext))
    }
}

/// An open file in an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationInstance {
    pub id: String,
    pub app_id: String,
    pub file_path: String,
    pub ext_name: String,
    /// Tab title; the file's base name.
    pub show_name: String,
}

/// Registered applications plus the instances they have open.
#[derive(Debug, Default)]
pub struct ApplicationRegistry {
    apps: Vec<Application>,
    instances: Vec<ApplicationInstance>,
    active: Option<String>,
}

impl ApplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in image viewer and text editor, in that
    /// order, so images prefer the viewer.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Application::image_viewer());
        registry.register(Application::text_editor());
        registry
    }

    /// Registers `app`. Ignored if an application with the same id exists.
    pub fn register(&mut self, app: Application) {
        if self.find(&app.id).is_none() {
            tracing::debug!(id = %app.id, "registered application");
            self.apps.push(app);
        }
    }

    pub fn find(&self, id: &str) -> Option<&Application> {
        self.apps.iter().find(|app| app.id == id)
    }

    /// Applications able to open `ext`, in registration order.
    pub fn applications_for(&self, ext: &str) -> Vec<&Application> {
        self.apps.iter().filter(|app| app.supports(ext)).collect()
    }

    /// Opens `file_path`, with `app_id` or the first matching application.
    ///
    /// Re-opening a path already open in the same application re-activates
    /// the existing instance. Returns `Ok(None)` when no application
    /// matches.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if `app_id` names no registered application.
    pub fn open_file(
        &mut self,
        file_path: &str,
        app_id: Option<&str>,
    ) -> CoreResult<Option<&ApplicationInstance>> {
        let ext = path::extname(file_path);
        let app_id = match app_id {
            Some(id) => id.to_string(),
            None => match self.applications_for(&ext).first() {
                Some(app) => app.id.clone(),
                None => return Ok(None),
            },
        };

        if let Some(index) = self.position(|i| i.app_id == app_id && i.file_path == file_path) {
            self.active = Some(self.instances[index].id.clone());
            return Ok(self.instances.get(index));
        }

        if self.find(&app_id).is_none() {
            return Err(CoreError::NotFound(format!("application {app_id}")));
        }

        let instance = ApplicationInstance {
            id: Uuid::new_v4().to_string(),
            app_id,
            file_path: file_path.to_string(),
            ext_name: ext,
            show_name: path::basename(file_path, None),
        };
        tracing::debug!(id = %instance.id, path = file_path, "opened application instance");
        self.active = Some(instance.id.clone());
        self.instances.push(instance);
        Ok(self.instances.last())
    }

    /// Closes an instance, clearing the active instance if it was this one.
    pub fn close(&mut self, instance_id: &str) -> CoreResult<ApplicationInstance> {
        let index = self
            .position(|i| i.id == instance_id)
            .ok_or_else(|| CoreError::NotFound(format!("instance {instance_id}")))?;
        if self.active.as_deref() == Some(instance_id) {
            self.active = None;
        }
        Ok(self.instances.remove(index))
    }

    /// Closes every instance and returns them.
    pub fn close_all(&mut self) -> Vec<ApplicationInstance> {
        self.active = None;
        std::mem::take(&mut self.instances)
    }

    /// Makes an open instance the active one.
    pub fn activate(&mut self, instance_id: &str) -> CoreResult<()> {
        if self.position(|i| i.id == instance_id).is_none() {
            return Err(CoreError::NotFound(format!("instance {instance_id}")));
        }
        self.active = Some(instance_id.to_string());
        Ok(())
    }

    pub fn active(&self) -> Option<&ApplicationInstance> {
        let id = self.active.as_deref()?;
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn instances(&self) -> &[ApplicationInstance] {
        &self.instances
    }

    fn position(&self, predicate: impl Fn(&ApplicationInstance) -> bool) -> Option<usize> {
        self.instances.iter().position(predicate)
    }
}
