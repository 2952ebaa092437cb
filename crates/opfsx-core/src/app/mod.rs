//! Applications that open files from the explorer.
//!
//! [`registry::ApplicationRegistry`] maps file extensions to handler
//! applications and tracks the instances currently open.

pub mod language;
pub mod registry;

pub use language::language_for;
pub use registry::{AppKind, Application, ApplicationInstance, ApplicationRegistry};
