//! # LevelForge Core
//!
//! State-management core for the LevelForge level editor:
//!
//! - [`reconcile`]: identity-preserving rebuild of view objects from a data model
//! - [`abstract_editor`]: commands, undo history, selection and the edit context
//! - [`observer`]: observer lists used for notifications
//! - [`task_queue`]: the deferred render-task queue drained once per tick
//! - [`math`]: transform math aliases

pub mod abstract_editor;
pub mod math;
pub mod observer;
pub mod reconcile;
pub mod task_queue;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logs the core version once the host has installed a logger.
pub fn init() {
    log::info!("LevelForge Core v{} initialized", VERSION);
}
