//! # LevelForge Editor
//!
//! Course editing built on the LevelForge core:
//!
//! - [`level`]: the course data model (actors, rails, groups)
//! - [`view`]: view objects rebuilt from the course
//! - [`assets`]: the session's model cache and GPU uploads
//! - [`commands`]: recorded, reversible course edits
//! - [`document`]: the editable document every change goes through
//! - [`history_panel`]: text rendering of the undo/redo stacks
//! - [`config`]: TOML editor configuration
//! - [`session`]: the scripted headless session run by the binary

pub mod assets;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod history_panel;
pub mod level;
pub mod session;
pub mod view;

pub use config::EditorConfig;
pub use document::CourseDocument;
pub use error::{ConfigError, LevelError};
