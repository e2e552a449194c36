//! Configuration management for autohunt.
//!
//! All configuration lives in a single [`Settings`] value constructed once
//! at startup and passed by reference into each component's constructor.
//! There is no process-wide cached configuration.

mod settings;

pub use settings::{
    DatabaseSettings, PathSettings, ScannerSettings, Settings, ToolEntry,
};
