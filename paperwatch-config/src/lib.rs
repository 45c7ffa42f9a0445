//! Configuration for Paperwatch.
//!
//! Settings come from an optional TOML file, overlaid by `PAPERWATCH_*`
//! environment variables (optionally seeded from a `.env` file), with
//! built-in defaults for everything else.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, error::ConfigLoadError};
pub use models::{Config, ConfigMetadata, WatchSettings};
pub use validation::{ConfigWarning, ConfigWarnings};
