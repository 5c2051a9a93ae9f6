//! Application bootstrap and lifecycle management.
//!
//! This module provides the `TrailfixApp` type which validates the
//! configuration, constructs the tracking session and owns its task until
//! shutdown.
//!
//! # Example
//!
//! ```ignore
//! use trailfix::app::{AppConfig, TrailfixApp};
//! use trailfix::config::ConfigFile;
//!
//! let config = AppConfig::from_config_file(&ConfigFile::load()?)?;
//! let app = TrailfixApp::start(config, collaborators).await?;
//!
//! app.handle().start_scan()?;
//!
//! // Graceful shutdown
//! let summary = app.shutdown().await?;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::TrailfixApp;
pub use config::AppConfig;
pub use error::AppError;
