//! Basic library shared by the heater predictive-control crates
//!
//! Provides:
//! - logging bootstrap (console + optional rolling file, non-blocking writers)
//! - system shutdown signalling
//! - configuration file loading

pub mod config_loader;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use error::{Error, Result};
pub use shutdown::{ShutdownController, ShutdownSink};

// Re-export common dependencies
pub use serde;
pub use tokio;
