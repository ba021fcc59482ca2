//! heatersrv - heater predictive control host
//!
//! Loads `heater` and `heater_pc` sections from a config file, connects
//! every predictive section to its heater and ticks the installed callbacks.

pub mod config;
pub mod error;
pub mod heater;
pub mod host;
pub mod predict;

pub use config::{ConfigSection, HostConfig};
pub use error::{HeaterError, HostError, Result};
pub use heater::{Heater, HeaterRegistry, PredictiveCallback};
pub use host::{Host, Prediction};
pub use predict::{BridgeState, HeaterPredictControl};
