//! Error types for heatersrv

use heater_template::{ConfigError, EvalError};
use thiserror::Error;

/// Heater-level failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeaterError {
    #[error("Heater {heater} already has a predictive callback")]
    CallbackAlreadyInstalled { heater: String },

    #[error("Predictive callback of heater {heater} failed: {source}")]
    Predict {
        heater: String,
        #[source]
        source: EvalError,
    },
}

/// Host-level failures
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error(transparent)]
    Heater(#[from] HeaterError),

    #[error("Heater {0} is defined more than once")]
    DuplicateHeater(String),
}

impl HostError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }
}

impl From<common::Error> for HostError {
    fn from(err: common::Error) -> Self {
        Self::Load(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
