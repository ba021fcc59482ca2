//! Error types for heater-template

use thiserror::Error;

/// Configuration errors, raised at construction or connect time
///
/// The host aborts startup on any of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Option '{option}' in section '{section}' is not a valid literal: {reason}")]
    InvalidLiteral {
        section: String,
        option: String,
        reason: String,
    },

    #[error("Option '{option}' in section '{section}' must be specified")]
    MissingOption { section: String, option: String },

    #[error("Error loading template '{section}:{option}': {reason}")]
    Template {
        section: String,
        option: String,
        reason: String,
    },

    #[error("Heater {heater} is not registered (section '{section}')")]
    UnknownHeater { section: String, heater: String },

    #[error("Section '{section}' is already connected")]
    AlreadyConnected { section: String },

    #[error("Heater {heater} already has a predictive callback (section '{section}')")]
    CallbackConflict { section: String, heater: String },
}

impl ConfigError {
    pub fn invalid_literal(
        section: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidLiteral {
            section: section.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_option(section: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption {
            section: section.into(),
            option: option.into(),
        }
    }

    pub fn template(
        section: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Template {
            section: section.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_heater(section: impl Into<String>, heater: impl Into<String>) -> Self {
        Self::UnknownHeater {
            section: section.into(),
            heater: heater.into(),
        }
    }
}

/// Evaluation errors, raised while rendering a bound template
///
/// `UndefinedVariable` is only ever returned after the system shutdown has
/// already been invoked; the error value exists so the caller can tell why
/// the render stopped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Template result is not a number: '{text}'")]
    NonNumericResult { text: String },

    #[error("Template render error: {0}")]
    Render(String),
}

impl EvalError {
    pub fn undefined_variable(name: impl Into<String>) -> Self {
        Self::UndefinedVariable { name: name.into() }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Whether the system shutdown was triggered by this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UndefinedVariable { .. })
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
