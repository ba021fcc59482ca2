//! Heater Predictive Template
//!
//! Template evaluation behind a `heater_pc <name>` section: a Jinja-style
//! `func` template whose rendered text is the predicted control value of a
//! heater.
//!
//! # Building blocks
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`Literal`] | Portable value parsed from `variable_<name>` options |
//! | [`VariableStore`] | Named literals of one section |
//! | [`ScriptingSurface`] | `log`, `get_var`, `set_var` inside templates |
//! | [`ExpressionBinding`] | Compiled `func` template, rendered on demand |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use common::ShutdownController;
//! use heater_template::ExpressionBinding;
//!
//! let options = [
//!     ("func", "{{ set_var('offset', get_var('offset') + 1) }}"),
//!     ("variable_offset", "2.5"),
//! ];
//! let binding = ExpressionBinding::from_options(
//!     "heater_pc extruder",
//!     options,
//!     Arc::new(ShutdownController::new()),
//! )?;
//! assert_eq!(binding.evaluate()?, 3.5);
//! assert_eq!(binding.evaluate()?, 4.5);
//! ```
//!
//! Reading or writing a variable that was never declared is fatal: the
//! shutdown sink is invoked before the render fails with
//! [`EvalError::UndefinedVariable`].

pub mod binding;
pub mod error;
pub mod literal;
pub mod store;
pub mod surface;

pub use binding::{parse_predicted, ExpressionBinding, FUNC_OPTION};
pub use error::{ConfigError, EvalError, Result};
pub use literal::{Literal, LiteralError};
pub use store::{SharedVariableStore, VariableStore, VARIABLE_PREFIX};
pub use surface::{ScriptingSurface, LOG_TARGET};
