//! Scripting primitives exposed to a predictive template
//!
//! | Function | Returns | On undeclared name |
//! |----------|---------|--------------------|
//! | `log(text)` | `""` | - |
//! | `get_var(name)` | stored value | system shutdown |
//! | `set_var(name, value)` | `value` | system shutdown |

use std::sync::Arc;

use common::ShutdownSink;
use minijinja::{Environment, ErrorKind, Value};
use tracing::{debug, info};

use crate::error::{EvalError, Result};
use crate::literal::Literal;
use crate::store::SharedVariableStore;

/// Log target of the `log` primitive
pub const LOG_TARGET: &str = "heater_pc";

/// Primitives of one section, closed over its variable store
pub struct ScriptingSurface {
    section: String,
    store: SharedVariableStore,
    shutdown: Arc<dyn ShutdownSink>,
}

impl ScriptingSurface {
    pub fn new(store: SharedVariableStore, shutdown: Arc<dyn ShutdownSink>) -> Arc<Self> {
        let section = store.lock().section().to_string();
        Arc::new(Self {
            section,
            store,
            shutdown,
        })
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn store(&self) -> &SharedVariableStore {
        &self.store
    }

    /// Write `text` at INFO level; always returns an empty string
    pub fn log(&self, text: &str) -> String {
        info!(target: LOG_TARGET, section = %self.section, "{}", text);
        String::new()
    }

    /// Read a declared variable
    pub fn get_var(&self, name: &str) -> Result<Literal> {
        let value = self.store.lock().get(name).cloned();
        value.ok_or_else(|| self.undefined(name))
    }

    /// Replace a declared variable, returning the new value
    pub fn set_var(&self, name: &str, value: Literal) -> Result<Literal> {
        self.require_declared(name)?;
        self.store.lock().set(name, value.clone());
        Ok(value)
    }

    fn set_template_value(&self, name: &str, value: Value) -> Result<Value> {
        self.require_declared(name)?;
        let literal = Literal::from_template_value(&value)
            .map_err(|e| EvalError::render(format!("set_var('{}'): {}", name, e)))?;
        debug!("{}: set_var('{}') = {}", self.section, name, literal);
        self.store.lock().set(name, literal);
        Ok(value)
    }

    fn require_declared(&self, name: &str) -> Result<()> {
        if self.store.lock().contains(name) {
            Ok(())
        } else {
            Err(self.undefined(name))
        }
    }

    // The store lock is released before the shutdown sink runs
    fn undefined(&self, name: &str) -> EvalError {
        self.shutdown.invoke_shutdown(&format!(
            "Undefined variable '{}' in section '{}'",
            name, self.section
        ));
        EvalError::undefined_variable(name)
    }

    /// Register `log`, `get_var` and `set_var` in a template environment
    pub fn register(self: &Arc<Self>, env: &mut Environment<'static>) {
        let surface = Arc::clone(self);
        env.add_function("log", move |text: Value| -> String {
            surface.log(&text.to_string())
        });

        let surface = Arc::clone(self);
        env.add_function(
            "get_var",
            move |name: String| -> std::result::Result<Value, minijinja::Error> {
                surface
                    .get_var(&name)
                    .map(|value| value.to_template_value())
                    .map_err(into_template_error)
            },
        );

        let surface = Arc::clone(self);
        env.add_function(
            "set_var",
            move |name: String, value: Value| -> std::result::Result<Value, minijinja::Error> {
                surface
                    .set_template_value(&name, value)
                    .map_err(into_template_error)
            },
        );
    }
}

impl std::fmt::Debug for ScriptingSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptingSurface")
            .field("section", &self.section)
            .field("variables", &self.store.lock().len())
            .finish()
    }
}

/// Carry an [`EvalError`] through the template engine as the error source
fn into_template_error(err: EvalError) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, err.to_string()).with_source(err)
}

/// Recover the [`EvalError`] raised by a primitive, if any
pub(crate) fn eval_error_of(err: &minijinja::Error) -> Option<EvalError> {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(eval) = cause.downcast_ref::<EvalError>() {
            return Some(eval.clone());
        }
        source = cause.source();
    }
    None
}
