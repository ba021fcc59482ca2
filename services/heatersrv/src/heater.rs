//! Heaters and the heater registry

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use heater_template::EvalError;
use tracing::debug;

use crate::error::{HeaterError, HostError};

/// Predicted control value source installed on a heater
pub type PredictiveCallback = Arc<dyn Fn() -> Result<f64, EvalError> + Send + Sync>;

/// A controllable heater
pub struct Heater {
    name: String,
    max_power: f64,
    callback: OnceLock<PredictiveCallback>,
}

impl Heater {
    pub fn new(name: impl Into<String>, max_power: f64) -> Self {
        Self {
            name: name.into(),
            max_power,
            callback: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    /// Install the predictive callback; only one may ever be installed
    pub fn set_predictive_callback(&self, callback: PredictiveCallback) -> Result<(), HeaterError> {
        self.callback
            .set(callback)
            .map_err(|_| HeaterError::CallbackAlreadyInstalled {
                heater: self.name.clone(),
            })?;
        debug!("Heater {}: predictive callback installed", self.name);
        Ok(())
    }

    pub fn has_predictive_callback(&self) -> bool {
        self.callback.get().is_some()
    }

    /// Invoke the predictive callback, `None` if none is installed
    ///
    /// Callback errors are returned as-is.
    pub fn predict(&self) -> Option<Result<f64, EvalError>> {
        self.callback.get().map(|callback| callback())
    }

    /// Clamp a predicted value to the applicable power range `[0, max_power]`
    pub fn clamp_power(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, self.max_power)
    }
}

impl std::fmt::Debug for Heater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heater")
            .field("name", &self.name)
            .field("max_power", &self.max_power)
            .field("predictive", &self.has_predictive_callback())
            .finish()
    }
}

/// Heaters by name
#[derive(Debug, Default)]
pub struct HeaterRegistry {
    heaters: BTreeMap<String, Arc<Heater>>,
}

impl HeaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, heater: Heater) -> Result<Arc<Heater>, HostError> {
        if self.heaters.contains_key(heater.name()) {
            return Err(HostError::DuplicateHeater(heater.name().to_string()));
        }
        let heater = Arc::new(heater);
        self.heaters
            .insert(heater.name().to_string(), Arc::clone(&heater));
        Ok(heater)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Heater>> {
        self.heaters.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Heater>> {
        self.heaters.values()
    }

    pub fn len(&self) -> usize {
        self.heaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heaters.is_empty()
    }
}
