//! Predictive control bridge
//!
//! One [`HeaterPredictControl`] per `heater_pc <name>` section. It owns the
//! compiled template and, on the host connect event, resolves the heater
//! `<name>` once and installs a callback that evaluates the template.
//!
//! ```text
//! Constructed --connect--> Connected --install--> Active
//! ```

use std::sync::Arc;

use common::ShutdownSink;
use heater_template::{ConfigError, ExpressionBinding};
use tracing::info;

use crate::config::ConfigSection;
use crate::heater::{Heater, HeaterRegistry, PredictiveCallback};

/// Lifecycle state of a predictive control section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Template compiled, heater not resolved yet
    Constructed,
    /// Connect event received, heater lookup done
    Connected,
    /// Callback installed on the heater
    Active,
}

pub struct HeaterPredictControl {
    heater_name: String,
    binding: Arc<ExpressionBinding>,
    heater: Option<Arc<Heater>>,
    state: BridgeState,
}

impl HeaterPredictControl {
    /// Build the binding of a section; the heater name is the last word of the section name
    pub fn new(
        section: &ConfigSection,
        shutdown: Arc<dyn ShutdownSink>,
    ) -> Result<Self, ConfigError> {
        let binding = ExpressionBinding::from_options(section.name(), section.options(), shutdown)?;
        Ok(Self::with_binding(section.short_name(), binding))
    }

    pub fn with_binding(heater_name: impl Into<String>, binding: ExpressionBinding) -> Self {
        Self {
            heater_name: heater_name.into(),
            binding: Arc::new(binding),
            heater: None,
            state: BridgeState::Constructed,
        }
    }

    pub fn section(&self) -> &str {
        self.binding.section()
    }

    pub fn heater_name(&self) -> &str {
        &self.heater_name
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn binding(&self) -> &Arc<ExpressionBinding> {
        &self.binding
    }

    /// Heater resolved at connect time
    pub fn heater(&self) -> Option<&Arc<Heater>> {
        self.heater.as_ref()
    }

    /// Resolve the heater and install the predictive callback
    ///
    /// Only the first call does anything; later ones are rejected.
    pub fn handle_connect(&mut self, registry: &HeaterRegistry) -> Result<(), ConfigError> {
        if self.state != BridgeState::Constructed {
            return Err(ConfigError::AlreadyConnected {
                section: self.section().to_string(),
            });
        }
        self.state = BridgeState::Connected;

        let heater = registry
            .lookup(&self.heater_name)
            .ok_or_else(|| ConfigError::unknown_heater(self.section(), &self.heater_name))?;

        let binding = Arc::clone(&self.binding);
        let callback: PredictiveCallback = Arc::new(move || binding.evaluate());
        heater
            .set_predictive_callback(callback)
            .map_err(|_| ConfigError::CallbackConflict {
                section: self.section().to_string(),
                heater: self.heater_name.clone(),
            })?;

        info!("{}: predictive control active on heater {}", self.section(), self.heater_name);
        self.heater = Some(heater);
        self.state = BridgeState::Active;
        Ok(())
    }
}

impl std::fmt::Debug for HeaterPredictControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaterPredictControl")
            .field("section", &self.section())
            .field("heater", &self.heater_name)
            .field("state", &self.state)
            .finish()
    }
}
