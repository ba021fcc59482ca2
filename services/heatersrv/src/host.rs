//! Host lifecycle
//!
//! Construction from config, the one-shot connect event and the control
//! tick. Any predictive callback failure during a tick shuts the whole
//! control system down.

use std::path::Path;
use std::sync::Arc;

use common::{ShutdownController, ShutdownSink};
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::error::{HeaterError, Result};
use crate::heater::{Heater, HeaterRegistry};
use crate::predict::HeaterPredictControl;

/// One predicted value produced by a tick
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub heater: String,
    /// Value returned by the callback
    pub value: f64,
    /// Value clamped to `[0, max_power]`
    pub power: f64,
}

pub struct Host {
    config: HostConfig,
    heaters: HeaterRegistry,
    controls: Vec<HeaterPredictControl>,
    shutdown: ShutdownController,
    connected: bool,
}

impl Host {
    /// Load a config file and build the host
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(HostConfig::load(path)?)
    }

    pub fn from_config(config: HostConfig) -> Result<Self> {
        Self::with_shutdown(config, ShutdownController::new())
    }

    /// Build heaters and predictive sections; any invalid section aborts
    pub fn with_shutdown(config: HostConfig, shutdown: ShutdownController) -> Result<Self> {
        let mut heaters = HeaterRegistry::new();
        for (name, settings) in &config.heater {
            heaters.register(Heater::new(name, settings.max_power))?;
        }

        let sink: Arc<dyn ShutdownSink> = Arc::new(shutdown.clone());
        let controls = config
            .predictive_sections()
            .iter()
            .map(|section| HeaterPredictControl::new(section, Arc::clone(&sink)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        info!(
            "Host built: {} heater(s), {} predictive section(s)",
            heaters.len(),
            controls.len()
        );
        Ok(Self {
            config,
            heaters,
            controls,
            shutdown,
            connected: false,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn heaters(&self) -> &HeaterRegistry {
        &self.heaters
    }

    pub fn controls(&self) -> &[HeaterPredictControl] {
        &self.controls
    }

    pub fn shutdown(&self) -> &ShutdownController {
        &self.shutdown
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Deliver the connect event to every predictive section
    ///
    /// Stops at the first failure; the host must not be started after that.
    pub fn connect(&mut self) -> Result<()> {
        for control in &mut self.controls {
            control.handle_connect(&self.heaters)?;
        }
        self.connected = true;
        info!("Connected {} predictive section(s)", self.controls.len());
        Ok(())
    }

    /// Invoke every installed predictive callback once
    ///
    /// The first failure invokes the system shutdown and is returned.
    pub fn tick(&self) -> std::result::Result<Vec<Prediction>, HeaterError> {
        if self.shutdown.is_shutdown() {
            debug!("Tick skipped, control system is shut down");
            return Ok(Vec::new());
        }

        let mut predictions = Vec::new();
        for heater in self.heaters.iter() {
            let Some(result) = heater.predict() else {
                continue;
            };
            match result {
                Ok(value) => {
                    let power = heater.clamp_power(value);
                    debug!("Heater {}: predicted {} -> power {}", heater.name(), value, power);
                    predictions.push(Prediction {
                        heater: heater.name().to_string(),
                        value,
                        power,
                    });
                },
                Err(source) => {
                    let err = HeaterError::Predict {
                        heater: heater.name().to_string(),
                        source,
                    };
                    warn!("{}", err);
                    self.shutdown.invoke_shutdown(&err.to_string());
                    return Err(err);
                },
            }
        }
        Ok(predictions)
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("heaters", &self.heaters)
            .field("controls", &self.controls)
            .field("connected", &self.connected)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::config::{HeaterSettings, OptionValue};
    use crate::error::HostError;
    use heater_template::{ConfigError, EvalError};
    use std::collections::BTreeMap;

    fn config(sections: &[(&str, &[(&str, &str)])]) -> HostConfig {
        let mut config = HostConfig::default();
        config
            .heater
            .insert("extruder".to_string(), HeaterSettings { max_power: 0.5 });
        config
            .heater
            .insert("heater_bed".to_string(), HeaterSettings::default());
        for (name, options) in sections {
            let options: BTreeMap<String, OptionValue> = options
                .iter()
                .map(|(k, v)| (k.to_string(), OptionValue::Text(v.to_string())))
                .collect();
            config.heater_pc.insert(name.to_string(), options);
        }
        config
    }

    #[test]
    fn test_tick_clamps_to_max_power() {
        let mut host = Host::from_config(config(&[(
            "extruder",
            &[("func", "{{ set_var('offset', get_var('offset') + 1) }}"), ("variable_offset", "-1.5")],
        )]))
        .unwrap();
        host.connect().unwrap();
        assert!(host.is_connected());

        let first = host.tick().unwrap();
        assert_eq!(
            first,
            vec![Prediction {
                heater: "extruder".to_string(),
                value: -0.5,
                power: 0.0
            }]
        );
        let second = host.tick().unwrap();
        assert_eq!(second[0].value, 0.5);
        assert_eq!(second[0].power, 0.5);
        let third = host.tick().unwrap();
        assert_eq!(third[0].value, 1.5);
        assert_eq!(third[0].power, 0.5);
    }

    #[test]
    fn test_heater_without_section_is_skipped() {
        let mut host = Host::from_config(config(&[])).unwrap();
        host.connect().unwrap();
        assert!(host.tick().unwrap().is_empty());
    }

    #[test]
    fn test_callback_error_shuts_down() {
        let mut host =
            Host::from_config(config(&[("heater_bed", &[("func", "abc")])])).unwrap();
        host.connect().unwrap();

        let err = host.tick().unwrap_err();
        assert_eq!(
            err,
            HeaterError::Predict {
                heater: "heater_bed".to_string(),
                source: EvalError::NonNumericResult {
                    text: "abc".to_string()
                },
            }
        );
        assert!(host.shutdown().is_shutdown());
        assert!(host.shutdown().reason().unwrap().contains("heater_bed"));

        // Nothing runs after shutdown
        assert!(host.tick().unwrap().is_empty());
    }

    #[test]
    fn test_undefined_variable_reason_wins() {
        let mut host = Host::from_config(config(&[(
            "extruder",
            &[("func", "{{ get_var('nope') }}")],
        )]))
        .unwrap();
        host.connect().unwrap();

        assert!(host.tick().is_err());
        let reason = host.shutdown().reason().unwrap();
        assert!(reason.starts_with("Undefined variable 'nope'"), "reason: {}", reason);
    }

    #[test]
    fn test_unknown_heater_fails_connect() {
        let mut host =
            Host::from_config(config(&[("chamber", &[("func", "{{ 1 }}")])])).unwrap();

        assert!(matches!(
            host.connect(),
            Err(HostError::Config(ConfigError::UnknownHeater { ref heater, .. })) if heater == "chamber"
        ));
        assert!(!host.is_connected());
        assert!(host.heaters().iter().all(|h| !h.has_predictive_callback()));
    }

    #[test]
    fn test_invalid_section_fails_construction() {
        let result = Host::from_config(config(&[(
            "extruder",
            &[("func", "{{ 1 }}"), ("variable_x", "not_a_literal")],
        )]));
        assert!(matches!(
            result,
            Err(HostError::Config(ConfigError::InvalidLiteral { .. }))
        ));
    }
}
