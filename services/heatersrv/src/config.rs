//! Host configuration
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [run]
//! interval_ms = 300
//!
//! [heater.extruder]
//! max_power = 1.0
//!
//! [heater_pc.extruder]
//! func = "{{ set_var('offset', get_var('offset') + 1) }}"
//! variable_offset = "2.5"
//! ```
//!
//! Every `[heater_pc.<name>]` table becomes a section named
//! `heater_pc <name>` whose option values are kept as raw text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::config_loader;
use common::logging::LogConfig;
use serde::Deserialize;
use tracing::debug;

use crate::error::{HostError, Result};

/// Environment variable prefix for overrides (`HEATERSRV_RUN__INTERVAL_MS=100`)
pub const ENV_PREFIX: &str = "HEATERSRV_";

/// Section prefix of predictive control sections
pub const PREDICTIVE_SECTION_PREFIX: &str = "heater_pc";

pub const DEFAULT_INTERVAL_MS: u64 = 300;

/// Top-level host configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub log: LogSettings,
    pub run: RunSettings,
    pub heater: BTreeMap<String, HeaterSettings>,
    pub heater_pc: BTreeMap<String, BTreeMap<String, OptionValue>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            dir: None,
        }
    }
}

impl LogSettings {
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            service_name: "heatersrv".to_string(),
            level: self.level.clone(),
            log_dir: self.dir.clone(),
            enable_json: self.json,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Tick interval of the run loop
    pub interval_ms: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaterSettings {
    /// Upper bound of the applied power, in `(0, 1]`
    pub max_power: f64,
}

impl Default for HeaterSettings {
    fn default() -> Self {
        Self { max_power: 1.0 }
    }
}

/// A section option as written in the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<OptionValue>),
    Map(BTreeMap<String, OptionValue>),
}

impl OptionValue {
    /// Raw option text, in the host's literal syntax
    pub fn to_raw(&self) -> String {
        match self {
            OptionValue::Bool(true) => "True".to_string(),
            OptionValue::Bool(false) => "False".to_string(),
            OptionValue::Int(v) => v.to_string(),
            // Debug keeps the decimal point: 1.0 -> "1.0"
            OptionValue::Float(v) => format!("{:?}", v),
            OptionValue::Text(s) => s.clone(),
            OptionValue::List(_) | OptionValue::Map(_) => self.to_nested_raw(),
        }
    }

    /// Literal text for a value inside a native array or table, where text
    /// is a string rather than literal syntax
    fn to_nested_raw(&self) -> String {
        match self {
            OptionValue::Text(s) => quote(s),
            OptionValue::List(items) => {
                let items: Vec<String> = items.iter().map(Self::to_nested_raw).collect();
                format!("[{}]", items.join(", "))
            },
            OptionValue::Map(entries) => {
                let entries: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quote(k), v.to_nested_raw()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            },
            scalar => scalar.to_raw(),
        }
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A named config section with raw option text
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSection {
    name: String,
    options: Vec<(String, String)>,
}

impl ConfigSection {
    pub fn new<I, K, V>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            options: options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Full section name, e.g. `heater_pc extruder`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last word of the section name
    pub fn short_name(&self) -> &str {
        self.name.split_whitespace().last().unwrap_or(&self.name)
    }

    pub fn get(&self, option: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == option)
            .map(|(_, v)| v.as_str())
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> + Clone {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl HostConfig {
    /// Load from a TOML, YAML or JSON file with `HEATERSRV_` overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = config_loader::load_config_from_file(path, ENV_PREFIX)?;
        config.validate()?;
        debug!(
            "Loaded {}: {} heater(s), {} predictive section(s)",
            path.display(),
            config.heater.len(),
            config.heater_pc.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.interval_ms == 0 {
            return Err(HostError::load("run.interval_ms must be greater than 0"));
        }
        for (name, heater) in &self.heater {
            if !(heater.max_power > 0.0 && heater.max_power <= 1.0) {
                return Err(HostError::load(format!(
                    "heater.{}.max_power must be in (0, 1], got {}",
                    name, heater.max_power
                )));
            }
        }
        Ok(())
    }

    /// `heater_pc <name>` sections in name order
    pub fn predictive_sections(&self) -> Vec<ConfigSection> {
        self.heater_pc
            .iter()
            .map(|(name, options)| {
                ConfigSection::new(
                    format!("{} {}", PREDICTIVE_SECTION_PREFIX, name),
                    options.iter().map(|(k, v)| (k.clone(), v.to_raw())),
                )
            })
            .collect()
    }
}
