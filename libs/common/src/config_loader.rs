//! Configuration loading helper functions
//!
//! Loads a host configuration file with figment. The format is picked from
//! the file extension and environment variables layered on top.

use crate::error::{Error, Result};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Separator for nested keys in environment overrides (`PREFIX_RUN__INTERVAL_MS`)
pub const ENV_NESTING_SEPARATOR: &str = "__";

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::config("Config file must have an extension"))?;

        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!(
                "Unsupported config file format: {}",
                other
            ))),
        }
    }
}

/// Build the figment for a config file plus prefixed environment overrides
///
/// Priority (highest to lowest):
/// 1. Environment variables starting with `env_prefix`
/// 2. The config file
pub fn figment_for_file(path: &Path, env_prefix: &str) -> Result<Figment> {
    if !path.is_file() {
        return Err(Error::config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let format = ConfigFormat::from_path(path)?;
    debug!("Config format for {}: {:?}", path.display(), format);

    let figment = match format {
        ConfigFormat::Toml => Figment::new().merge(Toml::file(path)),
        ConfigFormat::Yaml => Figment::new().merge(Yaml::file(path)),
        ConfigFormat::Json => Figment::new().merge(Json::file(path)),
    };

    Ok(figment.merge(Env::prefixed(env_prefix).split(ENV_NESTING_SEPARATOR)))
}

/// Load configuration from a specific file with environment overrides
pub fn load_config_from_file<T, P>(path: P, env_prefix: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let config = figment_for_file(path, env_prefix)?
        .extract()
        .map_err(|e| Error::config(format!("Failed to load {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        interval_ms: u64,
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("a/host.toml")).unwrap(),
            ConfigFormat::Toml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("host.YML")).unwrap(),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("host.json")).unwrap(),
            ConfigFormat::Json
        );
        assert!(ConfigFormat::from_path(Path::new("host.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("host")).is_err());
    }

    #[test]
    fn test_load_toml_and_yaml() {
        let toml = write_temp(".toml", "name = \"toml\"\ninterval_ms = 300\n");
        let sample: Sample = load_config_from_file(toml.path(), "CFGTEST_TOML_").unwrap();
        assert_eq!(sample.name, "toml");
        assert_eq!(sample.interval_ms, 300);

        let yaml = write_temp(".yaml", "name: yaml\n");
        let sample: Sample = load_config_from_file(yaml.path(), "CFGTEST_YAML_").unwrap();
        assert_eq!(sample.name, "yaml");
        assert_eq!(sample.interval_ms, 0);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result: Result<Sample> =
            load_config_from_file("/nonexistent/host.toml", "CFGTEST_MISSING_");
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("not found")));
    }
}
