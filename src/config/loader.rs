//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::Config;
use std::path::Path;

/// Load configuration from a file.
///
/// The format is auto-detected: the content is parsed as JSON first, then
/// as YAML. When both fail the errors are combined.
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_str(&content)
}

/// Parse configuration from a string, trying JSON then YAML.
pub fn load_str(content: &str) -> ConfigResult<Config> {
    match serde_json::from_str(content) {
        Ok(config) => Ok(config),
        Err(json_err) => match serde_yaml::from_str(content) {
            Ok(config) => Ok(config),
            Err(yaml_err) => Err(ConfigError::ParseError {
                json: json_err.to_string(),
                yaml: yaml_err.to_string(),
            }),
        },
    }
}
