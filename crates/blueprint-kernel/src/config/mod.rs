//! Configuration loading for [`crate::intrinsics`] callers and, via the
//! `config` feature, `blueprint-runtime`'s `ExecutorConfig`.
//!
//! Supports TOML, YAML, and JSON, auto-detected from file extension, with
//! `${VAR}`/`$VAR` environment substitution applied to the raw file
//! content before parsing — so a deployment can pin most of a config file
//! and override a handful of fields per-environment.

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Configuration loading/parsing error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Detects configuration format from file extension (`.toml`, `.yaml`/
/// `.yml`, `.json`).
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitutes `${VAR_NAME}` (preferred) and bare `$VAR_NAME` references
/// with the named environment variable's value, leaving references to
/// unset variables untouched.
pub fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    let re_braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    result = re_braced
        .replace_all(&result, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    let re_simple = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").unwrap();
    result = re_simple
        .replace_all(&result, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string();

    result
}

/// Loads and deserializes a config file, substituting environment
/// variables first.
///
/// ```rust,ignore
/// use blueprint_kernel::config::load_config;
/// use blueprint_runtime::ExecutorConfig;
///
/// let config: ExecutorConfig = load_config("executor.toml")?;
/// ```
pub fn load_config<T>(path: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let substituted_content = substitute_env_vars(&content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted_content, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Parses a config string with an explicit format, substituting
/// environment variables first.
pub fn from_str<T>(content: &str, format: FileFormat) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let substituted_content = substitute_env_vars(content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted_content, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Merges multiple config sources in order, later sources overriding
/// earlier ones (e.g. defaults -> file -> environment-specific overlay).
pub fn merge_configs<T>(sources: &[(&str, FileFormat)]) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let mut builder = Cfg::builder();

    for (content, format) in sources {
        let substituted = substitute_env_vars(content);
        builder = builder.add_source(File::from_str(&substituted, *format));
    }

    let config = builder.build().map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Loads and merges multiple config files by path, later files
/// overriding earlier ones.
pub fn load_merged<T>(paths: &[&str]) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let mut builder = Cfg::builder();

    for path in paths {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content);
        builder = builder.add_source(File::from_str(&substituted, format));
    }

    let config = builder.build().map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

/// Loads a config file, then layers environment-variable overrides on
/// top (`{prefix}_{FIELD}`, double underscore for nesting).
pub fn load_with_env<T>(path: &str, env_prefix: &str) -> ConfigResult<T>
where
    T: DeserializeOwned,
{
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&content);

    let config = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}

#[cfg(all(test, feature = "config"))]
mod unit_tests {
    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("config.yaml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("config.yml").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("config.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("config.json").unwrap(), FileFormat::Json);
        assert!(detect_format("config.ini").is_err());
        assert!(detect_format("config.txt").is_err());
    }

    #[derive(serde::Deserialize, serde::Serialize, Debug, PartialEq)]
    struct TestConfig {
        max_concurrency: u32,
        event_buffer_size: u32,
    }

    #[test]
    fn test_from_str_toml() {
        let toml = r#"
max_concurrency = 8
event_buffer_size = 256
"#;
        let config: TestConfig = from_str(toml, FileFormat::Toml).unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.event_buffer_size, 256);
    }

    #[test]
    fn test_from_str_json() {
        let json = r#"{ "max_concurrency": 4, "event_buffer_size": 64 }"#;
        let config: TestConfig = from_str(json, FileFormat::Json).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.event_buffer_size, 64);
    }

    #[test]
    fn test_from_str_yaml() {
        let yaml = "max_concurrency: 2\nevent_buffer_size: 32\n";
        let config: TestConfig = from_str(yaml, FileFormat::Yaml).unwrap();
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.event_buffer_size, 32);
    }

    #[test]
    fn test_merge_configs() {
        let base = r#"{ "max_concurrency": 4, "event_buffer_size": 64 }"#;
        let override_config = r#"{ "max_concurrency": 16 }"#;

        let config: TestConfig =
            merge_configs(&[(base, FileFormat::Json), (override_config, FileFormat::Json)]).unwrap();
        assert_eq!(config.max_concurrency, 16);
        assert_eq!(config.event_buffer_size, 64);
    }
}

// Integration tests (env substitution against real files).
#[cfg(test)]
mod tests;
