//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use lazy_static::lazy_static;
use regex_lite::Regex;
use std::path::Path;

lazy_static! {
    /// Captures `${VAR}` or `${VAR:-default}`
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").expect("valid env var pattern");
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables.
    ///
    /// Supports two syntaxes:
    /// - `${VAR_NAME}` - keeps the placeholder if the variable is not set
    /// - `${VAR_NAME:-default}` - falls back to `default`
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex_lite::Captures<'_>| {
                match std::env::var(&caps[1]) {
                    Ok(value) => value,
                    Err(_) => match caps.get(2) {
                        Some(default) => default.as_str().to_string(),
                        None => caps[0].to_string(),
                    },
                }
            })
            .into_owned()
    }
}
