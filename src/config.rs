//! Configuration management for the binding planner
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bindings.toml)
//! - Environment variables (SHAPE_BINDINGS__*)
//!
//! ## Example config file (bindings.toml):
//! ```toml
//! [model]
//! paths = ["./model"]
//! skip_prefixes = ["target/", "build/"]
//!
//! [bindings]
//! validation_failure = "InvalidInputException"
//! infer_http = true
//! list_delimiter = ","
//!
//! [auth]
//! trait_id = "smithy.extensions#authenticated"
//! default_mechanism = "basic"
//! default_payload = "smithy.api#String"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::traits::AuthTraitConfig;
use crate::model::LoadConfig;

/// Main configuration for the binding planner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Model location settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Binding synthesis settings
    #[serde(default)]
    pub bindings: BindingsConfig,

    /// Authentication trait settings
    #[serde(default)]
    pub auth: AuthTraitConfig,
}

/// Where model documents are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model files or directories
    #[serde(default = "default_model_paths")]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,

    #[serde(default)]
    pub include_prefixes: Vec<String>,
}

/// Binding synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingsConfig {
    /// Failure kind carried by REQUIRED_OR_FAIL policies
    #[serde(default = "default_validation_failure")]
    pub validation_failure: String,

    /// Synthesize an http binding for operations that declare none
    #[serde(default = "default_true")]
    pub infer_http: bool,

    /// Delimiter used to split list and set values
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,
}

// Default value functions
fn default_model_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("model")]
}

fn default_skip_prefixes() -> Vec<String> {
    LoadConfig::default().skip_prefixes
}

fn default_validation_failure() -> String {
    "InvalidInputException".to_string()
}

fn default_true() -> bool {
    true
}

fn default_list_delimiter() -> String {
    ",".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            paths: default_model_paths(),
            skip_prefixes: default_skip_prefixes(),
            include_prefixes: Vec::new(),
        }
    }
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            validation_failure: default_validation_failure(),
            infer_http: true,
            list_delimiter: default_list_delimiter(),
        }
    }
}

impl PlannerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["bindings.toml", ".bindings.toml", "config/bindings.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "shape-bindings", "bindings") {
            let xdg_config = config_dir.config_dir().join("bindings.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SHAPE_BINDINGS__BINDINGS__LIST_DELIMITER=";"
        builder = builder.add_source(
            Environment::with_prefix("SHAPE_BINDINGS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Loader settings derived from the `[model]` and `[auth]` sections
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.model.skip_prefixes.clone(),
            include_prefixes: self.model.include_prefixes.clone(),
            auth: self.auth.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlannerConfig::default();
        assert!(config.bindings.infer_http);
        assert_eq!(config.bindings.list_delimiter, ",");
        assert_eq!(config.bindings.validation_failure, "InvalidInputException");
        assert_eq!(config.auth.default_mechanism, "basic");
    }

    #[test]
    fn test_serialize_config() {
        let config = PlannerConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[bindings]"));
        assert!(toml_str.contains("[auth]"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let path = path.to_str().unwrap();

        let mut config = PlannerConfig::default();
        config.bindings.list_delimiter = ";".to_string();
        config.auth.trait_id = "acme.auth#authenticated".to_string();
        config.save(path).unwrap();

        let loaded = PlannerConfig::load_from(Some(path)).unwrap();
        assert_eq!(loaded.bindings.list_delimiter, ";");
        assert_eq!(loaded.load_config().auth.trait_id, "acme.auth#authenticated");
    }
}
