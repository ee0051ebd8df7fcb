//! Configuration management for APIKit scaffolding.
//!
//! This module defines the `ScaffolderConfig` struct holding the defaults the
//! engine falls back to when it has to synthesize something: listener host,
//! first port, the path new APIs are mounted on, and so on. The configuration
//! can be created programmatically or loaded from a YAML or TOML file.
//!
//! # Examples
//!
//! ```no_run
//! use apikit_scaffolder_core::config::ScaffolderConfig;
//!
//! // Create a new config programmatically
//! let mut config = ScaffolderConfig::default();
//! config.first_port = 9000;
//! config.extension_enabled = Some(true);
//!
//! // Or load from a config file
//! # async fn load() -> apikit_scaffolder_core::Result<()> {
//! let config = ScaffolderConfig::from_file("scaffolder.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_value::Value as SerdeValue;
use tokio::fs;

/// Conventional location of API definitions inside a Mule application
pub const DEFAULT_RESOURCES_ROOT: &str = "src/main/resources/api/";

/// Settings for a scaffolding run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaffolderConfig {
    /// Prefix stripped from API file paths before they are compared
    #[serde(default = "default_resources_root")]
    pub resources_root: String,

    /// Host of synthesized HTTP listener configs
    #[serde(default = "default_listener_host")]
    pub listener_host: String,

    /// Protocol of synthesized HTTP listener configs
    #[serde(default = "default_listener_protocol")]
    pub listener_protocol: String,

    /// Port used when no numeric listener port is known yet
    #[serde(default = "default_first_port")]
    pub first_port: u16,

    /// Base path of synthesized HTTP listener configs
    #[serde(default = "default_listener_base_path")]
    pub listener_base_path: String,

    /// Listener path of newly created API bindings
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Value substituted for `{version}` in resource URIs
    #[serde(default)]
    pub api_version: Option<String>,

    /// Written into freshly computed APIKit configs when set
    #[serde(default)]
    pub extension_enabled: Option<bool>,

    /// Existing configuration documents to reconcile against
    #[serde(default, deserialize_with = "deserialize_paths")]
    pub config_files: Vec<String>,

    /// Directory rendered fragments are written to
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Default for ScaffolderConfig {
    fn default() -> Self {
        Self {
            resources_root: default_resources_root(),
            listener_host: default_listener_host(),
            listener_protocol: default_listener_protocol(),
            first_port: default_first_port(),
            listener_base_path: default_listener_base_path(),
            api_path: default_api_path(),
            api_version: None,
            extension_enabled: None,
            config_files: Vec::new(),
            output_dir: None,
        }
    }
}

impl ScaffolderConfig {
    /// Load configuration from a file. `.toml` files are read as TOML,
    /// everything else as YAML.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        if is_toml(path) {
            Ok(toml::from_str(&content)?)
        } else {
            Ok(serde_yaml::from_str(&content)?)
        }
    }

    /// Save configuration to a file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = if is_toml(path) {
            toml::to_string(self).map_err(|e| crate::Error::config(e.to_string()))?
        } else {
            serde_yaml::to_string(self)?
        };
        fs::write(path, content).await?;
        Ok(())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("toml")
}

fn default_resources_root() -> String {
    DEFAULT_RESOURCES_ROOT.to_string()
}

fn default_listener_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listener_protocol() -> String {
    "HTTP".to_string()
}

fn default_first_port() -> u16 {
    8081
}

fn default_listener_base_path() -> String {
    "/".to_string()
}

fn default_api_path() -> String {
    "/api/*".to_string()
}

/// Accept either a single path or a list of paths
fn deserialize_paths<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    match value {
        SerdeValue::String(s) => Ok(vec![s]),
        SerdeValue::Seq(seq) => {
            let mut result = Vec::new();
            for item in seq {
                if let SerdeValue::String(s) = item {
                    result.push(s);
                } else {
                    return Err(serde::de::Error::custom(
                        "Expected string or array of strings",
                    ));
                }
            }
            Ok(result)
        }
        SerdeValue::Unit | SerdeValue::Option(None) => Ok(Vec::new()),
        _ => Err(serde::de::Error::custom(
            "Expected string or array of strings",
        )),
    }
}
