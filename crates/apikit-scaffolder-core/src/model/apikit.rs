use indexmap::IndexMap;
use serde::Serialize;

pub const DEFAULT_CONFIG_NAME: &str = "config";
pub const DEFAULT_OUTBOUND_HEADERS_MAP_NAME: &str = "outboundHeaders";
pub const DEFAULT_HTTP_STATUS_VAR_NAME: &str = "httpStatus";

const NAME: &str = "name";
const API: &str = "api";
const LEGACY_API: &str = "raml";
const EXTENSION_ENABLED: &str = "extensionEnabled";
const OUTBOUND_HEADERS_MAP_NAME: &str = "outboundHeadersMapName";
const HTTP_STATUS_VAR_NAME: &str = "httpStatusVarName";

/// Per-API router configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApikitConfig {
    pub name: String,
    pub api_location: String,
    pub extension_enabled: Option<bool>,
    pub outbound_headers_map_name: String,
    pub http_status_var_name: String,
    /// Any other attribute, in document order
    pub additional_attributes: IndexMap<String, String>,
}

impl ApikitConfig {
    pub fn new(name: impl Into<String>, api_location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_location: api_location.into(),
            extension_enabled: None,
            outbound_headers_map_name: DEFAULT_OUTBOUND_HEADERS_MAP_NAME.to_string(),
            http_status_var_name: DEFAULT_HTTP_STATUS_VAR_NAME.to_string(),
            additional_attributes: IndexMap::new(),
        }
    }

    /// The config generated for an API that has none yet
    pub fn for_api(api_id: &str, api_location: &str) -> Self {
        Self::new(format!("{}-config", api_id), api_location)
    }

    /// Build a config from the attributes of an `apikit:config` element.
    ///
    /// Returns `None` when the element declares no API location.
    pub fn from_attributes(attributes: &IndexMap<String, String>) -> Option<Self> {
        let api_location = attributes
            .get(API)
            .or_else(|| attributes.get(LEGACY_API))?
            .clone();
        let mut config = Self::new(
            attributes
                .get(NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string()),
            api_location,
        );
        for (key, value) in attributes {
            match key.as_str() {
                NAME | API | LEGACY_API => {}
                // `TRUE` or `${flag}` are kept verbatim
                EXTENSION_ENABLED => match value.parse() {
                    Ok(enabled) => config.extension_enabled = Some(enabled),
                    Err(_) => {
                        config
                            .additional_attributes
                            .insert(key.clone(), value.clone());
                    }
                },
                OUTBOUND_HEADERS_MAP_NAME => config.outbound_headers_map_name = value.clone(),
                HTTP_STATUS_VAR_NAME => config.http_status_var_name = value.clone(),
                _ => {
                    config
                        .additional_attributes
                        .insert(key.clone(), value.clone());
                }
            }
        }
        Some(config)
    }

    /// Set `extensionEnabled`, replacing any unparsed value read from a document
    pub fn set_extension_enabled(&mut self, enabled: Option<bool>) {
        if enabled.is_some() {
            self.additional_attributes.shift_remove(EXTENSION_ENABLED);
        }
        self.extension_enabled = enabled;
    }

    /// All attributes of the config as they would be written
    pub fn attributes(&self) -> IndexMap<String, String> {
        let mut attributes = IndexMap::new();
        attributes.insert(NAME.to_string(), self.name.clone());
        attributes.insert(API.to_string(), self.api_location.clone());
        if let Some(enabled) = self.extension_enabled {
            attributes.insert(EXTENSION_ENABLED.to_string(), enabled.to_string());
        }
        attributes.insert(
            OUTBOUND_HEADERS_MAP_NAME.to_string(),
            self.outbound_headers_map_name.clone(),
        );
        attributes.insert(
            HTTP_STATUS_VAR_NAME.to_string(),
            self.http_status_var_name.clone(),
        );
        for (key, value) in &self.additional_attributes {
            attributes.insert(key.clone(), value.clone());
        }
        attributes
    }

    /// Whether writing `self` over `existing` would change anything.
    ///
    /// Attributes present in `self` that are missing from or different in
    /// `existing` count; attributes only `existing` has do not.
    pub fn differs_from(&self, existing: &ApikitConfig) -> bool {
        let current = existing.attributes();
        self.attributes()
            .iter()
            .any(|(key, value)| current.get(key) != Some(value))
    }
}
