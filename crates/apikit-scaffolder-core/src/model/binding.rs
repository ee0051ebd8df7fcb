use serde::Serialize;

/// Handle of an [`ApiBinding`] inside the registry that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BindingId(pub(crate) usize);

impl BindingId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One API definition bound into the application.
///
/// Listener and APIKit configs are referenced by name; the registry holds the
/// configs themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiBinding {
    /// Canonical short name, unique within a run
    pub id: String,
    /// Normalized location of the API definition; the registry key
    pub api_file_path: String,
    pub base_uri: Option<String>,
    /// Listener path, e.g. `/api/*`
    pub path: Option<String>,
    pub http_listener_config: Option<String>,
    pub apikit_config: Option<String>,
    /// Configuration file that owns the main flow of this API
    pub config_file: Option<String>,
    /// Exposed through an inbound endpoint; such APIs have no listener config
    pub inbound_endpoint: bool,
}

impl ApiBinding {
    /// Name of the main flow generated for this API
    pub fn main_flow_name(&self) -> String {
        format!("{}-main", self.id)
    }

    /// Name of the console flow generated for this API
    pub fn console_flow_name(&self) -> String {
        format!("{}-console", self.id)
    }

    /// File a new main flow is written to when the API has no owning file
    pub fn default_config_file(&self) -> String {
        format!("{}.xml", self.id)
    }
}
