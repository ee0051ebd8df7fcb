//! API registry.
//!
//! The registry is the single owner of every [`ApiBinding`] of a run. Bindings
//! live in an arena and are keyed by their normalized API file path, so binding
//! the same definition twice, once while reading existing configuration and
//! once while walking the specification, always yields the same
//! [`BindingId`]. All mutation of a binding after creation goes through the
//! registry.
//!
//! The registry also tracks the HTTP listener and APIKit configs it has seen
//! and allocates listener configs for new APIs so that repeated runs never
//! bind two APIs to the same address.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::debug;

use crate::config::ScaffolderConfig;
use crate::locator;
use crate::model::{complete_path, ApiBinding, ApikitConfig, BindingId, HttpListenerConfig};
use crate::{Error, Result};

/// Key under which an `apikit:config` without a `name` attribute is indexed
pub const UNNAMED_CONFIG: &str = "noNameConfig";

/// Arguments of [`ApiRegistry::bind`]
#[derive(Debug, Clone, Default)]
pub struct BindRequest {
    pub api_file_path: String,
    pub base_uri: Option<String>,
    pub path: Option<String>,
    pub apikit_config: Option<String>,
    pub http_listener_config: Option<String>,
    pub config_file: Option<String>,
    /// The API is exposed through an inbound endpoint rather than a listener
    pub inbound_endpoint: bool,
}

impl BindRequest {
    pub fn new(api_file_path: impl Into<String>) -> Self {
        Self {
            api_file_path: api_file_path.into(),
            ..Default::default()
        }
    }

    pub fn base_uri(mut self, base_uri: Option<String>) -> Self {
        self.base_uri = base_uri;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn apikit_config(mut self, name: impl Into<String>) -> Self {
        self.apikit_config = Some(name.into());
        self
    }

    pub fn http_listener_config(mut self, name: impl Into<String>) -> Self {
        self.http_listener_config = Some(name.into());
        self
    }

    pub fn config_file(mut self, file: impl Into<String>) -> Self {
        self.config_file = Some(file.into());
        self
    }

    pub fn inbound_endpoint(mut self) -> Self {
        self.inbound_endpoint = true;
        self
    }
}

/// An APIKit config read from an existing document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredApikitConfig {
    pub config: ApikitConfig,
    pub file: String,
}

/// Owner of all API bindings and configs of one reconciliation run
#[derive(Debug, Clone)]
pub struct ApiRegistry {
    settings: ScaffolderConfig,
    bindings: Vec<ApiBinding>,
    by_path: HashMap<String, BindingId>,
    listener_configs: Vec<HttpListenerConfig>,
    apikit_configs: IndexMap<String, RegisteredApikitConfig>,
}

impl ApiRegistry {
    pub fn new(settings: ScaffolderConfig) -> Self {
        Self {
            settings,
            bindings: Vec::new(),
            by_path: HashMap::new(),
            listener_configs: Vec::new(),
            apikit_configs: IndexMap::new(),
        }
    }

    pub fn settings(&self) -> &ScaffolderConfig {
        &self.settings
    }

    /// Normalize an API file location the way binding keys are normalized
    pub fn normalize(&self, api_file_path: &str) -> String {
        locator::normalize(api_file_path, &self.settings.resources_root)
    }

    /// Bind an API definition, creating the binding on first use.
    ///
    /// Binding an already known path never creates a second binding; the
    /// existing one is completed with whatever it still lacks (owning file,
    /// APIKit config) and a synthesized listener config is replaced by an
    /// explicit one.
    pub fn bind(&mut self, request: BindRequest) -> Result<BindingId> {
        if request.api_file_path.trim().is_empty() {
            return Err(Error::contract("API file path must not be empty"));
        }
        let key = self.normalize(&request.api_file_path);

        if let Some(&id) = self.by_path.get(&key) {
            self.complete(id, request);
            return Ok(id);
        }

        let api_id = self.generate_id(&key);
        let path = request
            .path
            .unwrap_or_else(|| self.settings.api_path.clone());
        let listener = match request.http_listener_config {
            Some(name) => Some(name),
            None if request.inbound_endpoint => None,
            None => Some(self.allocate_listener(&api_id, &path)?),
        };

        let id = BindingId(self.bindings.len());
        debug!("Binding API '{}' ({}) at {}", api_id, key, path);
        self.bindings.push(ApiBinding {
            id: api_id,
            api_file_path: key.clone(),
            base_uri: request.base_uri,
            path: Some(path),
            http_listener_config: listener,
            apikit_config: request.apikit_config,
            config_file: request.config_file,
            inbound_endpoint: request.inbound_endpoint,
        });
        self.by_path.insert(key, id);
        Ok(id)
    }

    fn complete(&mut self, id: BindingId, request: BindRequest) {
        let listener_is_synthesized = self.bindings[id.0]
            .http_listener_config
            .as_deref()
            .and_then(|name| self.listener_config(name))
            .map_or(true, |config| !config.persisted);

        let binding = &mut self.bindings[id.0];
        debug!("Reusing binding '{}' for {}", binding.id, request.api_file_path);
        if binding.config_file.is_none() {
            binding.config_file = request.config_file;
        }
        if binding.apikit_config.is_none() {
            binding.apikit_config = request.apikit_config;
        }
        if let Some(listener) = request.http_listener_config {
            if listener_is_synthesized {
                binding.http_listener_config = Some(listener);
                if request.path.is_some() {
                    binding.path = request.path;
                }
                if request.base_uri.is_some() {
                    binding.base_uri = request.base_uri;
                }
            }
        }
    }

    /// Derive a short id from the API file name that does not collide with
    /// any binding id or any config name derived from an id.
    pub fn generate_id(&self, api_file_path: &str) -> String {
        let file_name = locator::file_name(api_file_path);
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file_name.as_str(),
        };
        let mut base = stem.replace("%20", "-").replace(' ', "-");
        if base.is_empty() {
            base = "api".to_string();
        }

        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.id_collides(&candidate) {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    fn id_collides(&self, candidate: &str) -> bool {
        let config_name = format!("{}-config", candidate);
        let listener_name = format!("{}-httpListenerConfig", candidate);
        self.bindings.iter().any(|b| {
            b.id == candidate
                || b.apikit_config.as_deref() == Some(config_name.as_str())
                || b.http_listener_config.as_deref() == Some(listener_name.as_str())
        }) || self
            .apikit_configs
            .values()
            .any(|c| c.config.name == config_name)
            || self.listener_configs.iter().any(|l| l.name == listener_name)
    }

    /// Pick the first listener config not already serving `path`, numeric
    /// ports first in ascending order, or synthesize a new one on the next
    /// free port.
    fn allocate_listener(&mut self, api_id: &str, path: &str) -> Result<String> {
        let mut numeric: Vec<&HttpListenerConfig> = self
            .listener_configs
            .iter()
            .filter(|c| c.numeric_port().is_some())
            .collect();
        numeric.sort_by_key(|c| c.numeric_port());
        let placeholders = self
            .listener_configs
            .iter()
            .filter(|c| c.numeric_port().is_none());

        if let Some(config) = numeric
            .into_iter()
            .chain(placeholders)
            .find(|c| self.is_listener_available(&c.name, path))
        {
            debug!("Reusing listener config '{}' for '{}'", config.name, api_id);
            return Ok(config.name.clone());
        }

        let port = self.next_free_port()?;
        let config = HttpListenerConfig::new(
            format!("{}-httpListenerConfig", api_id),
            self.settings.listener_base_path.clone(),
            self.settings.listener_host.clone(),
            port.to_string(),
            self.settings.listener_protocol.clone(),
        );
        debug!("Synthesized listener config '{}' on port {}", config.name, port);
        let name = config.name.clone();
        self.listener_configs.push(config);
        Ok(name)
    }

    /// One past the highest port in use, or the lowest free port from
    /// `first_port` up once the highest one is 65535
    fn next_free_port(&self) -> Result<u16> {
        let used: HashSet<u16> = self
            .listener_configs
            .iter()
            .filter_map(HttpListenerConfig::numeric_port)
            .collect();
        let Some(&max) = used.iter().max() else {
            return Ok(self.settings.first_port);
        };
        if let Some(port) = max.checked_add(1) {
            return Ok(port);
        }
        (self.settings.first_port..=u16::MAX)
            .find(|port| !used.contains(port))
            .ok_or_else(|| {
                Error::config(format!(
                    "No free port left for a new HTTP listener from {}",
                    self.settings.first_port
                ))
            })
    }

    fn is_listener_available(&self, listener: &str, path: &str) -> bool {
        let wildcard = format!("{}/*", path);
        !self.bindings.iter().any(|b| {
            b.http_listener_config.as_deref() == Some(listener)
                && b
                    .path
                    .as_deref()
                    .map_or(false, |p| p == path || p == wildcard)
        })
    }

    /// Register a listener config read from a document. Returns `false` when
    /// an equal config is already known.
    pub fn add_listener_config(&mut self, config: HttpListenerConfig) -> bool {
        if self.listener_configs.contains(&config) {
            return false;
        }
        self.listener_configs.push(config);
        true
    }

    pub fn listener_config(&self, name: &str) -> Option<&HttpListenerConfig> {
        self.listener_configs.iter().find(|c| c.name == name)
    }

    pub fn listener_configs(&self) -> &[HttpListenerConfig] {
        &self.listener_configs
    }

    /// Register an APIKit config read from `file` under `key`, which is its
    /// name or [`UNNAMED_CONFIG`].
    pub fn add_apikit_config(&mut self, key: impl Into<String>, config: ApikitConfig, file: impl Into<String>) {
        self.apikit_configs.insert(
            key.into(),
            RegisteredApikitConfig {
                config,
                file: file.into(),
            },
        );
    }

    pub fn apikit_config(&self, key: &str) -> Option<&RegisteredApikitConfig> {
        self.apikit_configs.get(key)
    }

    /// The registered config whose `name` attribute is `name`
    pub fn apikit_config_named(&self, name: &str) -> Option<&RegisteredApikitConfig> {
        self.apikit_configs.values().find(|c| c.config.name == name)
    }

    /// Whether `name` belongs to an `apikit:config` that declares no name
    pub fn is_unnamed_config(&self, name: &str) -> bool {
        self.apikit_configs.get(name).is_none()
            && self
                .apikit_configs
                .get(UNNAMED_CONFIG)
                .map_or(false, |c| c.config.name == name)
    }

    /// Names flow-name decoding treats as config references
    pub fn known_config_names(&self) -> HashSet<String> {
        self.apikit_configs
            .iter()
            .flat_map(|(key, c)| [key.clone(), c.config.name.clone()])
            .chain(self.bindings.iter().filter_map(|b| b.apikit_config.clone()))
            .collect()
    }

    /// The binding behind `id`.
    ///
    /// # Panics
    ///
    /// If `id` was issued by another registry and is out of range here. Use
    /// [`ApiRegistry::get_binding`] for ids of unknown origin.
    pub fn binding(&self, id: BindingId) -> &ApiBinding {
        &self.bindings[id.0]
    }

    pub fn get_binding(&self, id: BindingId) -> Option<&ApiBinding> {
        self.bindings.get(id.0)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (BindingId, &ApiBinding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i), b))
    }

    pub fn binding_for_path(&self, api_file_path: &str) -> Option<BindingId> {
        self.by_path.get(&self.normalize(api_file_path)).copied()
    }

    /// The binding routed by the APIKit config registered under `key`
    pub fn binding_for_config(&self, key: &str) -> Option<BindingId> {
        let name = self
            .apikit_configs
            .get(key)
            .map_or(key, |c| c.config.name.as_str());
        self.bindings()
            .find(|(_, b)| b.apikit_config.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// Whether any binding was read from an existing configuration file
    pub fn has_existing_bindings(&self) -> bool {
        self.bindings.iter().any(|b| b.config_file.is_some())
    }

    /// Path prefix every resource URI of the binding is mounted under
    pub fn uri_prefix(&self, id: BindingId) -> Result<String> {
        let binding = self.binding(id);
        let path = binding.path.as_deref().ok_or_else(|| {
            Error::structural(format!("API binding '{}' has no path", binding.id))
        })?;
        let base_path = binding
            .http_listener_config
            .as_deref()
            .and_then(|name| self.listener_config(name))
            .map(|c| c.base_path.as_str());
        Ok(complete_path(base_path, Some(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> ApiRegistry {
        ApiRegistry::new(ScaffolderConfig::default())
    }

    fn port_of(registry: &ApiRegistry, id: BindingId) -> String {
        let name = registry.binding(id).http_listener_config.clone().unwrap();
        registry.listener_config(&name).unwrap().port.clone()
    }

    #[test]
    fn test_bind_is_idempotent_per_normalized_path() -> Result<()> {
        let mut registry = registry();
        let first = registry.bind(BindRequest::new("src/main/resources/api/pet.raml"))?;
        let second = registry.bind(BindRequest::new(r"src\main\resources\api\pet.raml"))?;
        let third = registry.bind(BindRequest::new("pet.raml").config_file("pet.xml"))?;
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(registry.bindings().count(), 1);
        assert_eq!(registry.binding(first).config_file.as_deref(), Some("pet.xml"));
        Ok(())
    }

    #[test]
    fn test_bind_keeps_first_owning_file() -> Result<()> {
        let mut registry = registry();
        let id = registry.bind(BindRequest::new("pet.raml").config_file("a.xml"))?;
        registry.bind(BindRequest::new("pet.raml").config_file("b.xml"))?;
        assert_eq!(registry.binding(id).config_file.as_deref(), Some("a.xml"));
        Ok(())
    }

    #[test]
    fn test_bind_rejects_empty_path() {
        let mut registry = registry();
        let err = registry.bind(BindRequest::new("  ")).unwrap_err();
        assert!(matches!(err, Error::Contract(_)));
    }

    #[test]
    fn test_generate_id_sanitizes_file_name() {
        let registry = registry();
        assert_eq!(registry.generate_id("v1/pet store.raml"), "pet-store");
        assert_eq!(registry.generate_id("pet%20store.yaml"), "pet-store");
        assert_eq!(
            registry.generate_id("resource::com.acme:pet-api:1.0.0:raml:zip:pet-api.raml"),
            "pet-api"
        );
    }

    #[test]
    fn test_ids_are_unique() -> Result<()> {
        let mut registry = registry();
        let a = registry.bind(BindRequest::new("v1/pet.raml"))?;
        let b = registry.bind(BindRequest::new("v2/pet.raml"))?;
        let c = registry.bind(BindRequest::new("v3/pet.yaml"))?;
        assert_eq!(registry.binding(a).id, "pet");
        assert_eq!(registry.binding(b).id, "pet-2");
        assert_eq!(registry.binding(c).id, "pet-3");
        Ok(())
    }

    #[test]
    fn test_id_avoids_existing_config_names() {
        let mut registry = registry();
        registry.add_apikit_config("pet-config", ApikitConfig::new("pet-config", "other.raml"), "a.xml");
        assert_eq!(registry.generate_id("pet.raml"), "pet-2");

        let mut registry = ApiRegistry::new(ScaffolderConfig::default());
        registry.add_listener_config(
            HttpListenerConfig::new("pet-httpListenerConfig", "/", "0.0.0.0", "8081", "HTTP").persisted(),
        );
        assert_eq!(registry.generate_id("pet.raml"), "pet-2");
    }

    #[test]
    fn test_ports_are_allocated_in_creation_order() -> Result<()> {
        let mut registry = registry();
        let a = registry.bind(BindRequest::new("a.raml"))?;
        let b = registry.bind(BindRequest::new("b.raml"))?;
        let c = registry.bind(BindRequest::new("c.raml"))?;
        assert_eq!(port_of(&registry, a), "8081");
        assert_eq!(port_of(&registry, b), "8082");
        assert_eq!(port_of(&registry, c), "8083");
        assert_eq!(
            registry.binding(a).http_listener_config.as_deref(),
            Some("a-httpListenerConfig")
        );
        Ok(())
    }

    #[test]
    fn test_listener_is_reused_when_path_is_free() -> Result<()> {
        let mut registry = registry();
        let a = registry.bind(BindRequest::new("a.raml"))?;
        let b = registry.bind(BindRequest::new("b.raml").path("/other/*"))?;
        assert_eq!(
            registry.binding(a).http_listener_config,
            registry.binding(b).http_listener_config
        );
        assert_eq!(registry.listener_configs().len(), 1);
        Ok(())
    }

    #[test]
    fn test_wildcard_path_collides() -> Result<()> {
        let mut registry = registry();
        registry.bind(BindRequest::new("a.raml").path("/api/*"))?;
        let b = registry.bind(BindRequest::new("b.raml").path("/api"))?;
        assert_eq!(port_of(&registry, b), "8082");
        Ok(())
    }

    #[test]
    fn test_allocation_prefers_lowest_numeric_port() -> Result<()> {
        let mut registry = registry();
        registry.add_listener_config(
            HttpListenerConfig::new("placeholder", "/", "0.0.0.0", "${http.port}", "HTTP").persisted(),
        );
        registry.add_listener_config(
            HttpListenerConfig::new("high", "/", "0.0.0.0", "9090", "HTTP").persisted(),
        );
        registry.add_listener_config(
            HttpListenerConfig::new("low", "/", "0.0.0.0", "8085", "HTTP").persisted(),
        );
        let a = registry.bind(BindRequest::new("a.raml"))?;
        let b = registry.bind(BindRequest::new("b.raml"))?;
        let c = registry.bind(BindRequest::new("c.raml"))?;
        let d = registry.bind(BindRequest::new("d.raml"))?;
        assert_eq!(registry.binding(a).http_listener_config.as_deref(), Some("low"));
        assert_eq!(registry.binding(b).http_listener_config.as_deref(), Some("high"));
        assert_eq!(
            registry.binding(c).http_listener_config.as_deref(),
            Some("placeholder")
        );
        assert_eq!(port_of(&registry, d), "9091");
        Ok(())
    }

    #[test]
    fn test_duplicate_listener_configs_are_ignored() {
        let mut registry = registry();
        let config = HttpListenerConfig::new("l", "/", "0.0.0.0", "8081", "HTTP").persisted();
        assert!(registry.add_listener_config(config.clone()));
        assert!(!registry.add_listener_config(config));
        assert_eq!(registry.listener_configs().len(), 1);
    }

    #[test]
    fn test_explicit_listener_replaces_synthesized_one() -> Result<()> {
        let mut registry = registry();
        registry.add_listener_config(
            HttpListenerConfig::new("shared", "/base", "0.0.0.0", "${port}", "HTTP").persisted(),
        );
        let id = registry.bind(BindRequest::new("pet.raml").path("/api/*").http_listener_config("pet-httpListenerConfig"))?;
        assert_eq!(registry.uri_prefix(id)?, "/api");

        let mut fresh = ApiRegistry::new(ScaffolderConfig::default());
        let id = fresh.bind(BindRequest::new("pet.raml"))?;
        fresh.add_listener_config(
            HttpListenerConfig::new("shared", "/base", "0.0.0.0", "${port}", "HTTP").persisted(),
        );
        fresh.bind(BindRequest::new("pet.raml").path("/v1/*").http_listener_config("shared"))?;
        assert_eq!(fresh.binding(id).http_listener_config.as_deref(), Some("shared"));
        assert_eq!(fresh.uri_prefix(id)?, "/base/v1");
        Ok(())
    }

    #[test]
    fn test_binding_for_config_resolves_unnamed_key() -> Result<()> {
        let mut registry = registry();
        registry.add_apikit_config(UNNAMED_CONFIG, ApikitConfig::new("config", "pet.raml"), "pet.xml");
        let id = registry.bind(BindRequest::new("pet.raml").apikit_config("config"))?;
        assert_eq!(registry.binding_for_config(UNNAMED_CONFIG), Some(id));
        assert_eq!(registry.binding_for_config("config"), Some(id));
        assert_eq!(registry.binding_for_config("other"), None);
        assert!(registry.known_config_names().contains("config"));
        assert!(registry.is_unnamed_config("config"));
        assert_eq!(registry.apikit_config_named("config").map(|c| c.file.as_str()), Some("pet.xml"));
        Ok(())
    }

    #[test]
    fn test_port_after_65535_wraps_to_lowest_free_port() -> Result<()> {
        let mut registry = registry();
        for (name, port) in [("top", "65535"), ("first", "8081")] {
            registry.add_listener_config(
                HttpListenerConfig::new(name, "/", "0.0.0.0", port, "HTTP").persisted(),
            );
        }
        registry.bind(BindRequest::new("a.raml").http_listener_config("top"))?;
        registry.bind(BindRequest::new("b.raml").http_listener_config("first"))?;

        let c = registry.bind(BindRequest::new("c.raml"))?;
        assert_eq!(port_of(&registry, c), "8082");
        Ok(())
    }

    #[test]
    fn test_no_free_port_is_a_config_error() -> Result<()> {
        let mut registry = ApiRegistry::new(ScaffolderConfig {
            first_port: 65535,
            ..Default::default()
        });
        registry.add_listener_config(
            HttpListenerConfig::new("top", "/", "0.0.0.0", "65535", "HTTP").persisted(),
        );
        registry.bind(BindRequest::new("a.raml").http_listener_config("top"))?;

        let err = registry.bind(BindRequest::new("b.raml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{:?}", err);
        Ok(())
    }

    #[test]
    fn test_binding_ids_belong_to_their_registry() -> Result<()> {
        let mut other = registry();
        other.bind(BindRequest::new("a.raml"))?;
        let foreign = other.bind(BindRequest::new("b.raml"))?;

        let mut registry = registry();
        let own = registry.bind(BindRequest::new("a.raml"))?;
        assert!(registry.get_binding(own).is_some());
        assert!(registry.get_binding(foreign).is_none());
        Ok(())
    }
}
