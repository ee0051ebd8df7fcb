use std::collections::HashSet;

use log::{debug, warn};

use crate::error::ScaffoldError;
use crate::locator;
use crate::model::{ApikitConfig, HttpListenerConfig, Triplet};
use crate::naming::FlowName;
use crate::registry::{ApiRegistry, BindRequest, UNNAMED_CONFIG};
use crate::xml::{ConfigDocument, Element, ElementKind};
use crate::{Error, Result};

/// Flows already present in the configuration, reduced to triplets
#[derive(Debug, Clone, Default)]
pub struct ExistingEntries {
    pub triplets: HashSet<Triplet>,
    /// Documents whose reconciliation was abandoned
    pub errors: Vec<ScaffoldError>,
}

/// Read APIKit and listener configs, routers and flows from `documents`.
///
/// Runs three passes, each over every document: configs, then routers, then
/// flows, since each pass resolves names registered by the one before. A
/// structural error abandons the offending document for the remaining
/// passes and is reported in [`ExistingEntries::errors`].
///
/// `spec_locations` are the API definitions being scaffolded; a router whose
/// config points at one of them is bound under the specification's own
/// location so both sides share one binding.
pub fn collect_existing_entries(
    documents: &[ConfigDocument],
    spec_locations: &[&str],
    registry: &mut ApiRegistry,
) -> ExistingEntries {
    let mut collector = Collector {
        registry,
        spec_locations,
        failed: HashSet::new(),
        result: ExistingEntries::default(),
    };

    for doc in documents {
        collector.guard(doc, Collector::collect_configs);
    }
    for doc in documents {
        collector.guard(doc, Collector::collect_routers);
    }
    for doc in documents {
        collector.guard(doc, Collector::collect_flows);
    }

    debug!(
        "Collected {} existing flows from {} documents",
        collector.result.triplets.len(),
        documents.len()
    );
    collector.result
}

struct Collector<'a, 'r> {
    registry: &'r mut ApiRegistry,
    spec_locations: &'a [&'a str],
    failed: HashSet<String>,
    result: ExistingEntries,
}

impl Collector<'_, '_> {
    fn guard(&mut self, doc: &ConfigDocument, pass: fn(&mut Self, &ConfigDocument) -> Result<()>) {
        if self.failed.contains(&doc.path) {
            return;
        }
        if let Err(e) = pass(self, doc) {
            warn!("Skipping {}: {}", doc.path, e);
            self.result.errors.push(ScaffoldError::new(doc.path.clone(), &e));
            self.failed.insert(doc.path.clone());
        }
    }

    fn collect_configs(&mut self, doc: &ConfigDocument) -> Result<()> {
        for element in doc.find_all(ElementKind::ApikitConfig) {
            let config = ApikitConfig::from_attributes(&element.attributes).ok_or_else(|| {
                Error::structural("APIKit configuration does not declare an API location")
            })?;
            let key = element.attr("name").unwrap_or(UNNAMED_CONFIG).to_string();
            self.registry.add_apikit_config(key, config, doc.path.clone());
        }

        for element in doc.find_all(ElementKind::ListenerConfig) {
            let Some(name) = element.attr("name") else {
                debug!("Ignoring unnamed HTTP listener config in {}", doc.path);
                continue;
            };
            // Mule 4 keeps the socket settings on a connection child element
            let connection = element.child(ElementKind::ListenerConnection).unwrap_or(element);
            let config = HttpListenerConfig::new(
                name,
                element.attr("basePath").unwrap_or("/"),
                connection.attr("host").unwrap_or("0.0.0.0"),
                connection.attr("port").unwrap_or_default(),
                connection.attr("protocol").unwrap_or("HTTP"),
            )
            .persisted();
            self.registry.add_listener_config(config);
        }
        Ok(())
    }

    fn collect_routers(&mut self, doc: &ConfigDocument) -> Result<()> {
        for (router, flow) in doc.routers() {
            let key = router.attr("config-ref").unwrap_or(UNNAMED_CONFIG);
            let config = self
                .registry
                .apikit_config(key)
                .map(|c| c.config.clone())
                .ok_or_else(|| Error::structural("An APIKit configuration is mandatory"))?;

            let flow = flow.ok_or_else(|| {
                Error::structural("An APIKit router must be placed inside a flow")
            })?;
            let request = self.source_binding(flow)?;

            let api_location = self
                .spec_locations
                .iter()
                .find(|spec| {
                    locator::matches(&config.api_location, spec, &self.registry.settings().resources_root)
                })
                .map_or_else(|| config.api_location.clone(), |spec| spec.to_string());

            let request = BindRequest {
                api_file_path: api_location,
                apikit_config: Some(config.name.clone()),
                config_file: Some(doc.path.clone()),
                ..request
            };
            self.registry.bind(request)?;
        }
        Ok(())
    }

    /// Derive path, listener and base URI from the message source of `flow`
    fn source_binding(&self, flow: &Element) -> Result<BindRequest> {
        let flow_name = flow.attr("name").unwrap_or_default();
        let source = flow
            .first_child()
            .filter(|el| !el.is(ElementKind::ApikitRouter))
            .ok_or_else(|| Error::structural(format!("Flow '{}' has no message source", flow_name)))?;

        if source.is(ElementKind::Listener) {
            let listener_name = source.attr("config-ref").ok_or_else(|| {
                Error::structural("An HTTP listener configuration is mandatory")
            })?;
            let listener = self.registry.listener_config(listener_name).ok_or_else(|| {
                Error::structural(format!(
                    "HTTP listener configuration '{}' does not exist",
                    listener_name
                ))
            })?;
            let path = source.attr("path").unwrap_or("/");
            return Ok(BindRequest::default()
                .base_uri(Some(format!(
                    "{}/{}",
                    listener.base_uri(),
                    path.trim_start_matches('/').trim_end_matches("/*")
                )))
                .path(path)
                .http_listener_config(listener_name));
        }

        if source.is(ElementKind::InboundEndpoint) {
            let (base_uri, path) = if let Some(address) = source.attr("address") {
                (Some(address.to_string()), address_path(address))
            } else if let Some(path) = source.attr("path") {
                let path = if path.starts_with('/') {
                    path.to_string()
                } else {
                    format!("/{}", path)
                };
                (None, path)
            } else {
                return Err(Error::structural(
                    "An inbound endpoint requires a 'path' or an 'address'",
                ));
            };
            return Ok(BindRequest::default()
                .base_uri(base_uri)
                .path(path)
                .inbound_endpoint());
        }

        Err(Error::structural(format!(
            "The first element of flow '{}' must be an HTTP listener or an inbound endpoint",
            flow_name
        )))
    }

    fn collect_flows(&mut self, doc: &ConfigDocument) -> Result<()> {
        let known_configs = self.registry.known_config_names();
        for flow in doc.find_all(ElementKind::Flow) {
            let Some(name) = flow.attr("name") else {
                continue;
            };
            let Some(decoded) = FlowName::decode(name, &known_configs) else {
                debug!("Flow '{}' is not an APIKit flow", name);
                continue;
            };
            let Some(verb) = decoded.method() else {
                debug!("Flow '{}' has an unknown HTTP method", name);
                continue;
            };

            let key = decoded.config.as_deref().unwrap_or(UNNAMED_CONFIG);
            let binding = self.registry.binding_for_config(key).ok_or_else(|| {
                Error::structural(format!("No API is routed by APIKit configuration '{}'", key))
            })?;
            let uri = format!("{}{}", self.registry.uri_prefix(binding)?, decoded.resource);
            self.result
                .triplets
                .insert(Triplet::new(binding, uri, verb, decoded.mimetype));
        }
        Ok(())
    }
}

/// Path part of an endpoint address. Host and port are skipped unparsed since
/// they are often property placeholders such as `${http.port}`.
fn address_path(address: &str) -> String {
    let authority_and_path = address.split_once("//").map_or(address, |(_, rest)| rest);
    let path = authority_and_path
        .find('/')
        .map_or("", |i| &authority_and_path[i..]);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches("/*");
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
