use indexmap::IndexMap;
use log::debug;

use crate::model::{BindingId, GenerationEntry, Triplet};
use crate::registry::{ApiRegistry, BindRequest};
use crate::spec::{Action, ApiSpecification, MimeType, Resource};
use crate::Result;

/// Entries an API specification asks for, keyed by identity
#[derive(Debug, Clone)]
pub struct SpecEntries {
    pub binding: BindingId,
    pub entries: IndexMap<Triplet, GenerationEntry>,
}

impl SpecEntries {
    pub fn triplets(&self) -> impl Iterator<Item = &Triplet> {
        self.entries.keys()
    }
}

/// Walk the resource tree of `spec` and produce one entry per resource,
/// action and qualifying request mimetype.
///
/// An action gets a generic (mimetype-less) entry when it declares no request
/// body or when at least one of its body mimetypes carries neither a schema
/// nor form parameters.
pub fn collect_spec_entries(
    spec: &ApiSpecification,
    registry: &mut ApiRegistry,
) -> Result<SpecEntries> {
    let binding = registry.bind(BindRequest::new(spec.location.clone()).base_uri(spec.base_uri.clone()))?;
    let prefix = registry.uri_prefix(binding)?;

    let mut resources: Vec<(&Resource, String)> = Vec::new();
    spec.walk(registry.settings().api_version.as_deref(), |resource, uri| {
        resources.push((resource, uri.to_string()))
    });

    let mut entries = IndexMap::new();
    for (resource, resource_uri) in resources {
        for action in &resource.actions {
            for entry in entries_for_action(binding, &prefix, resource, &resource_uri, action) {
                let triplet = entry.triplet();
                if entries.contains_key(&triplet) {
                    debug!("Endpoint {} is declared more than once", entry.name());
                    continue;
                }
                entries.insert(triplet, entry);
            }
        }
    }

    debug!(
        "Collected {} spec entries from {}",
        entries.len(),
        spec.location
    );
    Ok(SpecEntries { binding, entries })
}

fn entries_for_action(
    binding: BindingId,
    prefix: &str,
    resource: &Resource,
    resource_uri: &str,
    action: &Action,
) -> Vec<GenerationEntry> {
    let make = |mimetype: Option<MimeType>| GenerationEntry {
        binding,
        verb: action.verb,
        resource: resource_uri.to_string(),
        uri: format!("{}{}", prefix, resource_uri),
        resource_display_name: resource.display_name.clone(),
        action: action.clone(),
        mimetype,
    };

    let mut entries: Vec<GenerationEntry> = action
        .body
        .iter()
        .filter(|m| m.is_qualifying())
        .map(|m| make(Some(m.clone())))
        .collect();

    let needs_generic = action.body.is_empty() || action.body.iter().any(|m| !m.is_qualifying());
    if needs_generic {
        entries.push(make(None));
    }
    entries
}
