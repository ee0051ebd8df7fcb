//! Reconciliation runs.
//!
//! A [`Scaffolder`] reads the existing configuration, walks every API
//! specification and produces a [`ScaffoldPlan`]: the flows that are missing,
//! the files new APIs get and the config elements that have to be written.
//! The plan is data only; [`crate::render`] turns it into XML.

use std::collections::HashSet;

use log::{debug, info};
use serde::Serialize;

use crate::collect::{collect_existing_entries, collect_spec_entries};
use crate::config::ScaffolderConfig;
use crate::diff::{apikit_config_change, missing_entries, ConfigChange};
use crate::error::ScaffoldError;
use crate::model::{ApiBinding, ApikitConfig, BindingId, GenerationEntry};
use crate::registry::ApiRegistry;
use crate::spec::ApiSpecification;
use crate::xml::ConfigDocument;
use crate::Result;

/// A flow to generate
#[derive(Debug, Clone, Serialize)]
pub struct PlannedFlow {
    /// `get:/pet:application/json`
    pub name: String,
    /// Name of the flow element
    pub flow_name: String,
    /// Configuration file the flow belongs to
    pub file: String,
    pub entry: GenerationEntry,
}

/// An API being scaffolded
#[derive(Debug, Clone, Serialize)]
pub struct PlannedApi {
    pub binding: BindingId,
    pub id: String,
    pub api_location: String,
    pub base_uri: Option<String>,
    /// Configuration file owning the main flow
    pub file: String,
    pub path: Option<String>,
    pub http_listener_config: Option<String>,
    pub apikit_config: String,
    pub main_flow: String,
    pub console_flow: String,
    /// No configuration file references this API yet
    pub is_new: bool,
}

/// Everything one run decided
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScaffoldPlan {
    pub apis: Vec<PlannedApi>,
    pub flows: Vec<PlannedFlow>,
    pub config_changes: Vec<ConfigChange>,
    /// Documents that could not be reconciled
    pub errors: Vec<ScaffoldError>,
}

impl ScaffoldPlan {
    /// Files a fresh API creates
    pub fn new_api_files(&self) -> Vec<&str> {
        self.apis
            .iter()
            .filter(|api| api.is_new)
            .map(|api| api.file.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty() && self.config_changes.is_empty() && self.new_api_files().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Runs reconciliations with a fixed configuration
#[derive(Debug, Clone)]
pub struct Scaffolder {
    config: ScaffolderConfig,
}

impl Scaffolder {
    pub fn new(config: ScaffolderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScaffolderConfig {
        &self.config
    }

    /// Reconcile `specs` against `documents`.
    ///
    /// Existing configuration is read first so that APIs already wired keep
    /// their listener and APIKit configs. A document that cannot be read is
    /// reported in [`ScaffoldPlan::errors`] and does not stop the run. Specs
    /// whose locations normalize to the same API are planned once.
    pub fn run(&self, specs: &[ApiSpecification], documents: &[ConfigDocument]) -> Result<ScaffoldPlan> {
        let mut registry = ApiRegistry::new(self.config.clone());
        let locations: Vec<&str> = specs.iter().map(|s| s.location.as_str()).collect();

        let existing = collect_existing_entries(documents, &locations, &mut registry);
        let has_existing_bindings = registry.has_existing_bindings();

        let mut plan = ScaffoldPlan {
            errors: existing.errors.clone(),
            ..Default::default()
        };
        let mut planned_listeners = HashSet::new();
        let mut planned_bindings = HashSet::new();

        for spec in specs {
            let spec_entries = collect_spec_entries(spec, &mut registry)?;
            if !planned_bindings.insert(spec_entries.binding) {
                debug!("{} resolves to an API already planned, skipping", spec.location);
                continue;
            }
            let binding = registry.binding(spec_entries.binding);
            let api = plan_api(spec_entries.binding, binding, &registry);

            let flow_config = (!registry.is_unnamed_config(&api.apikit_config)).then_some(api.apikit_config.as_str());
            for entry in missing_entries(&spec_entries.entries, &existing.triplets, has_existing_bindings) {
                plan.flows.push(PlannedFlow {
                    name: entry.name(),
                    flow_name: entry.flow_name(flow_config),
                    file: api.file.clone(),
                    entry,
                });
            }

            let registered = binding
                .apikit_config
                .as_deref()
                .and_then(|name| registry.apikit_config_named(name))
                .map(|r| (&r.config, r.file.as_str()));
            if let Some(change) = apikit_config_change(binding, registered, &api.file, &self.config) {
                plan.config_changes.push(change);
            }

            if let Some(listener) = binding
                .http_listener_config
                .as_deref()
                .and_then(|name| registry.listener_config(name))
                .filter(|listener| !listener.persisted)
            {
                if planned_listeners.insert(listener.name.clone()) {
                    plan.config_changes.push(ConfigChange::InsertListenerConfig {
                        file: api.file.clone(),
                        config: listener.clone(),
                    });
                }
            }

            debug!("API '{}' planned into {}", api.id, api.file);
            plan.apis.push(api);
        }

        info!(
            "Planned {} flows and {} config changes for {} APIs ({} errors)",
            plan.flows.len(),
            plan.config_changes.len(),
            plan.apis.len(),
            plan.errors.len()
        );
        Ok(plan)
    }
}

fn plan_api(id: BindingId, binding: &ApiBinding, registry: &ApiRegistry) -> PlannedApi {
    let apikit_config = binding
        .apikit_config
        .clone()
        .unwrap_or_else(|| ApikitConfig::for_api(&binding.id, &binding.api_file_path).name);
    let base_uri = binding.base_uri.clone().or_else(|| {
        let listener = registry.listener_config(binding.http_listener_config.as_deref()?)?;
        let path = binding.path.as_deref().unwrap_or_default();
        Some(format!(
            "{}/{}",
            listener.base_uri(),
            path.trim_start_matches('/').trim_end_matches("/*")
        ))
    });
    PlannedApi {
        binding: id,
        id: binding.id.clone(),
        api_location: binding.api_file_path.clone(),
        base_uri,
        file: binding
            .config_file
            .clone()
            .unwrap_or_else(|| binding.default_config_file()),
        path: binding.path.clone(),
        http_listener_config: binding.http_listener_config.clone(),
        apikit_config,
        main_flow: binding.main_flow_name(),
        console_flow: binding.console_flow_name(),
        is_new: binding.config_file.is_none(),
    }
}
