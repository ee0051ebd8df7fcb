//! Reconciliation diff.
//!
//! Decides which flows have to be generated, given what the specification
//! asks for and what the configuration already has, and which config
//! elements have to be inserted or rewritten.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::ScaffolderConfig;
use crate::locator;
use crate::model::{ApiBinding, ApikitConfig, GenerationEntry, HttpListenerConfig, Triplet};

/// Entries of `spec` that have no counterpart in `existing`, sorted by name.
///
/// When no binding was read from existing configuration, or none of its flows
/// were recognised, every spec entry is returned.
pub fn missing_entries(
    spec: &IndexMap<Triplet, GenerationEntry>,
    existing: &HashSet<Triplet>,
    has_existing_bindings: bool,
) -> Vec<GenerationEntry> {
    let mut missing: Vec<GenerationEntry> = if !has_existing_bindings || existing.is_empty() {
        spec.values().cloned().collect()
    } else {
        spec.iter()
            .filter(|(triplet, _)| !existing.contains(*triplet))
            .map(|(_, entry)| entry.clone())
            .collect()
    };
    missing.sort_by_key(GenerationEntry::name);
    missing
}

/// A config element the templating layer has to write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConfigChange {
    InsertApikitConfig {
        file: String,
        config: ApikitConfig,
    },
    /// Rewrite an existing element in place
    ReplaceApikitConfig {
        file: String,
        existing: ApikitConfig,
        config: ApikitConfig,
    },
    InsertListenerConfig {
        file: String,
        config: HttpListenerConfig,
    },
}

impl ConfigChange {
    pub fn file(&self) -> &str {
        match self {
            Self::InsertApikitConfig { file, .. }
            | Self::ReplaceApikitConfig { file, .. }
            | Self::InsertListenerConfig { file, .. } => file,
        }
    }
}

/// The APIKit config the binding should have after this run
pub fn fresh_apikit_config(
    binding: &ApiBinding,
    existing: Option<&ApikitConfig>,
    settings: &ScaffolderConfig,
) -> ApikitConfig {
    let mut config = match existing {
        Some(existing) => existing.clone(),
        None => ApikitConfig::for_api(&binding.id, &binding.api_file_path),
    };
    if !locator::matches(&config.api_location, &binding.api_file_path, &settings.resources_root) {
        config.api_location = binding.api_file_path.clone();
    }
    if settings.extension_enabled.is_some() {
        config.set_extension_enabled(settings.extension_enabled);
    }
    config
}

/// Compare the config a binding should have with the one it has.
///
/// `existing` is the config read from `file`, if any. Returns `None` when the
/// existing element already carries every attribute of the fresh config.
pub fn apikit_config_change(
    binding: &ApiBinding,
    existing: Option<(&ApikitConfig, &str)>,
    target_file: &str,
    settings: &ScaffolderConfig,
) -> Option<ConfigChange> {
    match existing {
        Some((existing, file)) => {
            let config = fresh_apikit_config(binding, Some(existing), settings);
            config.differs_from(existing).then(|| ConfigChange::ReplaceApikitConfig {
                file: file.to_string(),
                existing: existing.clone(),
                config,
            })
        }
        None => Some(ConfigChange::InsertApikitConfig {
            file: target_file.to_string(),
            config: fresh_apikit_config(binding, None, settings),
        }),
    }
}
