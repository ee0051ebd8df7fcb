//! XML rendering of a [`ScaffoldPlan`].
//!
//! Every configuration file touched by a plan gets one rendered document. New
//! API files are complete Mule documents; for existing files the output holds
//! only the elements to add. Templates are embedded and can be overridden from
//! a directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use quick_xml::escape::escape;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tera::{Context, Tera};
use tokio::fs;

use crate::diff::ConfigChange;
use crate::model::HttpListenerConfig;
use crate::scaffold::{PlannedApi, PlannedFlow, ScaffoldPlan};
use crate::Result;

const DOCUMENT: &str = "mule.xml";

const TEMPLATES: [(&str, &str); 5] = [
    (DOCUMENT, include_str!("../templates/mule.xml.tera")),
    ("listener_config.xml", include_str!("../templates/listener_config.xml.tera")),
    ("apikit_config.xml", include_str!("../templates/apikit_config.xml.tera")),
    ("api_flows.xml", include_str!("../templates/api_flows.xml.tera")),
    ("flow.xml", include_str!("../templates/flow.xml.tera")),
];

/// Renders plans with tera
pub struct PlanRenderer {
    tera: Tera,
}

impl PlanRenderer {
    /// Renderer using the built-in templates
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.register_filter("xml", xml_filter);
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Ok(Self { tera })
    }

    /// Renderer where any `<name>.tera` file found in `template_dir` replaces
    /// the built-in template of the same name
    pub fn from_dir(template_dir: impl AsRef<Path>) -> Result<Self> {
        let template_dir = template_dir.as_ref();
        let mut renderer = Self::new()?;
        for (name, _) in TEMPLATES {
            let path = template_dir.join(format!("{}.tera", name));
            if path.is_file() {
                debug!("Overriding template {} with {}", name, path.display());
                renderer.tera.add_template_file(&path, Some(name))?;
            }
        }
        Ok(renderer)
    }

    /// Render one document per configuration file, keyed by file name
    pub fn render(&self, plan: &ScaffoldPlan) -> Result<IndexMap<String, String>> {
        let mut rendered = IndexMap::new();
        for (file, context) in file_contexts(plan) {
            let context = Context::from_serialize(&context)?;
            rendered.insert(file.to_string(), self.tera.render(DOCUMENT, &context)?);
        }
        Ok(rendered)
    }

    /// Render `plan` and write every document below `output_dir`
    pub async fn write(&self, plan: &ScaffoldPlan, output_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        let mut written = Vec::new();
        for (file, content) in self.render(plan)? {
            let path = output_dir.join(&file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, content).await?;
            debug!("Wrote {}", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

#[derive(Debug, Serialize)]
struct FileContext<'a> {
    file: &'a str,
    is_new: bool,
    listener_configs: Vec<&'a HttpListenerConfig>,
    apikit_configs: Vec<ApikitConfigContext>,
    apis: Vec<&'a PlannedApi>,
    flows: Vec<FlowContext<'a>>,
}

#[derive(Debug, Serialize)]
struct ApikitConfigContext {
    attributes: IndexMap<String, String>,
    /// Name of the element this one replaces
    replaces: Option<String>,
}

#[derive(Debug, Serialize)]
struct FlowContext<'a> {
    name: &'a str,
    flow_name: &'a str,
    example: Option<String>,
    example_media_type: Option<&'a str>,
}

impl<'a> From<&'a PlannedFlow> for FlowContext<'a> {
    fn from(flow: &'a PlannedFlow) -> Self {
        let example = flow.entry.action.success_example();
        Self {
            name: &flow.name,
            flow_name: &flow.flow_name,
            example: example
                .and_then(|(_, mime)| mime.example.as_ref())
                .map(|value| match value {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                }),
            example_media_type: example.map(|(_, mime)| mime.media_type.as_str()),
        }
    }
}

fn file_contexts(plan: &ScaffoldPlan) -> IndexMap<&str, FileContext<'_>> {
    let new_files = plan.new_api_files();
    let mut files: IndexMap<&str, FileContext<'_>> = IndexMap::new();

    fn entry<'p, 'm>(
        files: &'m mut IndexMap<&'p str, FileContext<'p>>,
        new_files: &[&str],
        file: &'p str,
    ) -> &'m mut FileContext<'p> {
        files.entry(file).or_insert_with(|| FileContext {
            file,
            is_new: new_files.contains(&file),
            listener_configs: Vec::new(),
            apikit_configs: Vec::new(),
            apis: Vec::new(),
            flows: Vec::new(),
        })
    }

    for api in plan.apis.iter().filter(|api| api.is_new) {
        entry(&mut files, &new_files, &api.file).apis.push(api);
    }
    for change in &plan.config_changes {
        let context = entry(&mut files, &new_files, change.file());
        match change {
            ConfigChange::InsertListenerConfig { config, .. } => context.listener_configs.push(config),
            ConfigChange::InsertApikitConfig { config, .. } => context.apikit_configs.push(ApikitConfigContext {
                attributes: config.attributes(),
                replaces: None,
            }),
            ConfigChange::ReplaceApikitConfig { existing, config, .. } => {
                context.apikit_configs.push(ApikitConfigContext {
                    attributes: config.attributes(),
                    replaces: Some(existing.name.clone()),
                })
            }
        }
    }
    for flow in &plan.flows {
        entry(&mut files, &new_files, &flow.file).flows.push(flow.into());
    }
    files
}

/// Escape a value for use in XML text or attribute content
fn xml_filter(value: &JsonValue, _: &HashMap<String, JsonValue>) -> tera::Result<JsonValue> {
    let raw = match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    Ok(JsonValue::String(escape_xml(&raw)))
}

/// Newlines become `&#10;` so they survive attribute value normalization
fn escape_xml(raw: &str) -> String {
    escape(raw).replace('\n', "&#10;")
}
