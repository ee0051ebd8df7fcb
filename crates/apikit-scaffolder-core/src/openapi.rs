//! OpenAPI specification loading.
//!
//! This module loads OpenAPI 3 and Swagger 2 documents and lowers them to the
//! [`ApiSpecification`] tree the scaffolder walks.
//!
//! # Examples
//!
//! ```no_run
//! use apikit_scaffolder_core::openapi::OpenApiContext;
//! use apikit_scaffolder_core::error::Result;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let context = OpenApiContext::from_file("src/main/resources/api/petstore.yaml").await?;
//! let spec = context.to_specification("src/main/resources/api/petstore.yaml")?;
//! println!("{} top level resources", spec.resources.len());
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::naming::HttpMethod;
use crate::spec::{Action, ApiSpecification, MimeType, Resource, Response};
use crate::Error;

// External imports (alphabetized)
use log::debug;
use serde_json::{Map, Value as JsonValue};
use tokio::fs;
use url::Url;

const FORM_MEDIA_TYPES: [&str; 2] = ["application/x-www-form-urlencoded", "multipart/form-data"];
const DEFAULT_CONSUMES: &str = "application/json";
const MAX_REF_DEPTH: usize = 16;

/// Represents an OpenAPI specification
#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
pub struct OpenApiContext {
    /// The raw JSON value of the OpenAPI spec
    pub json: JsonValue,
}

impl OpenApiContext {
    /// Load a spec from a file or URL (supports both YAML and JSON)
    pub async fn from_file_or_url<P: AsRef<str>>(location: P) -> crate::Result<Self> {
        let location = location.as_ref();
        if let Ok(url) = Url::parse(location) {
            if matches!(url.scheme(), "http" | "https") {
                return Self::from_url(url.as_str()).await;
            }
        }
        Self::from_file(location).await
    }

    /// Load a spec from a file (supports both YAML and JSON)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse_content(&content).map_err(|e| {
            Error::spec(format!(
                "Failed to parse OpenAPI spec at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Load a spec from a URL (supports both YAML and JSON)
    pub async fn from_url(url: &str) -> crate::Result<Self> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::spec(format!("Failed to fetch OpenAPI spec from {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::spec(format!(
                "Failed to fetch OpenAPI spec from {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| Error::spec(format!("Failed to read response from {}: {}", url, e)))?;

        Self::parse_content(&content)
            .map_err(|e| Error::spec(format!("Failed to parse OpenAPI spec from {}: {}", url, e)))
    }

    /// Parse content as either JSON or YAML
    pub fn parse_content(content: &str) -> Result<Self, String> {
        if let Ok(json) = serde_json::from_str(content) {
            return Ok(Self { json });
        }
        if let Ok(json) = serde_yaml::from_str(content) {
            return Ok(Self { json });
        }
        Err("content is neither valid JSON nor YAML".to_string())
    }

    pub fn title(&self) -> Option<&str> {
        self.json.get("info")?.get("title")?.as_str()
    }

    pub fn version(&self) -> Option<&str> {
        self.json.get("info")?.get("version")?.as_str()
    }

    /// Get the base URI of the API
    pub fn base_path(&self) -> Option<String> {
        // OpenAPI 3.0+ servers
        if let Some(url) = self
            .json
            .get("servers")
            .and_then(JsonValue::as_array)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(JsonValue::as_str)
        {
            return Some(url.to_string());
        }

        // Swagger 2.0 host + basePath
        let host = self.json.get("host").and_then(JsonValue::as_str)?;
        let base_path = self
            .json
            .get("basePath")
            .and_then(JsonValue::as_str)
            .unwrap_or("");
        let scheme = match self.json.get("schemes").and_then(JsonValue::as_array) {
            Some(schemes) if schemes.iter().any(|s| s.as_str() == Some("https")) => "https",
            Some(schemes) => schemes.first().and_then(JsonValue::as_str).unwrap_or("https"),
            None => "https",
        };
        Some(format!("{}://{}{}", scheme, host, base_path))
    }

    fn is_swagger2(&self) -> bool {
        self.json.get("swagger").is_some()
    }

    /// Follow local `$ref` pointers until a non-reference value is reached
    fn resolve<'a>(&'a self, value: &'a JsonValue) -> crate::Result<&'a JsonValue> {
        let mut current = value;
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = current.get("$ref").and_then(JsonValue::as_str) else {
                return Ok(current);
            };
            let pointer = reference
                .strip_prefix('#')
                .ok_or_else(|| Error::spec(format!("Unsupported external reference '{}'", reference)))?;
            current = self
                .json
                .pointer(pointer)
                .ok_or_else(|| Error::spec(format!("Reference '{}' not found", reference)))?;
        }
        Err(Error::spec("Reference chain too deep"))
    }

    /// Lower the document to a resource tree, one top level resource per path.
    ///
    /// `location` is the location the API definition was loaded from; it
    /// identifies the API binding.
    pub fn to_specification(&self, location: &str) -> crate::Result<ApiSpecification> {
        let paths = self
            .json
            .get("paths")
            .and_then(JsonValue::as_object)
            .ok_or_else(|| Error::spec("Missing 'paths' object"))?;

        let mut spec = ApiSpecification::new(location);
        spec.base_uri = self.base_path();
        spec.version = self.version().map(String::from);

        for (path, item) in paths {
            let item = self.resolve(item)?;
            let mut resource = Resource::new(path.clone());
            resource.display_name = item
                .get("summary")
                .and_then(JsonValue::as_str)
                .map(String::from);

            for verb in HttpMethod::all() {
                let Some(operation) = item.get(verb.as_str()).and_then(JsonValue::as_object) else {
                    continue;
                };
                resource.actions.push(self.action(verb, item, operation)?);
            }
            debug!("Path {} declares {} actions", path, resource.actions.len());
            spec.resources.push(resource);
        }

        Ok(spec)
    }

    fn action(
        &self,
        verb: HttpMethod,
        path_item: &JsonValue,
        operation: &Map<String, JsonValue>,
    ) -> crate::Result<Action> {
        let mut action = Action::new(verb);
        action.body = if self.is_swagger2() {
            self.swagger2_body(path_item, operation)?
        } else {
            match operation.get("requestBody") {
                Some(body) => self.request_body(body)?,
                None => Vec::new(),
            }
        };

        if let Some(responses) = operation.get("responses").and_then(JsonValue::as_object) {
            for (code, response) in responses {
                action
                    .responses
                    .insert(code.clone(), self.response(self.resolve(response)?)?);
            }
        }
        Ok(action)
    }

    /// OpenAPI 3 `requestBody`
    fn request_body(&self, body: &JsonValue) -> crate::Result<Vec<MimeType>> {
        let body = self.resolve(body)?;
        let Some(content) = body.get("content").and_then(JsonValue::as_object) else {
            return Ok(Vec::new());
        };
        content
            .iter()
            .map(|(media_type, media)| {
                let mut mime = MimeType::new(media_type.clone());
                if let Some(schema) = media.get("schema") {
                    self.shape(&mut mime, schema)?;
                }
                mime.example = media_example(media);
                Ok(mime)
            })
            .collect()
    }

    /// Swagger 2 `body` and `formData` parameters, merged from the path item
    /// and the operation.
    fn swagger2_body(
        &self,
        path_item: &JsonValue,
        operation: &Map<String, JsonValue>,
    ) -> crate::Result<Vec<MimeType>> {
        let mut body_schema = None;
        let mut form_parameters = Vec::new();
        let declared = path_item
            .get("parameters")
            .and_then(JsonValue::as_array)
            .into_iter()
            .chain(operation.get("parameters").and_then(JsonValue::as_array))
            .flatten();
        for parameter in declared {
            let parameter = self.resolve(parameter)?;
            match parameter.get("in").and_then(JsonValue::as_str) {
                Some("body") => body_schema = parameter.get("schema").cloned(),
                Some("formData") => {
                    if let Some(name) = parameter.get("name").and_then(JsonValue::as_str) {
                        form_parameters.push(name.to_string());
                    }
                }
                _ => {}
            }
        }
        if body_schema.is_none() && form_parameters.is_empty() {
            return Ok(Vec::new());
        }

        let consumes: Vec<String> = operation
            .get("consumes")
            .or_else(|| self.json.get("consumes"))
            .and_then(JsonValue::as_array)
            .map(|types| {
                types
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| vec![DEFAULT_CONSUMES.to_string()]);

        Ok(consumes
            .into_iter()
            .map(|media_type| {
                let mut mime = MimeType::new(media_type);
                if is_form(&mime.media_type) {
                    mime.form_parameters = form_parameters.clone();
                } else {
                    mime.schema = body_schema.clone();
                }
                mime
            })
            .collect())
    }

    /// Record the schema of a body, or its properties for form bodies
    fn shape(&self, mime: &mut MimeType, schema: &JsonValue) -> crate::Result<()> {
        if is_form(&mime.media_type) {
            if let Some(properties) = self.resolve(schema)?.get("properties").and_then(JsonValue::as_object) {
                mime.form_parameters = properties.keys().cloned().collect();
                return Ok(());
            }
        }
        mime.schema = Some(schema.clone());
        Ok(())
    }

    fn response(&self, response: &JsonValue) -> crate::Result<Response> {
        let mut body = Vec::new();
        if let Some(content) = response.get("content").and_then(JsonValue::as_object) {
            for (media_type, media) in content {
                let mut mime = MimeType::new(media_type.clone());
                mime.schema = media.get("schema").cloned();
                mime.example = media_example(media);
                body.push(mime);
            }
        }
        if let Some(examples) = response.get("examples").and_then(JsonValue::as_object) {
            for (media_type, example) in examples {
                let mut mime = MimeType::new(media_type.clone());
                mime.schema = response.get("schema").cloned();
                mime.example = Some(example.clone());
                body.push(mime);
            }
        }
        Ok(Response {
            description: response
                .get("description")
                .and_then(JsonValue::as_str)
                .map(String::from),
            body,
        })
    }
}

fn is_form(media_type: &str) -> bool {
    FORM_MEDIA_TYPES.contains(&media_type)
}

/// `example`, or the value of the first entry of `examples`
fn media_example(media: &JsonValue) -> Option<JsonValue> {
    media.get("example").cloned().or_else(|| {
        media
            .get("examples")
            .and_then(JsonValue::as_object)
            .and_then(|examples| examples.values().next())
            .and_then(|example| example.get("value"))
            .cloned()
    })
}
