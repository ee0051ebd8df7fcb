//! In-memory view of a parsed API specification.
//!
//! The grammar-level parsing of RAML/OAS documents happens elsewhere; this
//! module only describes the tree the engine walks: nested resources, the
//! actions declared on them and the request-body mimetypes of each action.
//! The tree can be deserialized from YAML or JSON, or built from an OpenAPI
//! document with [`crate::openapi::OpenApiContext::to_specification`].

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;

use crate::naming::HttpMethod;

/// Root of a parsed API specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSpecification {
    /// Location of the API definition file
    pub location: String,
    /// `baseUri` declared by the API, if any
    #[serde(default)]
    pub base_uri: Option<String>,
    /// API version, substituted for `{version}` in resource URIs
    #[serde(default)]
    pub version: Option<String>,
    /// Top level resources
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl ApiSpecification {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            base_uri: None,
            version: None,
            resources: Vec::new(),
        }
    }

    /// Load a serialized specification tree (YAML or JSON)
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        if let Ok(spec) = serde_json::from_str(&content) {
            return Ok(spec);
        }
        serde_yaml::from_str(&content).map_err(|e| {
            crate::Error::spec(format!(
                "Failed to parse specification tree at {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Visit every resource depth-first, parents before children, together
    /// with its resolved URI.
    pub fn walk<'a>(&'a self, version: Option<&str>, mut visit: impl FnMut(&'a Resource, &str)) {
        fn go<'a>(
            resources: &'a [Resource],
            parent: &str,
            version: Option<&str>,
            visit: &mut dyn FnMut(&'a Resource, &str),
        ) {
            for resource in resources {
                let uri = resource.resolved_uri(parent, version);
                visit(resource, &uri);
                go(&resource.resources, &uri, version, visit);
            }
        }
        let version = version.or(self.version.as_deref());
        go(&self.resources, "", version, &mut visit);
    }
}

/// A resource and its nested resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// URI relative to the parent resource, e.g. `/{petId}`
    pub relative_uri: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Resource {
    pub fn new(relative_uri: impl Into<String>) -> Self {
        Self {
            relative_uri: relative_uri.into(),
            display_name: None,
            actions: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Full URI of this resource below `parent`, with `{version}` replaced
    pub fn resolved_uri(&self, parent: &str, version: Option<&str>) -> String {
        let uri = format!("{}{}", parent, self.relative_uri);
        match version {
            Some(v) => uri.replace("{version}", v),
            None => uri,
        }
    }
}

/// An action (HTTP method) declared on a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub verb: HttpMethod,
    /// Declared request bodies, one per mimetype
    #[serde(default)]
    pub body: Vec<MimeType>,
    /// Declared responses keyed by status code
    #[serde(default)]
    pub responses: IndexMap<String, Response>,
}

impl Action {
    pub fn new(verb: HttpMethod) -> Self {
        Self {
            verb,
            body: Vec::new(),
            responses: IndexMap::new(),
        }
    }

    /// First declared success response example, used by generated flows
    pub fn success_example(&self) -> Option<(&str, &MimeType)> {
        self.responses
            .iter()
            .filter(|(code, _)| code.starts_with('2'))
            .flat_map(|(code, resp)| resp.body.iter().map(move |m| (code.as_str(), m)))
            .find(|(_, m)| m.example.is_some())
    }
}

/// A request or response body declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimeType {
    pub media_type: String,
    /// Schema name or inline schema, when one is declared
    #[serde(default)]
    pub schema: Option<JsonValue>,
    /// Form parameter names
    #[serde(default)]
    pub form_parameters: Vec<String>,
    #[serde(default)]
    pub example: Option<JsonValue>,
}

impl MimeType {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            schema: None,
            form_parameters: Vec::new(),
            example: None,
        }
    }

    /// A mimetype gets its own flow only when it carries a shape: a schema
    /// or at least one form parameter.
    pub fn is_qualifying(&self) -> bool {
        self.schema.is_some() || !self.form_parameters.is_empty()
    }
}

/// A declared response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub body: Vec<MimeType>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn pet_spec() -> ApiSpecification {
        let mut by_id = Resource::new("/{petId}");
        by_id.actions.push(Action::new(HttpMethod::Get));
        let mut pets = Resource::new("/{version}/pets");
        pets.actions.push(Action::new(HttpMethod::Get));
        pets.resources.push(by_id);
        let mut spec = ApiSpecification::new("pet.raml");
        spec.version = Some("v1".into());
        spec.resources.push(pets);
        spec
    }

    #[test]
    fn test_walk_resolves_nested_uris() {
        let spec = pet_spec();
        let mut uris = Vec::new();
        spec.walk(None, |_, uri| uris.push(uri.to_string()));
        assert_eq!(uris, vec!["/v1/pets", "/v1/pets/{petId}"]);

        let mut overridden = Vec::new();
        spec.walk(Some("v2"), |_, uri| overridden.push(uri.to_string()));
        assert_eq!(overridden, vec!["/v2/pets", "/v2/pets/{petId}"]);
    }

    #[test]
    fn test_qualifying_mimetype() {
        let mut mime = MimeType::new("application/json");
        assert!(!mime.is_qualifying());
        mime.schema = Some(json!("Pet"));
        assert!(mime.is_qualifying());

        let mut form = MimeType::new("application/x-www-form-urlencoded");
        form.form_parameters.push("name".into());
        assert!(form.is_qualifying());
    }

    #[test]
    fn test_success_example_skips_errors() {
        let mut action = Action::new(HttpMethod::Get);
        let mut error_body = MimeType::new("application/json");
        error_body.example = Some(json!({"error": true}));
        action.responses.insert(
            "404".into(),
            Response {
                description: None,
                body: vec![error_body],
            },
        );
        let mut ok_body = MimeType::new("application/json");
        ok_body.example = Some(json!({"id": 1}));
        action.responses.insert(
            "200".into(),
            Response {
                description: None,
                body: vec![ok_body],
            },
        );
        let (code, mime) = action.success_example().unwrap();
        assert_eq!(code, "200");
        assert_eq!(mime.example, Some(json!({"id": 1})));
    }

    #[tokio::test]
    async fn test_from_file_yaml() -> crate::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("tree.yaml");
        let yaml = r#"
location: src/main/resources/api/pet.raml
resources:
  - relative_uri: /pet
    actions:
      - verb: post
        body:
          - media_type: application/json
            schema: Pet
"#;
        tokio::fs::write(&path, yaml).await?;
        let spec = ApiSpecification::from_file(&path).await?;
        assert_eq!(spec.resources[0].actions[0].verb, HttpMethod::Post);
        assert!(spec.resources[0].actions[0].body[0].is_qualifying());
        Ok(())
    }
}
