use serde::Serialize;

use super::{BindingId, Triplet};
use crate::naming::{FlowName, HttpMethod};
use crate::spec::{Action, MimeType};

/// One flow the API specification asks for, with everything a template needs to render it.
///
/// Entries are rebuilt from the specification on every run and never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationEntry {
    pub binding: BindingId,
    pub verb: HttpMethod,
    /// Resource URI relative to the API, e.g. `/pet/{petId}`
    pub resource: String,
    /// Full URI including listener base path and API path
    pub uri: String,
    pub resource_display_name: Option<String>,
    pub action: Action,
    /// The request body this flow handles; `None` for the generic flow
    pub mimetype: Option<MimeType>,
}

impl GenerationEntry {
    pub fn media_type(&self) -> Option<&str> {
        self.mimetype.as_ref().map(|m| m.media_type.as_str())
    }

    pub fn triplet(&self) -> Triplet {
        Triplet::new(
            self.binding,
            self.uri.clone(),
            self.verb,
            self.media_type().map(String::from),
        )
    }

    /// Human readable name, `get:/pet/{petId}:application/json`
    pub fn name(&self) -> String {
        let mut name = format!("{}:{}", self.verb, self.resource);
        if let Some(media_type) = self.media_type() {
            name.push(':');
            name.push_str(media_type);
        }
        name
    }

    /// Name of the flow element, routed to by the APIKit config `config`
    pub fn flow_name(&self, config: Option<&str>) -> String {
        FlowName::encode(self.verb.as_str(), &self.resource, self.media_type(), config)
    }

    /// File-system and identifier safe name for artifacts derived from this
    /// entry, such as generated tests.
    pub fn artifact_name(&self) -> String {
        let mut name = String::new();
        for ch in self.name().chars() {
            if ch.is_ascii_alphanumeric() {
                name.push(ch);
            } else if !name.ends_with('-') {
                name.push('-');
            }
        }
        name.trim_matches('-').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(mimetype: Option<&str>) -> GenerationEntry {
        GenerationEntry {
            binding: BindingId(0),
            verb: HttpMethod::Put,
            resource: "/pet/{petId}".into(),
            uri: "/api/pet/{petId}".into(),
            resource_display_name: None,
            action: Action::new(HttpMethod::Put),
            mimetype: mimetype.map(|m| {
                let mut mime = MimeType::new(m);
                mime.schema = Some(json!("Pet"));
                mime
            }),
        }
    }

    #[test]
    fn test_names() {
        let generic = entry(None);
        assert_eq!(generic.name(), "put:/pet/{petId}");
        assert_eq!(generic.flow_name(Some("pet-config")), r"put:\pet\(petId):pet-config");
        assert_eq!(generic.artifact_name(), "put-pet-petId");

        let json = entry(Some("application/json"));
        assert_eq!(json.name(), "put:/pet/{petId}:application/json");
        assert_eq!(
            json.flow_name(Some("pet-config")),
            r"put:\pet\(petId):application/json:pet-config"
        );
        assert_eq!(json.artifact_name(), "put-pet-petId-application-json");
    }

    #[test]
    fn test_triplet() {
        let json = entry(Some("application/json"));
        assert_eq!(
            json.triplet(),
            Triplet::new(
                BindingId(0),
                "/api/pet/{petId}",
                HttpMethod::Put,
                Some("application/json".into())
            )
        );
    }
}
