//! Flow-name codec.
//!
//! APIKit finds the flow that handles a request by name, so the flow name is
//! the serialized key that ties a configuration file back to an endpoint of
//! the API contract. A name has the shape
//!
//! ```text
//! verb:resource[:mimetype][:config]
//! ```
//!
//! where `resource` is written with `/` replaced by `\` and `{`/`}` replaced
//! by `(`/`)`, e.g. `get:\pet\(petId):application/json:api-config`.
//!
//! A three-group name is ambiguous. Its third group is a config name when it
//! belongs to the set of config names known to the caller, otherwise it is a
//! mimetype. Decoding therefore happens in two stages: [`tokenize`] splits the
//! name into groups, [`FlowName::decode`] resolves the third group against an
//! explicit set of known config names.
//!
//! # Examples
//!
//! ```
//! use std::collections::HashSet;
//! use apikit_scaffolder_core::naming::{FlowName, HttpMethod};
//!
//! let encoded = FlowName::encode("get", "/pet/{id}", None, Some("api-config"));
//! assert_eq!(encoded, r"get:\pet\(id):api-config");
//!
//! let known: HashSet<String> = ["api-config".to_string()].into();
//! let decoded = FlowName::decode(&encoded, &known).unwrap();
//! assert_eq!(decoded.resource, "/pet/{id}");
//! assert_eq!(decoded.config.as_deref(), Some("api-config"));
//! assert_eq!(decoded.method().unwrap(), HttpMethod::Get);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FLOW_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^:]+):(/[^:]*)(:([^:]+))?(:(.*))?$").expect("flow name pattern is valid")
});

/// HTTP methods an APIKit router dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Patch,
    Options,
    Trace,
    Connect,
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "head" => Ok(HttpMethod::Head),
            "patch" => Ok(HttpMethod::Patch),
            "options" => Ok(HttpMethod::Options),
            "trace" => Ok(HttpMethod::Trace),
            "connect" => Ok(HttpMethod::Connect),
            _ => Err(format!("Unknown HTTP method: {}", s)),
        }
    }
}

impl HttpMethod {
    /// Lowercase form used inside flow names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Patch => "patch",
            Self::Options => "options",
            Self::Trace => "trace",
            Self::Connect => "connect",
        }
    }

    /// Returns an iterator over all known methods
    pub fn all() -> impl Iterator<Item = Self> {
        use HttpMethod::*;
        [Get, Post, Put, Delete, Head, Patch, Options, Trace, Connect]
            .iter()
            .copied()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Replace the reserved path characters with their flow-name forms
pub fn escape(name: &str) -> String {
    name.replace('/', "\\").replace('{', "(").replace('}', ")")
}

/// Inverse of [`escape`]
pub fn unescape(name: &str) -> String {
    name.replace('\\', "/").replace('(', "{").replace(')', "}")
}

/// Raw groups of a flow name before the third group is disambiguated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNameTokens {
    pub verb: String,
    pub resource: String,
    pub third: Option<String>,
    pub fourth: Option<String>,
}

/// Split an (unescaped) flow name into its groups.
///
/// Returns `None` for anything that is not an APIKit flow name.
pub fn tokenize(flow_name: &str) -> Option<FlowNameTokens> {
    if flow_name.trim().is_empty() {
        return None;
    }
    let unescaped = unescape(flow_name);
    let caps = FLOW_NAME.captures(&unescaped)?;
    Some(FlowNameTokens {
        verb: caps.get(1)?.as_str().to_string(),
        resource: caps.get(2)?.as_str().to_string(),
        third: caps.get(4).map(|m| m.as_str().to_string()),
        fourth: caps.get(6).map(|m| m.as_str().to_string()),
    })
}

/// A decoded flow name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowName {
    pub verb: String,
    pub resource: String,
    pub mimetype: Option<String>,
    pub config: Option<String>,
}

impl FlowName {
    /// Build the serialized flow name for an endpoint
    pub fn encode(
        verb: &str,
        resource: &str,
        mimetype: Option<&str>,
        config: Option<&str>,
    ) -> String {
        let mut parts = vec![verb.to_string(), escape(resource)];
        parts.extend(mimetype.map(String::from));
        parts.extend(config.map(String::from));
        parts.join(":")
    }

    /// Parse a flow name, resolving an ambiguous third group against the
    /// config names the caller already knows about.
    pub fn decode(flow_name: &str, known_configs: &HashSet<String>) -> Option<Self> {
        let tokens = tokenize(flow_name)?;
        let (mimetype, config) = match (tokens.third, tokens.fourth) {
            (Some(third), Some(fourth)) => (Some(third), Some(fourth)),
            (Some(third), None) if known_configs.contains(&third) => (None, Some(third)),
            (Some(third), None) => (Some(third), None),
            (None, fourth) => (None, fourth),
        };
        Some(Self {
            verb: tokens.verb,
            resource: tokens.resource,
            mimetype,
            config,
        })
    }

    /// The HTTP method of this flow, or `None` if the verb is not one the
    /// router understands.
    pub fn method(&self) -> Option<HttpMethod> {
        self.verb.parse().ok()
    }

    /// Serialized form of this flow name
    pub fn to_encoded(&self) -> String {
        Self::encode(
            &self.verb,
            &self.resource,
            self.mimetype.as_deref(),
            self.config.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn configs(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_escapes_path() {
        assert_eq!(FlowName::encode("get", "/pet/{id}", None, None), r"get:\pet\(id)");
        assert_eq!(
            FlowName::encode("post", "/pet", Some("application/json"), Some("api-config")),
            r"post:\pet:application/json:api-config"
        );
    }

    #[test]
    fn test_decode_two_groups() {
        let decoded = FlowName::decode(r"get:\pet", &HashSet::new()).unwrap();
        assert_eq!(
            decoded,
            FlowName {
                verb: "get".into(),
                resource: "/pet".into(),
                mimetype: None,
                config: None,
            }
        );
    }

    #[test]
    fn test_decode_third_group_is_config_when_known() {
        let decoded = FlowName::decode(r"get:\pet:api-config", &configs(&["api-config"])).unwrap();
        assert_eq!(decoded.mimetype, None);
        assert_eq!(decoded.config.as_deref(), Some("api-config"));
    }

    #[test]
    fn test_decode_third_group_is_mimetype_when_unknown() {
        let decoded = FlowName::decode(r"put:\pet:application/json", &configs(&["api-config"])).unwrap();
        assert_eq!(decoded.mimetype.as_deref(), Some("application/json"));
        assert_eq!(decoded.config, None);
    }

    #[test]
    fn test_decode_four_groups() {
        let decoded =
            FlowName::decode(r"post:\pet\(id):application/xml:api-config", &HashSet::new()).unwrap();
        assert_eq!(decoded.resource, "/pet/{id}");
        assert_eq!(decoded.mimetype.as_deref(), Some("application/xml"));
        assert_eq!(decoded.config.as_deref(), Some("api-config"));
    }

    #[test]
    fn test_decode_rejects_foreign_names() {
        let known = HashSet::new();
        assert!(FlowName::decode("", &known).is_none());
        assert!(FlowName::decode("   ", &known).is_none());
        assert!(FlowName::decode("api-main", &known).is_none());
        assert!(FlowName::decode("get:pet", &known).is_none());
        assert!(FlowName::decode(":/pet", &known).is_none());
    }

    #[test]
    fn test_unknown_verb_is_not_a_method() {
        let decoded = FlowName::decode(r"fetch:\pet", &HashSet::new()).unwrap();
        assert_eq!(decoded.method(), None);
        let decoded = FlowName::decode(r"PATCH:\pet", &HashSet::new()).unwrap();
        assert_eq!(decoded.method(), Some(HttpMethod::Patch));
    }

    #[test]
    fn test_http_method_from_str() {
        for method in HttpMethod::all() {
            assert_eq!(method.as_str().parse::<HttpMethod>().unwrap(), method);
            assert_eq!(method.to_string().to_uppercase().parse::<HttpMethod>().unwrap(), method);
        }
        assert!("".parse::<HttpMethod>().is_err());
    }

    fn path_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-zA-Z0-9_.-]{1,8}|\\{[a-zA-Z]{1,6}\\}", 0..4)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    proptest! {
        #[test]
        fn prop_encode_decode_roundtrip(
            method in prop::sample::select(HttpMethod::all().collect::<Vec<_>>()),
            path in path_strategy(),
            mimetype in prop::option::of("(application|text)/[a-z+]{1,10}"),
            config in prop::option::of("[a-z][a-z0-9-]{0,10}-config"),
        ) {
            let known: HashSet<String> = config.iter().cloned().collect();
            let encoded = FlowName::encode(method.as_str(), &path, mimetype.as_deref(), config.as_deref());
            prop_assert!(!encoded.contains('/') || mimetype.is_some());
            let decoded = FlowName::decode(&encoded, &known).unwrap();
            prop_assert_eq!(decoded.verb, method.as_str());
            prop_assert_eq!(decoded.resource, path);
            prop_assert_eq!(decoded.mimetype, mimetype);
            prop_assert_eq!(decoded.config, config);
        }
    }
}
