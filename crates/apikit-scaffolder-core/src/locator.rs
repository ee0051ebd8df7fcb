//! API file locators.
//!
//! An API binding is identified by the location of its API definition. The
//! same definition can be referenced as `src/main/resources/api/pet.raml`,
//! `api\pet.raml` or just `pet.raml` depending on who wrote the reference, so
//! locations are normalized before they are used as keys.
//!
//! Exchange dependencies are referenced through the sync protocol,
//! `resource::<group>:<asset>:<version>:<classifier>:<packager>:<file>`, and
//! are compared field by field rather than textually.

use std::fmt;
use std::str::FromStr;

/// Prefix of sync-protocol (Exchange) locators
pub const EXCHANGE_PREFIX: &str = "resource::";

/// Normalize an API file location into its registry key.
pub fn normalize(path: &str, resources_root: &str) -> String {
    if is_exchange(path) || is_remote(path) {
        return path.to_string();
    }
    let unified = path.replace('\\', "/");
    let root = resources_root.replace('\\', "/");
    let stripped = if root.is_empty() {
        unified.as_str()
    } else {
        match unified.find(&root) {
            Some(idx) => &unified[idx + root.len()..],
            None => unified.as_str(),
        }
    };
    stripped.trim_start_matches("./").to_string()
}

pub fn is_exchange(path: &str) -> bool {
    path.starts_with(EXCHANGE_PREFIX)
}

pub fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// File name of a location: the last path segment, or the file part of an
/// Exchange locator.
pub fn file_name(path: &str) -> String {
    if let Ok(locator) = path.parse::<ExchangeLocator>() {
        return locator.file;
    }
    path.replace('\\', "/")
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Whether the API location written in a configuration refers to the API
/// definition at `spec_location`.
pub fn matches(api_location: &str, spec_location: &str, resources_root: &str) -> bool {
    if is_exchange(api_location) || is_exchange(spec_location) {
        return match (
            api_location.parse::<ExchangeLocator>(),
            spec_location.parse::<ExchangeLocator>(),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
    }
    let api = normalize(api_location, resources_root);
    let spec = normalize(spec_location, resources_root);
    if api.is_empty() {
        return false;
    }
    spec == api || spec.ends_with(&format!("/{}", api))
}

/// A parsed `resource::` locator
#[derive(Debug, Clone, Eq)]
pub struct ExchangeLocator {
    pub group_id: String,
    pub asset_id: String,
    pub version: String,
    pub classifier: String,
    pub packager: String,
    pub file: String,
}

impl PartialEq for ExchangeLocator {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
            && self.asset_id == other.asset_id
            && self.version == other.version
            && self.file == other.file
    }
}

impl FromStr for ExchangeLocator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(EXCHANGE_PREFIX)
            .ok_or_else(|| format!("Not an Exchange locator: {}", s))?;
        let parts: Vec<&str> = rest.splitn(6, ':').collect();
        if parts.len() != 6 || parts.iter().any(|p| p.is_empty()) {
            return Err(format!("Malformed Exchange locator: {}", s));
        }
        Ok(Self {
            group_id: parts[0].to_string(),
            asset_id: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts[3].to_string(),
            packager: parts[4].to_string(),
            file: parts[5].to_string(),
        })
    }
}

impl fmt::Display for ExchangeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}:{}:{}:{}:{}",
            EXCHANGE_PREFIX,
            self.group_id,
            self.asset_id,
            self.version,
            self.classifier,
            self.packager,
            self.file
        )
    }
}
