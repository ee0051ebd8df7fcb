use serde::Serialize;

use super::BindingId;
use crate::naming::HttpMethod;

/// Identity of an endpoint within one API binding.
///
/// Spec entries and existing flows are both reduced to triplets so that the
/// diff is a plain set difference. Equality is structural over all fields;
/// the same URI under two different bindings is two different endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Triplet {
    pub binding: BindingId,
    /// Listener base path + API path + resource URI
    pub uri: String,
    pub verb: HttpMethod,
    pub mimetype: Option<String>,
}

impl Triplet {
    pub fn new(
        binding: BindingId,
        uri: impl Into<String>,
        verb: HttpMethod,
        mimetype: Option<String>,
    ) -> Self {
        Self {
            binding,
            uri: uri.into(),
            verb,
            mimetype,
        }
    }
}
