//! Identity and configuration model shared by the collectors, the registry
//! and the diff.

mod apikit;
mod binding;
mod entry;
mod listener;
mod triplet;

pub use apikit::ApikitConfig;
pub use binding::{ApiBinding, BindingId};
pub use entry::GenerationEntry;
pub use listener::HttpListenerConfig;
pub use triplet::Triplet;

/// Join a listener base path and a listener path into the path prefix every
/// resource URI of the API is mounted under.
///
/// Repeated slashes collapse, a trailing `/*` wildcard and trailing slashes
/// are dropped, and the root path comes back empty so that
/// `complete_path(..) + "/pet"` is always a well formed URI.
pub fn complete_path(base_path: Option<&str>, path: Option<&str>) -> String {
    let joined = format!("/{}/{}", base_path.unwrap_or(""), path.unwrap_or(""));
    let mut collapsed = String::with_capacity(joined.len());
    for ch in joined.chars() {
        if ch == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(ch);
    }
    let trimmed = collapsed.strip_suffix("/*").unwrap_or(&collapsed);
    trimmed.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::complete_path;

    #[test]
    fn test_complete_path() {
        assert_eq!(complete_path(Some("/"), Some("/api/*")), "/api");
        assert_eq!(complete_path(Some("/"), Some("/")), "");
        assert_eq!(complete_path(None, None), "");
        assert_eq!(complete_path(Some("/base/"), Some("/v1/*")), "/base/v1");
        assert_eq!(complete_path(Some("base"), Some("api")), "/base/api");
        assert_eq!(complete_path(Some("/"), Some("/*")), "");
    }
}
