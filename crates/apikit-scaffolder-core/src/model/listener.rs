use serde::Serialize;

/// An HTTP listener configuration: a named host/port/protocol binding.
#[derive(Debug, Clone, Serialize)]
pub struct HttpListenerConfig {
    pub name: String,
    pub base_path: String,
    pub host: String,
    /// Port as written in the configuration; may be a property placeholder
    pub port: String,
    pub protocol: String,
    /// Read from an existing file, must not be generated again
    pub persisted: bool,
}

impl HttpListenerConfig {
    pub fn new(
        name: impl Into<String>,
        base_path: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_path: base_path.into(),
            host: host.into(),
            port: port.into(),
            protocol: protocol.into(),
            persisted: false,
        }
    }

    pub fn persisted(mut self) -> Self {
        self.persisted = true;
        self
    }

    /// The port as a number, if it is one
    pub fn numeric_port(&self) -> Option<u16> {
        self.port.trim().parse().ok()
    }

    /// `http://host:port/basePath` for documentation and console flows
    pub fn base_uri(&self) -> String {
        let scheme = self.protocol.to_lowercase();
        let base = self.base_path.trim_matches('/');
        if base.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, base)
        }
    }
}

impl PartialEq for HttpListenerConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.base_path == other.base_path
            && self.host == other.host
            && self.port == other.port
            && self.protocol == other.protocol
    }
}

impl Eq for HttpListenerConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_persisted() {
        let synthesized = HttpListenerConfig::new("api-httpListenerConfig", "/", "0.0.0.0", "8081", "HTTP");
        let read = synthesized.clone().persisted();
        assert_eq!(synthesized, read);
        assert!(read.persisted && !synthesized.persisted);
    }

    #[test]
    fn test_numeric_port() {
        let numeric = HttpListenerConfig::new("a", "/", "localhost", "8082", "HTTP");
        let placeholder = HttpListenerConfig::new("b", "/", "localhost", "${http.port}", "HTTP");
        assert_eq!(numeric.numeric_port(), Some(8082));
        assert_eq!(placeholder.numeric_port(), None);
    }

    #[test]
    fn test_base_uri() {
        let config = HttpListenerConfig::new("a", "/base/", "0.0.0.0", "8081", "HTTPS");
        assert_eq!(config.base_uri(), "https://0.0.0.0:8081/base");
        let root = HttpListenerConfig::new("a", "/", "0.0.0.0", "8081", "HTTP");
        assert_eq!(root.base_uri(), "http://0.0.0.0:8081");
    }
}
