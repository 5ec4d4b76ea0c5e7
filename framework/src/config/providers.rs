//! Typed configuration sections
//!
//! Each section is a plain struct with a `from_env` constructor and builder
//! methods for overriding in code (tests construct them directly).

use super::env::env;

/// HTTP server binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env("APP_HOST", Self::default().host),
            port: env("APP_PORT", Self::default().port),
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Template locations and the compiled-program cache directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    /// Directories searched for templates, in order.
    pub paths: Vec<String>,
    /// Where compiled programs are cached.
    pub compiled: String,
    /// Template file extension.
    pub extension: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            paths: vec!["templates".to_string()],
            compiled: "storage/views".to_string(),
            extension: "blade.html".to_string(),
        }
    }
}

impl ViewConfig {
    pub fn new(paths: Vec<String>, compiled: String) -> Self {
        Self {
            paths,
            compiled,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let paths = env("VIEW_PATHS", defaults.paths.join(":"))
            .split(':')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            paths,
            compiled: env("VIEW_COMPILED", defaults.compiled),
            extension: defaults.extension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::default().host("0.0.0.0").port(3000);
        assert_eq!(config.address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_view_paths_split_on_colon() {
        std::env::set_var("VIEW_PATHS", "a/views:b/views");
        let config = ViewConfig::from_env();
        assert_eq!(config.paths, vec!["a/views", "b/views"]);
        std::env::remove_var("VIEW_PATHS");
    }
}
