//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the SSR server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SsrConfig {
    /// Listener and request-level settings.
    pub server: ServerConfig,

    /// Application layout and environment mode.
    pub app: AppConfig,

    /// Development server settings (ignored in production).
    pub dev: DevConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Runtime environment, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Assets transformed and server entry reloaded on every request.
    #[default]
    #[serde(alias = "dev")]
    Development,
    /// Assets precompiled; server entry imported once.
    #[serde(alias = "prod")]
    Production,
}

impl Mode {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Mode::Development)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Mode::Development),
            "prod" | "production" => Ok(Mode::Production),
            other => Err(format!(
                "unknown mode '{other}' (expected development or production)"
            )),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, `ip:port` or `host:port` (e.g., "0.0.0.0:5173").
    pub bind_address: String,

    /// Total time allowed for a single request, in seconds. Slower requests
    /// get `408 Request Timeout`; `0` disables the limit.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5173".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Application layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment mode.
    pub mode: Mode,

    /// Project root the dev server is bound to.
    pub root: PathBuf,

    /// HTML template containing the injection markers.
    pub index: PathBuf,

    /// Production build output (contains `client/` and the server entry).
    pub dist: PathBuf,

    /// Server entry specifier loaded through the dev server, relative to `root`.
    pub dev_entry: String,

    /// Precompiled server entry, relative to `dist`.
    pub prod_entry: String,

    /// Quiet the dev server's own logging (test runs).
    pub test: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            root: PathBuf::from("."),
            index: PathBuf::from("index.html"),
            dist: PathBuf::from("dist"),
            dev_entry: "/src/entry-server".to_string(),
            prod_entry: "server/entry-server".to_string(),
            test: false,
        }
    }
}

impl AppConfig {
    /// Directory of precompiled client assets.
    pub fn client_dir(&self) -> PathBuf {
        self.dist.join("client")
    }
}

/// Development server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DevConfig {
    /// Directory under `root` served verbatim before the root itself.
    pub public_dir: String,

    /// URL path of the injected dev client script.
    pub client_path: String,

    /// Inject the dev client script into the template.
    pub inject_client: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            public_dir: "public".to_string(),
            client_path: "/@ssr/client".to_string(),
            inject_client: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: SsrConfig = toml::from_str("").unwrap();
        assert_eq!(config.app.mode, Mode::Development);
        assert_eq!(config.app.index, PathBuf::from("index.html"));
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.dev.client_path, "/@ssr/client");
    }

    #[test]
    fn test_mode_aliases() {
        let config: SsrConfig = toml::from_str("[app]\nmode = \"prod\"").unwrap();
        assert_eq!(config.app.mode, Mode::Production);

        let config: SsrConfig = toml::from_str("[app]\nmode = \"development\"").unwrap();
        assert!(config.app.mode.is_dev());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("PROD".parse::<Mode>(), Ok(Mode::Production));
        assert_eq!("dev".parse::<Mode>(), Ok(Mode::Development));
        assert!("staging".parse::<Mode>().is_err());
    }

    #[test]
    fn test_client_dir_is_under_dist() {
        let mut app = AppConfig::default();
        app.dist = PathBuf::from("/srv/build");
        assert_eq!(app.client_dir(), PathBuf::from("/srv/build/client"));
    }
}
