//! # Configuration Module
//!
//! The gateway configuration is an immutable value built once at startup and
//! shared behind an `Arc` with every component. Nothing reads the environment
//! after [`GatewayConfig::load`] returns.
//!
//! ## Load Order
//! 1. Built-in defaults
//! 2. Optional YAML file named by `GATEWAY_CONFIG_PATH`
//! 3. Environment variable overrides
//! 4. Validation (all problems are reported at once)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::core::error::{GatewayError, GatewayResult};
use crate::core::types::{AccessToken, UpstreamCredential};

/// Header carrying the upstream credential on every forwarded call
pub const UPSTREAM_CREDENTIAL_HEADER: &str = "x-apisports-key";

/// Paths served by the gateway itself
const RESERVED_PATHS: [&str; 6] = ["/", "/healthz", "/myip", "/auth-check", "/leagues", "/meta/leagues"];

/// Main gateway configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    pub server: ServerConfig,

    /// Upstream API location, credential and timeouts
    pub upstream: UpstreamConfig,

    /// Shared-secret access control for the gateway itself
    pub access: AccessConfig,

    /// Curated reference data on disk
    pub reference: ReferenceConfig,

    /// IP discovery endpoint settings
    pub diagnostics: DiagnosticsConfig,

    /// Log level and output format
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration using the standard order: defaults, optional file, environment
    pub async fn load() -> GatewayResult<Self> {
        let mut config = match std::env::var("GATEWAY_CONFIG_PATH") {
            Ok(path) => Self::load_from_file(&path).await?,
            Err(_) => Self::default(),
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file without applying environment overrides
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await.map_err(|e| {
            GatewayError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> GatewayResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Most variables follow the pattern `GATEWAY_<SECTION>_<FIELD>`. The two
    /// secrets and the port also accept the short names deployments already use
    /// (`APISPORTS_KEY`, `PROXY_TOKEN`, `PORT`, `DATA_DIR`).
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> GatewayResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        // Server
        if let Some(port) = first(&["GATEWAY_SERVER_PORT", "PORT"]) {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| GatewayError::config(format!("Invalid PORT '{}': {}", port, e)))?;
        }

        if let Some(addr) = lookup("GATEWAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = addr;
        }

        if let Some(size) = lookup("GATEWAY_SERVER_MAX_BODY_SIZE") {
            self.server.max_body_size = size.trim().parse().map_err(|e| {
                GatewayError::config(format!("Invalid GATEWAY_SERVER_MAX_BODY_SIZE: {}", e))
            })?;
        }

        // Upstream
        if let Some(key) = first(&["APISPORTS_KEY", "GATEWAY_UPSTREAM_API_KEY"]) {
            self.upstream.api_key = Some(UpstreamCredential::new(key));
        }

        if let Some(base_url) = lookup("GATEWAY_UPSTREAM_BASE_URL") {
            self.upstream.base_url = base_url;
        }

        if let Some(timeout) = lookup("GATEWAY_UPSTREAM_TIMEOUT") {
            self.upstream.timeout = parse_duration("GATEWAY_UPSTREAM_TIMEOUT", &timeout)?;
        }

        if let Some(flag) = lookup("GATEWAY_UPSTREAM_FORCE_IPV4") {
            self.upstream.force_ipv4 = parse_bool("GATEWAY_UPSTREAM_FORCE_IPV4", &flag)?;
        }

        // Access
        if let Some(token) = first(&["PROXY_TOKEN", "GATEWAY_ACCESS_TOKEN"]) {
            self.access.token = Some(AccessToken::new(token));
        }

        if let Some(header) = lookup("GATEWAY_ACCESS_HEADER") {
            self.access.header_name = header;
        }

        // Reference data
        if let Some(dir) = first(&["GATEWAY_DATA_DIR", "DATA_DIR"]) {
            self.reference.data_dir = PathBuf::from(dir);
        }

        if let Some(flag) = lookup("GATEWAY_REFERENCE_CACHE") {
            self.reference.cache_enabled = parse_bool("GATEWAY_REFERENCE_CACHE", &flag)?;
        }

        if let Some(flag) = lookup("GATEWAY_REFERENCE_REQUIRE_AUTH") {
            self.reference.require_auth = parse_bool("GATEWAY_REFERENCE_REQUIRE_AUTH", &flag)?;
        }

        // Diagnostics
        if let Some(url) = lookup("GATEWAY_IP_ECHO_URL") {
            self.diagnostics.ip_echo_url = url;
        }

        if let Some(timeout) = lookup("GATEWAY_IP_ECHO_TIMEOUT") {
            self.diagnostics.ip_echo_timeout = parse_duration("GATEWAY_IP_ECHO_TIMEOUT", &timeout)?;
        }

        // Logging
        if let Some(level) = lookup("GATEWAY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("GATEWAY_LOG_FORMAT") {
            self.logging.format = format;
        }

        self.normalize();
        Ok(())
    }

    /// Empty secrets are treated as unset
    fn normalize(&mut self) {
        if self.upstream.api_key.as_ref().is_some_and(|k| k.is_empty()) {
            self.upstream.api_key = None;
        }
        if self.access.token.as_ref().is_some_and(|t| t.is_empty()) {
            self.access.token = None;
        }
    }

    /// Configuration validation with all problems collected into one error
    ///
    /// A missing upstream credential is deliberately not an error here: the
    /// gateway starts and answers forwards with a misconfiguration response.
    pub fn validate(&self) -> GatewayResult<()> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be greater than 0".to_string());
        }

        if self.server.bind_address.is_empty() {
            errors.push("server.bind_address cannot be empty".to_string());
        }

        if self.server.max_body_size == 0 {
            errors.push("server.max_body_size must be greater than 0".to_string());
        }

        match Url::parse(&self.upstream.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(format!(
                "upstream.base_url must use http or https, got '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!(
                "upstream.base_url '{}' is not a valid URL: {}",
                self.upstream.base_url, e
            )),
        }

        if self.upstream.timeout.is_zero() {
            errors.push("upstream.timeout must be greater than 0".to_string());
        }

        if axum::http::HeaderName::from_bytes(self.access.header_name.as_bytes()).is_err() {
            errors.push(format!(
                "access.header_name '{}' is not a valid header name",
                self.access.header_name
            ));
        }

        if !self.access.public_path.starts_with('/') {
            errors.push("access.public_path must start with '/'".to_string());
        } else if RESERVED_PATHS.contains(&self.access.public_path.as_str())
            || self.access.public_path.contains(&['*', ':', '{'][..])
        {
            errors.push(format!(
                "access.public_path '{}' collides with a built-in route",
                self.access.public_path
            ));
        }

        if Url::parse(&self.diagnostics.ip_echo_url).is_err() {
            errors.push(format!(
                "diagnostics.ip_echo_url '{}' is not a valid URL",
                self.diagnostics.ip_echo_url
            ));
        }

        if self.diagnostics.ip_echo_timeout.is_zero() {
            errors.push("diagnostics.ip_echo_timeout must be greater than 0".to_string());
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => errors.push(format!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "text" => {}
            _ => errors.push(format!("Invalid log format: {}", self.logging.format)),
        }

        if !errors.is_empty() {
            return Err(GatewayError::config(format!(
                "Configuration validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }

    /// Socket address the gateway listens on
    pub fn socket_addr(&self) -> GatewayResult<SocketAddr> {
        format!("{}:{}", self.server.bind_address, self.server.port)
            .parse()
            .map_err(|e| crate::config_error!("Invalid bind address: {}", e))
    }
}

fn parse_duration(key: &str, value: &str) -> GatewayResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| crate::config_error!("Invalid {}: {}", key, e))
}

fn parse_bool(key: &str, value: &str) -> GatewayResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::config_error!(
            "Invalid {}: expected a boolean, got '{}'",
            key,
            other
        )),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,

    /// HTTP port
    pub port: u16,

    /// Maximum inbound request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every forwarded path is appended to
    pub base_url: String,

    /// Credential injected as `x-apisports-key`; `None` degrades forwards to 500
    pub api_key: Option<UpstreamCredential>,

    /// Bound on a single upstream exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Bind outbound sockets to IPv4 only
    pub force_ipv4: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v3.football.api-sports.io".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            force_ipv4: false,
        }
    }
}

/// Access control configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Shared secret; when unset every gated request is rejected
    pub token: Option<AccessToken>,

    /// Header the secret is read from (matched case-insensitively)
    pub header_name: String,

    /// The one path that never requires the secret
    pub public_path: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            token: None,
            header_name: "x-proxy-token".to_string(),
            public_path: "/ip".to_string(),
        }
    }
}

/// Curated reference data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Directory holding `leagues_<YYYY>.json` and `leagues.json`
    pub data_dir: PathBuf,

    /// Keep parsed files in memory after the first successful load
    pub cache_enabled: bool,

    /// Whether the league lookup sits behind the access guard
    pub require_auth: bool,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_enabled: false,
            require_auth: true,
        }
    }
}

/// Diagnostic endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Public "what is my IP" service returning `{"ip": "..."}`
    pub ip_echo_url: String,

    #[serde(with = "humantime_serde")]
    pub ip_echo_timeout: Duration,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            ip_echo_url: "https://api.ipify.org?format=json".to_string(),
            ip_echo_timeout: Duration::from_secs(5),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    pub level: String,

    /// `json` or `text`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
