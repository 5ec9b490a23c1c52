//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Path layout and request handling.
    pub gateway: GatewaySection,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    pub security: SecurityConfig,

    /// Session pool sizing.
    pub pool: PoolConfig,

    /// Authorization groups and the built-in user directory.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Request path layout and dispatch behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySection {
    /// First path segment every request must carry (e.g. `/rest_ws/...`).
    pub service_name: String,

    /// Prefix stripped before path parsing (e.g. "/api"). Empty for none.
    pub mount_path: String,

    /// Discard every session after one request.
    pub reload_after_request: bool,

    /// Response charset when neither the operation nor the request picks one.
    pub default_charset: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            service_name: "rest_ws".to_string(),
            mount_path: String::new(),
            reload_after_request: false,
            default_charset: "UTF-8".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Concurrent checkouts allowed per session key.
    pub max_sessions_per_key: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_sessions_per_key: 8 }
    }
}

/// Authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Groups allowed in. Absent means no group check at all.
    pub authorized_groups: Option<Vec<String>>,

    /// Users of the built-in directory.
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
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
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.service_name, "rest_ws");
        assert_eq!(config.gateway.default_charset, "UTF-8");
        assert!(config.auth.authorized_groups.is_none());
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn test_auth_section() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [auth]
            authorized_groups = ["sales", "admin"]

            [[auth.users]]
            name = "alice"
            password = "wonder"
            groups = ["sales"]
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.authorized_groups.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(config.auth.users[0].name, "alice");
    }
}
