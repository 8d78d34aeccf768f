//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::policy::ClientType;

/// Root configuration for the admission gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Where admitted requests are forwarded.
    pub upstream: UpstreamConfig,

    /// Global security settings and default allow-lists.
    pub security: SecurityConfig,

    /// CORS response header settings.
    pub cors: CorsConfig,

    /// Abuse tracking thresholds.
    pub offenders: OffenderConfig,

    /// Per-tenant allow-lists keyed by tenant code.
    pub tenants: HashMap<String, TenantPolicyConfig>,

    /// Static bearer tokens.
    pub clients: Vec<ClientConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Downstream forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000"). Unset answers locally.
    pub address: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: None,
            request_timeout_secs: 30,
        }
    }
}

/// Global security settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Production mode disables the `token` query parameter.
    pub production: bool,

    /// Header carrying the tenant code.
    pub tenant_header: String,

    /// Trusted hosts for tenants without their own list.
    pub default_trusted_hosts: Vec<String>,

    /// CORS origins for tenants without their own list.
    pub default_cors_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            production: false,
            tenant_header: "x-tenant-code".to_string(),
            default_trusted_hosts: vec!["*".to_string()],
            default_cors_origins: vec!["*".to_string()],
        }
    }
}

/// CORS response header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub expose_headers: Vec<String>,

    /// Emit `Access-Control-Allow-Credentials: true` for reflected origins.
    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: ["authorization", "content-type", "accept", "x-tenant-code"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            expose_headers: vec!["x-request-id".to_string()],
            allow_credentials: true,
            max_age_secs: 600,
        }
    }
}

/// Failed-attempt tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OffenderConfig {
    /// Attempts allowed per window; the next one blocks.
    pub max_attempts: u32,

    /// Window length in seconds.
    pub window_secs: f64,

    /// Block duration in seconds.
    pub block_secs: f64,

    /// Interval between idle-record sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for OffenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 300.0,
            block_secs: 900.0,
            sweep_interval_secs: 60,
        }
    }
}

/// Allow-lists for one tenant.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TenantPolicyConfig {
    pub trusted_hosts: Vec<String>,
    pub cors_origins: Vec<String>,
}

/// A static bearer token and the identity it resolves to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub token: String,
    pub client_id: String,
    pub client_type: ClientType,

    /// Owning tenant; empty for global clients.
    #[serde(default)]
    pub tenant_code: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

/// Placeholder admin key; validation rejects it when the admin API is on.
pub const PLACEHOLDER_ADMIN_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_ADMIN_KEY.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
