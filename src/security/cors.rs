//! Cross-origin admission and CORS response headers.
//!
//! # Precedence (first match wins)
//! 1. Same origin (loopback aliases are interchangeable)
//! 2. Allow-list contains `*`, or no `Origin` header
//! 3. Origin, or its hostname, matches the allow-list
//! 4. Host is trusted and the bearer token resolves to any client
//! 5. Bearer token resolves to a superadmin
//! 6. Deny
//!
//! # Design Decisions
//! - The bearer token is resolved at most once per check
//! - `OPTIONS` turns an allow into a preflight answered by the gateway itself

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::config::CorsConfig;
use crate::observability::logging::AUDIT_TARGET;
use crate::policy::pattern::ANY;
use crate::policy::{matches_any, resolve_identity, Authenticator, PolicyError, PolicyResolver};
use crate::security::error::{CheckStage, GatewayError};
use crate::security::trusted_host::host_only;

const LOOPBACK_ALIASES: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// An admitted cross-origin decision carrying the `Access-Control-Allow-Origin` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsDecision {
    /// Proceed downstream, then attach CORS headers.
    Allow(String),
    /// Answer the `OPTIONS` request directly with 204.
    Preflight(String),
}

impl CorsDecision {
    pub fn allow_origin(&self) -> &str {
        match self {
            CorsDecision::Allow(origin) | CorsDecision::Preflight(origin) => origin,
        }
    }
}

/// Hostname of an origin such as `https://App.example.com:8443`.
pub fn origin_hostname(origin: &str) -> Option<String> {
    Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
}

fn is_loopback(hostname: &str) -> bool {
    LOOPBACK_ALIASES.contains(&hostname)
}

/// Whether `origin` names the same host the request was sent to.
pub fn is_same_origin(host: &str, origin: &str) -> bool {
    let Some(origin_host) = origin_hostname(origin) else {
        return false;
    };
    let host = host_only(host);
    host == origin_host || (is_loopback(&host) && is_loopback(&origin_host))
}

pub struct CorsGuard {
    policies: Arc<PolicyResolver>,
    authenticator: Arc<dyn Authenticator>,
}

impl CorsGuard {
    pub fn new(policies: Arc<PolicyResolver>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            policies,
            authenticator,
        }
    }

    pub async fn check(
        &self,
        origin: Option<&str>,
        host: Option<&str>,
        tenant_code: &str,
        method: &Method,
        bearer_token: Option<&str>,
    ) -> Result<CorsDecision, GatewayError> {
        let shown = origin.unwrap_or_default().to_string();

        match self.evaluate(origin, host, tenant_code, bearer_token).await {
            Ok(Some(echo)) if method == Method::OPTIONS => Ok(CorsDecision::Preflight(echo)),
            Ok(Some(echo)) => Ok(CorsDecision::Allow(echo)),
            Ok(None) => {
                let origin_host = origin.and_then(origin_hostname).unwrap_or_default();
                tracing::warn!(
                    origin = %shown,
                    origin_hostname = %origin_host,
                    tenant = %tenant_code,
                    "Rejected cross-origin request"
                );
                Err(GatewayError::CorsOriginRejected {
                    origin: shown,
                    origin_host,
                })
            }
            Err(e) => {
                tracing::error!(origin = %shown, tenant = %tenant_code, error = %e, "CORS policy unavailable");
                Err(GatewayError::PolicyResolution {
                    stage: CheckStage::Cors,
                    value: shown,
                })
            }
        }
    }

    /// The origin value to echo, or `None` to deny.
    async fn evaluate(
        &self,
        origin: Option<&str>,
        host: Option<&str>,
        tenant_code: &str,
        bearer_token: Option<&str>,
    ) -> Result<Option<String>, PolicyError> {
        let allowed = self.policies.cors_origins(tenant_code).await?;

        if let (Some(origin), Some(host)) = (origin, host) {
            if is_same_origin(host, origin) {
                return Ok(Some(origin.to_string()));
            }
        }

        let Some(origin) = origin else {
            return Ok(Some(wildcard_echo(None, &allowed)));
        };
        if allowed.iter().any(|rule| rule == ANY) {
            return Ok(Some(wildcard_echo(Some(origin), &allowed)));
        }

        let origin_host = origin_hostname(origin);
        if matches_any(Some(origin), &allowed) || matches_any(origin_host.as_deref(), &allowed) {
            return Ok(Some(origin.to_string()));
        }

        let trusted = self.policies.trusted_hosts(tenant_code).await?;
        let identity = resolve_identity(self.authenticator.as_ref(), bearer_token, tenant_code).await;

        if let Some(identity) = &identity {
            if matches_any(host.map(host_only).as_deref(), &trusted) {
                tracing::info!(
                    target: AUDIT_TARGET,
                    client_id = %identity.client_id,
                    client_type = %identity.client_type,
                    origin = %origin,
                    tenant = %tenant_code,
                    "Authenticated client on trusted host admitted for foreign origin"
                );
                return Ok(Some(origin.to_string()));
            }
            if identity.is_superadmin() {
                tracing::info!(
                    target: AUDIT_TARGET,
                    client_id = %identity.client_id,
                    origin = %origin,
                    tenant = %tenant_code,
                    "Superadmin bypassed CORS origin check"
                );
                return Ok(Some(origin.to_string()));
            }
        }

        Ok(None)
    }
}

/// Echo value when the list contains `*` or the request has no origin.
///
/// A list of exactly `["*"]` echoes `*`; otherwise the origin is reflected,
/// or the list itself is joined when there is no origin.
fn wildcard_echo(origin: Option<&str>, allowed: &[String]) -> String {
    if allowed.len() == 1 && allowed[0] == ANY {
        return ANY.to_string();
    }
    match origin {
        Some(origin) => origin.to_string(),
        None => allowed.join(","),
    }
}

/// Pre-rendered CORS response headers.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_methods: Option<HeaderValue>,
    allow_headers: Option<HeaderValue>,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
    allow_credentials: bool,
}

impl CorsHeaders {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allow_methods: joined(&config.allow_methods),
            allow_headers: joined(&config.allow_headers),
            expose_headers: joined(&config.expose_headers),
            max_age: HeaderValue::from(config.max_age_secs),
            allow_credentials: config.allow_credentials,
        }
    }

    /// Attach the headers for an admitted decision.
    pub fn apply(&self, headers: &mut HeaderMap, decision: &CorsDecision) {
        let echo = decision.allow_origin();
        match HeaderValue::from_str(echo) {
            Ok(value) => {
                headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            }
            Err(_) => {
                tracing::warn!(allow_origin = %echo, "Allow-origin value is not a valid header");
                return;
            }
        }
        if self.allow_credentials && echo != ANY {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        set(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &self.allow_methods);
        set(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, &self.allow_headers);
        set(headers, header::ACCESS_CONTROL_EXPOSE_HEADERS, &self.expose_headers);
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

fn joined(values: &[String]) -> Option<HeaderValue> {
    if values.is_empty() {
        return None;
    }
    HeaderValue::from_str(&values.join(", ")).ok()
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &Option<HeaderValue>) {
    if let Some(value) = value {
        headers.insert(name, value.clone());
    }
}
