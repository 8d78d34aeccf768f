//! Host header validation against tenant and global allow-lists.
//!
//! # Order
//! 1. Hostname (port stripped, lower-cased) against the tenant list, or the
//!    global default when the tenant has none
//! 2. Superadmin bearer token bypass (audited)
//! 3. Deny
//!
//! Policy lookup and token resolution faults deny with `PolicyResolution`,
//! which does not count as an offender attempt.

use std::sync::Arc;

use crate::observability::logging::AUDIT_TARGET;
use crate::policy::{matches_any, Authenticator, PolicyResolver};
use crate::security::error::{CheckStage, GatewayError};

/// Hostname portion of a `Host` value: port removed, lower-cased.
///
/// Bracketed IPv6 literals keep their brackets (`[::1]:8000` → `[::1]`).
pub fn host_only(host: &str) -> String {
    let host = host.trim();
    let name = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
                name
            }
            _ => host,
        }
    };
    name.to_ascii_lowercase()
}

pub struct TrustedHostGuard {
    policies: Arc<PolicyResolver>,
    authenticator: Arc<dyn Authenticator>,
}

impl TrustedHostGuard {
    pub fn new(policies: Arc<PolicyResolver>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            policies,
            authenticator,
        }
    }

    pub async fn check(
        &self,
        host: Option<&str>,
        tenant_code: &str,
        bearer_token: Option<&str>,
    ) -> Result<(), GatewayError> {
        let hostname = host.map(host_only);
        let shown = hostname.clone().unwrap_or_default();

        let allowed = match self.policies.trusted_hosts(tenant_code).await {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(host = %shown, tenant = %tenant_code, error = %e, "Trusted host policy unavailable");
                return Err(GatewayError::PolicyResolution {
                    stage: CheckStage::TrustedHost,
                    value: shown,
                });
            }
        };

        if matches_any(hostname.as_deref(), &allowed) {
            return Ok(());
        }

        let Some(token) = bearer_token.filter(|t| !t.is_empty()) else {
            tracing::warn!(host = %shown, tenant = %tenant_code, "Rejected untrusted host");
            return Err(GatewayError::UntrustedHost { host: shown });
        };

        let identity = match self.authenticator.authenticate(token, tenant_code).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!(host = %shown, tenant = %tenant_code, error = %e, "Superadmin bypass could not be evaluated");
                return Err(GatewayError::PolicyResolution {
                    stage: CheckStage::TrustedHost,
                    value: shown,
                });
            }
        };

        if let Some(identity) = identity {
            if identity.is_superadmin() {
                tracing::info!(
                    target: AUDIT_TARGET,
                    client_id = %identity.client_id,
                    host = %shown,
                    tenant = %tenant_code,
                    "Superadmin bypassed trusted host check"
                );
                return Ok(());
            }
        }

        tracing::warn!(host = %shown, tenant = %tenant_code, "Rejected untrusted host");
        Err(GatewayError::UntrustedHost { host: shown })
    }
}
