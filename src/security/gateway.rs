//! Per-request admission orchestration.
//!
//! # Order
//! ```text
//! offender block check (fail fast)
//!     → trusted host check (denial counts as a failed attempt)
//!     → CORS check
//!     → admitted: forward, or answer the preflight
//! ```
//! Host trust runs before CORS so an untrusted host never learns anything
//! about the origin policy.

use std::sync::Arc;

use axum::http::Method;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::policy::{Authenticator, ConfigProvider, GlobalPolicy, PolicyResolver};
use crate::security::cors::{CorsDecision, CorsGuard};
use crate::security::error::GatewayError;
use crate::security::offenders::{blocked_reason, OffenderTracker};
use crate::security::trusted_host::TrustedHostGuard;

/// Address used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Facts extracted from one inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_address: String,
    pub host: Option<String>,
    pub origin: Option<String>,
    /// Empty for the global tenant.
    pub tenant_code: String,
    pub bearer_token: Option<String>,
    pub method: Method,
}

pub struct Gateway {
    offenders: Arc<OffenderTracker>,
    hosts: TrustedHostGuard,
    cors: CorsGuard,
}

impl Gateway {
    pub fn new(
        offenders: Arc<OffenderTracker>,
        provider: Arc<dyn ConfigProvider>,
        authenticator: Arc<dyn Authenticator>,
        global: GlobalPolicy,
    ) -> Self {
        let policies = Arc::new(PolicyResolver::new(provider, global));
        Self {
            offenders,
            hosts: TrustedHostGuard::new(policies.clone(), authenticator.clone()),
            cors: CorsGuard::new(policies, authenticator),
        }
    }

    /// Wire a gateway from configuration and the two external collaborators.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Arc<dyn ConfigProvider>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        let global = GlobalPolicy {
            trusted_hosts: config.security.default_trusted_hosts.clone(),
            cors_origins: config.security.default_cors_origins.clone(),
        };
        Self::new(
            Arc::new(OffenderTracker::new(&config.offenders)),
            provider,
            authenticator,
            global,
        )
    }

    pub fn offenders(&self) -> &Arc<OffenderTracker> {
        &self.offenders
    }

    /// Decide whether a request may proceed.
    pub async fn admit(&self, ctx: &RequestContext) -> Result<CorsDecision, GatewayError> {
        let outcome = self.evaluate(ctx).await;
        match &outcome {
            Ok(CorsDecision::Allow(_)) => metrics::record_decision("allow", "admitted"),
            Ok(CorsDecision::Preflight(_)) => metrics::record_decision("preflight", "admitted"),
            Err(e) => metrics::record_decision("deny", e.code()),
        }
        outcome
    }

    async fn evaluate(&self, ctx: &RequestContext) -> Result<CorsDecision, GatewayError> {
        let token = ctx.bearer_token.as_deref();

        if let (true, Some(until)) = self.offenders.is_blocked(&ctx.client_address) {
            tracing::debug!(client = %ctx.client_address, "Request from blocked client refused");
            return Err(GatewayError::ClientBlocked {
                address: ctx.client_address.clone(),
                reason: blocked_reason(until),
            });
        }

        if let Err(denied) = self
            .hosts
            .check(ctx.host.as_deref(), &ctx.tenant_code, token)
            .await
        {
            // Only a definite untrusted-host verdict counts against the client.
            if !matches!(denied, GatewayError::UntrustedHost { .. }) {
                return Err(denied);
            }
            let (now_blocked, reason) = self
                .offenders
                .register_attempt(&ctx.client_address, &ctx.tenant_code);
            if now_blocked {
                tracing::warn!(client = %ctx.client_address, reason = %reason, "Untrusted host attempts exhausted");
            }
            return Err(denied);
        }

        self.cors
            .check(
                ctx.origin.as_deref(),
                ctx.host.as_deref(),
                &ctx.tenant_code,
                &ctx.method,
                token,
            )
            .await
    }
}
