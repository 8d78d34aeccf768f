//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts ≥ 1, positive windows)
//! - Detect duplicate client tokens
//! - Report malformed allow-rules as warnings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Malformed `re:` rules do not reject the config; they never match at runtime

use std::collections::HashSet;
use std::str::FromStr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};
use crate::policy::pattern::invalid_rules;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be {expected}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("duplicate token for client '{0}'")]
    DuplicateToken(String),
    #[error("{field} is not a valid host:port authority: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("admin.api_key must be changed when the admin API is enabled")]
    PlaceholderAdminKey,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::Empty("listener.bind_address"));
    }
    if config.security.tenant_header.trim().is_empty() {
        errors.push(ValidationError::Empty("security.tenant_header"));
    }

    if let Some(addr) = &config.upstream.address {
        if Authority::from_str(addr).is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "upstream.address",
                value: addr.clone(),
            });
        }
    }

    let offenders = &config.offenders;
    if offenders.max_attempts < 1 {
        errors.push(ValidationError::OutOfRange {
            field: "offenders.max_attempts",
            expected: "at least 1",
        });
    }
    if !(offenders.window_secs.is_finite() && offenders.window_secs > 0.0) {
        errors.push(ValidationError::OutOfRange {
            field: "offenders.window_secs",
            expected: "a positive number",
        });
    }
    if !(offenders.block_secs.is_finite() && offenders.block_secs > 0.0) {
        errors.push(ValidationError::OutOfRange {
            field: "offenders.block_secs",
            expected: "a positive number",
        });
    }
    if offenders.sweep_interval_secs == 0 {
        errors.push(ValidationError::OutOfRange {
            field: "offenders.sweep_interval_secs",
            expected: "at least 1",
        });
    }

    let mut tokens = HashSet::new();
    for client in &config.clients {
        if client.token.is_empty() {
            errors.push(ValidationError::Empty("clients.token"));
        } else if !tokens.insert(client.token.as_str()) {
            errors.push(ValidationError::DuplicateToken(client.client_id.clone()));
        }
    }

    if config.admin.enabled && config.admin.api_key == PLACEHOLDER_ADMIN_KEY {
        errors.push(ValidationError::PlaceholderAdminKey);
    }

    warn_invalid_rules("security.default_trusted_hosts", &config.security.default_trusted_hosts);
    warn_invalid_rules("security.default_cors_origins", &config.security.default_cors_origins);
    for (code, tenant) in &config.tenants {
        warn_invalid_rules(&format!("tenants.{code}.trusted_hosts"), &tenant.trusted_hosts);
        warn_invalid_rules(&format!("tenants.{code}.cors_origins"), &tenant.cors_origins);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn warn_invalid_rules(field: &str, rules: &[String]) {
    for err in invalid_rules(rules) {
        tracing::warn!(field = %field, error = %err, "Allow-rule will never match");
    }
}
