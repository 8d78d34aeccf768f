//! Admission denial taxonomy.
//!
//! Every denial renders as a JSON body with a stable `error` code, a `detail`
//! message and the offending value. Internal fault text stays in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Which guard failed to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    TrustedHost,
    Cors,
}

/// Why a request was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Invalid host header: {host}")]
    UntrustedHost { host: String },

    #[error("Origin {origin} is not allowed")]
    CorsOriginRejected { origin: String, origin_host: String },

    #[error("{reason}")]
    ClientBlocked { address: String, reason: String },

    /// Tenant configuration could not be read. Never treated as allow.
    #[error("{} failed", stage_label(.stage))]
    PolicyResolution { stage: CheckStage, value: String },
}

fn stage_label(stage: &CheckStage) -> &'static str {
    match stage {
        CheckStage::TrustedHost => "Trusted host check",
        CheckStage::Cors => "CORS middleware evaluation",
    }
}

impl GatewayError {
    /// Stable machine-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::UntrustedHost { .. } => "untrusted_host",
            GatewayError::CorsOriginRejected { .. } => "cors_origin_rejected",
            GatewayError::ClientBlocked { .. } => "client_blocked",
            GatewayError::PolicyResolution {
                stage: CheckStage::TrustedHost,
                ..
            } => "host_check_failed",
            GatewayError::PolicyResolution {
                stage: CheckStage::Cors,
                ..
            } => "cors_middleware_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::UntrustedHost { .. } | GatewayError::CorsOriginRejected { .. } => {
                StatusCode::FORBIDDEN
            }
            GatewayError::ClientBlocked { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::PolicyResolution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let body = match &self {
            GatewayError::UntrustedHost { host } => {
                json!({ "error": self.code(), "detail": detail, "host": host })
            }
            GatewayError::CorsOriginRejected {
                origin,
                origin_host,
            } => json!({
                "error": self.code(),
                "detail": detail,
                "origin": origin,
                "origin_hostname": origin_host,
            }),
            GatewayError::ClientBlocked { address, .. } => {
                json!({ "error": self.code(), "detail": detail, "client": address })
            }
            GatewayError::PolicyResolution {
                stage: CheckStage::TrustedHost,
                value,
            } => json!({ "error": self.code(), "detail": detail, "host": value }),
            GatewayError::PolicyResolution {
                stage: CheckStage::Cors,
                value,
            } => json!({ "error": self.code(), "detail": detail, "origin": value }),
        };
        (self.status(), Json(body)).into_response()
    }
}
