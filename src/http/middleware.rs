//! Admission middleware.
//! Runs the gateway in front of every downstream handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::SecurityConfig;
use crate::http::request::extract_context;
use crate::security::{CorsDecision, CorsHeaders, Gateway};

/// State required for admission.
#[derive(Clone)]
pub struct AdmissionState {
    pub gateway: Arc<Gateway>,
    pub security: Arc<SecurityConfig>,
    pub cors_headers: Arc<CorsHeaders>,
}

pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = extract_context(&request, &state.security);

    match state.gateway.admit(&ctx).await {
        Ok(decision @ CorsDecision::Preflight(_)) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            state.cors_headers.apply(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => {
            let mut response = next.run(request).await;
            state.cors_headers.apply(response.headers_mut(), &decision);
            response
        }
        Err(denied) => {
            tracing::info!(
                client = %ctx.client_address,
                tenant = %ctx.tenant_code,
                method = %ctx.method,
                reason = denied.code(),
                "Request denied"
            );
            denied.into_response()
        }
    }
}
