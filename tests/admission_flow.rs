//! End-to-end admission decisions through the full router.

use std::sync::Arc;

use admission_gateway::config::SecurityConfig;
use admission_gateway::http::{admission_middleware, AdmissionState};
use admission_gateway::policy::{
    ConfigProvider, GlobalPolicy, PolicyError, StaticTokenAuthenticator,
};
use admission_gateway::security::{CorsHeaders, Gateway, OffenderTracker};
use admission_gateway::HttpServer;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    middleware,
    routing::get,
    Router,
};

mod common;

use common::{request, send, test_config, ACME_USER_TOKEN, APP_ORIGIN, SUPERADMIN_TOKEN};

fn router() -> Router {
    HttpServer::new(test_config()).router()
}

fn cors_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("access-control-") || name.as_str() == "vary")
        .map(|(name, value)| (name.to_string(), value.to_str().unwrap().to_string()))
        .collect();
    pairs.sort();
    pairs
}

#[tokio::test]
async fn test_trusted_host_and_listed_origin_are_admitted() {
    let app = router();
    let reply = send(
        &app,
        request("203.0.113.1", "GET", "api.example.com")
            .header("Origin", APP_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], APP_ORIGIN);
    assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(reply.headers.contains_key("x-request-id"));
    assert_eq!(reply.json()["status"], "admitted");
}

#[tokio::test]
async fn test_untrusted_host_is_denied_with_reason() {
    let app = router();
    let reply = send(
        &app,
        request("203.0.113.2", "GET", "evil.com:8080")
            .header("Origin", APP_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(!reply.headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let body = reply.json();
    assert_eq!(body["error"], "untrusted_host");
    assert_eq!(body["host"], "evil.com");
    assert!(body["detail"].as_str().unwrap().contains("evil.com"));
}

#[tokio::test]
async fn test_superadmin_bypasses_untrusted_host() {
    let app = router();
    let reply = send(
        &app,
        request("203.0.113.3", "GET", "evil.com")
            .header("Authorization", format!("Bearer {SUPERADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_foreign_origin_is_rejected() {
    let app = router();
    let reply = send(
        &app,
        request("203.0.113.4", "GET", "api.example.com")
            .header("Origin", "https://evil.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let body = reply.json();
    assert_eq!(body["error"], "cors_origin_rejected");
    assert_eq!(body["origin"], "https://evil.com");
    assert_eq!(body["origin_hostname"], "evil.com");
}

#[tokio::test]
async fn test_authenticated_client_on_trusted_host_gets_foreign_origin() {
    let app = router();
    let reply = send(
        &app,
        request("203.0.113.5", "GET", "api.example.com")
            .header("Origin", "https://evil.com")
            .header("Authorization", format!("Bearer {ACME_USER_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://evil.com");
}

#[tokio::test]
async fn test_preflight_short_circuits_with_same_headers() {
    let app = router();
    let get = send(
        &app,
        request("203.0.113.6", "GET", "api.example.com")
            .header("Origin", APP_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let preflight = send(
        &app,
        request("203.0.113.6", "OPTIONS", "api.example.com")
            .header("Origin", APP_ORIGIN)
            .header("Access-Control-Request-Method", "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(preflight.status, StatusCode::NO_CONTENT);
    assert!(preflight.body.is_empty());
    assert_eq!(cors_headers(&preflight.headers), cors_headers(&get.headers));
}

#[tokio::test]
async fn test_same_origin_localhost_is_admitted() {
    let app = router();
    let reply = send(
        &app,
        request("127.0.0.1", "GET", "localhost:8000")
            .header("Origin", "http://localhost:8000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:8000");
}

#[tokio::test]
async fn test_tenant_policy_replaces_global_default() {
    let app = router();
    let tenant = send(
        &app,
        request("203.0.113.7", "GET", "api.acme.io")
            .header("X-Tenant-Code", "acme")
            .header("Origin", "https://portal.acme.io")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(tenant.status, StatusCode::OK);
    assert_eq!(tenant.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://portal.acme.io");

    let global = send(
        &app,
        request("203.0.113.8", "GET", "api.acme.io")
            .header("Origin", "https://portal.acme.io")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(global.status, StatusCode::FORBIDDEN);
    assert_eq!(global.json()["error"], "untrusted_host");
}

#[tokio::test]
async fn test_repeated_untrusted_hosts_block_the_address() {
    let app = router();
    let offender = "198.51.100.1";

    for _ in 0..3 {
        let reply = send(
            &app,
            request(offender, "GET", "evil.com").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
    }

    let blocked = send(
        &app,
        request(offender, "GET", "api.example.com")
            .header("Origin", APP_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(blocked.status, StatusCode::UNAUTHORIZED);
    let body = blocked.json();
    assert_eq!(body["error"], "client_blocked");
    assert!(body["detail"].as_str().unwrap().starts_with("Blocked until "));

    let bystander = send(
        &app,
        request("198.51.100.2", "GET", "api.example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(bystander.status, StatusCode::OK);
}

#[tokio::test]
async fn test_query_token_accepted_only_outside_production() {
    let dev = router();
    let reply = send(
        &dev,
        request("203.0.113.9", "GET", "evil.com")
            .uri(format!("/v1/collections?token={SUPERADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let mut config = test_config();
    config.security.production = true;
    let prod = HttpServer::new(config).router();
    let reply = send(
        &prod,
        request("203.0.113.9", "GET", "evil.com")
            .uri(format!("/v1/collections?token={SUPERADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

struct UnreachableStore;

#[async_trait]
impl ConfigProvider for UnreachableStore {
    async fn trusted_hosts(&self, _: &str) -> Result<Vec<String>, PolicyError> {
        Err(PolicyError::Unavailable("timeout".into()))
    }

    async fn cors_origins(&self, _: &str) -> Result<Vec<String>, PolicyError> {
        Err(PolicyError::Unavailable("timeout".into()))
    }
}

#[tokio::test]
async fn test_policy_outage_fails_closed_without_leaking_internals() {
    let config = test_config();
    let gateway = Gateway::new(
        Arc::new(OffenderTracker::new(&config.offenders)),
        Arc::new(UnreachableStore),
        Arc::new(StaticTokenAuthenticator::new(&config.clients)),
        GlobalPolicy::default(),
    );
    let state = AdmissionState {
        gateway: Arc::new(gateway),
        security: Arc::new(SecurityConfig::default()),
        cors_headers: Arc::new(CorsHeaders::new(&config.cors)),
    };
    let app = Router::new()
        .route("/v1/collections", get(|| async { "reached" }))
        .layer(middleware::from_fn_with_state(state, admission_middleware));

    let reply = send(
        &app,
        request("203.0.113.10", "GET", "api.example.com").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = reply.json();
    assert_eq!(body["error"], "host_check_failed");
    assert!(!reply.body.windows(7).any(|w| w == b"timeout"));
}
