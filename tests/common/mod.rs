//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use admission_gateway::config::{ClientConfig, GatewayConfig, TenantPolicyConfig};
use admission_gateway::policy::ClientType;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const SUPERADMIN_TOKEN: &str = "sa-token";
pub const ACME_USER_TOKEN: &str = "acme-user-token";
pub const APP_ORIGIN: &str = "https://app.example.com";

/// A config with global defaults restricted to example.com and one tenant.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.default_trusted_hosts = vec!["*.example.com".into(), "localhost".into()];
    config.security.default_cors_origins = vec![APP_ORIGIN.into()];
    config.offenders.max_attempts = 2;
    config.offenders.window_secs = 60.0;
    config.offenders.block_secs = 60.0;

    let mut tenants = HashMap::new();
    tenants.insert(
        "acme".to_string(),
        TenantPolicyConfig {
            trusted_hosts: vec!["re:^(?:.+\\.)?acme\\.io$".into()],
            cors_origins: vec!["https://*.acme.io".into()],
        },
    );
    config.tenants = tenants;

    config.clients = vec![
        ClientConfig {
            token: SUPERADMIN_TOKEN.into(),
            client_id: "ops".into(),
            client_type: ClientType::Superadmin,
            tenant_code: String::new(),
        },
        ClientConfig {
            token: ACME_USER_TOKEN.into(),
            client_id: "acme-portal".into(),
            client_type: ClientType::ApiUser,
            tenant_code: "acme".into(),
        },
    ];
    config
}

/// Request builder pre-populated with a peer address.
pub fn request(from: &str, method: &str, host: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri("/v1/collections").header("Host", host).extension(ConnectInfo(
        format!("{from}:40000").parse::<SocketAddr>().unwrap(),
    ))
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Drive the router in-process.
pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply { status, headers, body }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });
    addr
}
