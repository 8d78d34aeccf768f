//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admission middleware in front of all routes
//! - Wire up middleware (tracing, request ID, body limit, timeout)
//! - Forward admitted requests to the upstream
//! - Run background tasks (offender sweeping, config reload, admin API)

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{setup_admin_router, AdminState};
use crate::config::GatewayConfig;
use crate::http::middleware::{admission_middleware, AdmissionState};
use crate::policy::{StaticTokenAuthenticator, TenantPolicyStore};
use crate::security::{CorsHeaders, Gateway};

/// State for the downstream forwarding handler.
#[derive(Clone)]
pub struct ForwardState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Option<Authority>,
}

/// HTTP server for the admission gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    gateway: Arc<Gateway>,
    policies: Arc<TenantPolicyStore>,
    clients: Arc<StaticTokenAuthenticator>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let policies = Arc::new(TenantPolicyStore::new(&config.tenants));
        let clients = Arc::new(StaticTokenAuthenticator::new(&config.clients));
        let gateway = Arc::new(Gateway::from_config(&config, policies.clone(), clients.clone()));

        let admission = AdmissionState {
            gateway: gateway.clone(),
            security: Arc::new(config.security.clone()),
            cors_headers: Arc::new(CorsHeaders::new(&config.cors)),
        };

        let forward = ForwardState {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            upstream: config
                .upstream
                .address
                .as_deref()
                .and_then(|addr| Authority::from_str(addr).ok()),
        };

        let router = Self::build_router(&config, admission, forward);
        Self {
            router,
            config,
            gateway,
            policies,
            clients,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, admission: AdmissionState, forward: ForwardState) -> Router {
        Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .with_state(forward)
            .layer(middleware::from_fn_with_state(admission, admission_middleware))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.upstream.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let offenders = self.gateway.offenders().clone();
        tokio::spawn(offenders.clone().run_sweeper(
            Duration::from_secs(self.config.offenders.sweep_interval_secs),
            shutdown.resubscribe(),
        ));

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin = setup_admin_router(AdminState {
                offenders,
                api_key: Arc::from(self.config.admin.api_key.as_str()),
            });
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %admin_listener.local_addr()?, "Admin API starting");
            tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }

        let policies = self.policies.clone();
        let clients = self.clients.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => {
                            policies.replace(&new_config.tenants);
                            clients.reload(&new_config.clients);
                            tracing::info!("Configuration reloaded; offender and default policy settings apply on restart");
                        }
                        None => return,
                    },
                    _ = reload_shutdown.recv() => return,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Downstream handler for admitted requests.
/// Forwards to the upstream when one is configured, otherwise answers locally.
async fn forward_handler(State(state): State<ForwardState>, request: Request<Body>) -> Response {
    let Some(upstream) = state.upstream.clone() else {
        return Json(json!({ "status": "admitted" })).into_response();
    };

    let (mut parts, body) = request.into_parts();
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(upstream);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URI");
            return upstream_error();
        }
    };

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream error");
            upstream_error()
        }
    }
}

fn upstream_error() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({ "error": "upstream_unavailable", "detail": "Upstream request failed" })),
    )
        .into_response()
}
