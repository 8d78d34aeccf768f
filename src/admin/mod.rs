//! Operator API over offender state.
//!
//! Served on its own listener and guarded by a bearer API key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::security::OffenderTracker;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub offenders: Arc<OffenderTracker>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/offenders", get(get_offenders))
        .route("/admin/offenders/{address}", delete(delete_offender))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
