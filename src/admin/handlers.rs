use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::security::OffenderSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub tracked_offenders: usize,
    pub blocked_offenders: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.offenders.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        tracked_offenders: snapshot.len(),
        blocked_offenders: snapshot.iter().filter(|o| o.blocked_until.is_some()).count(),
    })
}

pub async fn get_offenders(State(state): State<AdminState>) -> Json<Vec<OffenderSnapshot>> {
    Json(state.offenders.snapshot())
}

pub async fn delete_offender(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> StatusCode {
    if state.offenders.reset(&address) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
