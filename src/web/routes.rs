//! HTTP routes
//!
//! `POST /api/logins` trusts the caller: it is meant for the host's login
//! pipeline on a private interface. The admin routes check the capabilities the
//! host forwards with each request.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use cached::Cached;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::middleware::Caller;
use super::AppState;
use crate::stats::report::ChartSeries;
use crate::stats::{LoginReport, MetricsSnapshot, StoreResult, UserRecord};

pub const ACCESS_DENIED: &str = "You do not have sufficient permissions to access this page.";

/// Denial response unless the caller holds a report capability
pub fn deny_unless_admin(state: &AppState, caller: &Caller) -> Option<Response> {
    if caller.can_any(&state.report_capabilities) {
        None
    } else {
        Some((StatusCode::FORBIDDEN, ACCESS_DENIED).into_response())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

/// API: Count a login notification from the host. Always accepted.
///
/// The supplied user record and its roles are trusted as-is, so this route must
/// only be reachable by the host application, never by end users.
pub async fn record_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> StatusCode {
    state.stats.handle_login(&request.login, request.user).await;
    StatusCode::ACCEPTED
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: LoginReport,
    #[serde(flatten)]
    pub chart: ChartSeries,
}

/// Report for today from this app's cache, built on a miss. Failures are
/// not cached.
async fn get_cached_report(state: &AppState) -> StoreResult<LoginReport> {
    let today = state.stats.today();
    let mut cache = state.report_cache.lock().await;
    if let Some(report) = cache.cache_get(&today) {
        return Ok(report.clone());
    }

    let report = state.stats.report_for(today).await?;
    cache.cache_set(today, report.clone());
    Ok(report)
}

/// API: 30-day report, for callers holding a report capability
pub async fn api_report(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    if let Some(denied) = deny_unless_admin(&state, &caller) {
        return denied;
    }

    match get_cached_report(&state).await {
        Ok(report) => {
            let chart = report.chart();
            Json(ReportResponse { report, chart }).into_response()
        }
        Err(e) => {
            error!("Failed to build login report: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load login statistics").into_response()
        }
    }
}

/// API: Ingestion outcome counters
pub async fn api_metrics(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Response {
    if let Some(denied) = deny_unless_admin(&state, &caller) {
        return denied;
    }
    Json::<MetricsSnapshot>(state.stats.metrics()).into_response()
}
