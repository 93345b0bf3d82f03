use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::deals::DealClaimOutcome;
use super::domain::{ReportDraft, ReportId};
use super::lifecycle::ReportError;
use super::persistence::PatrolStore;
use super::session::PatrolSession;

pub type SharedSession<S> = Arc<Mutex<PatrolSession<S>>>;

#[derive(Debug, Deserialize)]
pub(crate) struct ClaimRequest {
    pub(crate) qr_value: String,
}

/// JSON endpoints over one shared patrol session.
pub fn patrol_router<S>(session: SharedSession<S>) -> Router
where
    S: PatrolStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/reports",
            get(list_reports_handler::<S>).post(submit_handler::<S>),
        )
        .route(
            "/api/v1/reports/:report_id",
            put(edit_handler::<S>).delete(delete_handler::<S>),
        )
        .route("/api/v1/badges", get(badges_handler::<S>))
        .route("/api/v1/deals", get(deals_handler::<S>))
        .route("/api/v1/deals/claim", post(claim_handler::<S>))
        .route("/api/v1/stats", get(stats_handler::<S>))
        .route("/api/v1/feed", get(feed_handler::<S>))
        .route("/api/v1/view", get(view_handler::<S>))
        .with_state(session)
}

pub(crate) async fn list_reports_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => axum::Json(session.reports().to_vec()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn submit_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
    axum::Json(draft): axum::Json<ReportDraft>,
) -> Response {
    let mut session = match lock(&session) {
        Ok(session) => session,
        Err(response) => return response,
    };

    match session.submit_draft(draft, Utc::now()) {
        Ok(outcome) => {
            let payload = json!({
                "report": outcome.report,
                "newly_unlocked": outcome.newly_unlocked,
                "prior_reports": outcome.prior_reports,
                "next_view": outcome.next_view,
                "notices": session.drain_notices(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn edit_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
    Path(report_id): Path<String>,
    axum::Json(patch): axum::Json<ReportDraft>,
) -> Response {
    let mut session = match lock(&session) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let id = ReportId(report_id);
    match session.edit_report(&id, &patch) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(ReportError::Validation(error)) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({
                "report_id": id.0,
                "error": other.to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn delete_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
    Path(report_id): Path<String>,
) -> Response {
    let mut session = match lock(&session) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let id = ReportId(report_id);
    match session.delete_report(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => {
            let payload = json!({
                "report_id": id.0,
                "error": ReportError::NotFound(id.clone()).to_string(),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn badges_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => axum::Json(session.badges().to_vec()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn deals_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => axum::Json(session.deals().to_vec()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn claim_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
    axum::Json(request): axum::Json<ClaimRequest>,
) -> Response {
    let mut session = match lock(&session) {
        Ok(session) => session,
        Err(response) => return response,
    };

    let outcome = session.claim_deal(&request.qr_value);
    let status = match outcome {
        DealClaimOutcome::Claimed { .. } => StatusCode::OK,
        DealClaimOutcome::AlreadyClaimed { .. } => StatusCode::CONFLICT,
        DealClaimOutcome::NoMatch => StatusCode::NOT_FOUND,
    };
    let payload = json!({
        "claim": outcome,
        "next_view": outcome.next_view(),
        "notices": session.drain_notices(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn stats_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => axum::Json(session.stats()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn feed_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => axum::Json(session.live_feed()).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn view_handler<S: PatrolStore + 'static>(
    State(session): State<SharedSession<S>>,
) -> Response {
    match lock(&session) {
        Ok(session) => {
            let view = session.view();
            let payload = json!({
                "current": view,
                "navigation_visible": view.shows_navigation(),
                "capture_phase": session.capture_phase(),
            });
            axum::Json(payload).into_response()
        }
        Err(response) => response,
    }
}

fn lock<S>(
    session: &Mutex<PatrolSession<S>>,
) -> Result<MutexGuard<'_, PatrolSession<S>>, Response> {
    session.lock().map_err(|_| {
        let payload = json!({
            "error": "patrol session unavailable, reload to continue",
        });
        (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
    })
}
