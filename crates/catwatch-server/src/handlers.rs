//! API route handlers.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use catwatch_core::matcher::normalize_domain;
use catwatch_core::{ExaminerEvent, MatchMessage};
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::models::{AcceptedResponse, FeatureState, HealthResponse};
use crate::state::AppState;

/// POST /api/events/match - `{ domain }` published by the local matcher.
pub async fn post_match(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let message: MatchMessage = serde_json::from_slice(&body).map_err(|e| {
        warn!("Dropping malformed match message: {}", e);
        ApiError::BadRequest(format!("invalid match message: {}", e))
    })?;

    submit(&state, message.into()).await
}

/// POST /api/events - a tagged pipeline event.
pub async fn post_event(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let event: ExaminerEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!("Dropping malformed event: {}", e);
        ApiError::BadRequest(format!("invalid event: {}", e))
    })?;

    submit(&state, event).await
}

async fn submit(state: &AppState, event: ExaminerEvent) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    let event = match event {
        ExaminerEvent::DomainDetected { domain } => {
            let domain = normalize_domain(&domain).ok_or_else(|| {
                warn!("Dropping detection of malformed domain {:?}", domain);
                ApiError::BadRequest(format!("invalid domain: {:?}", domain))
            })?;
            ExaminerEvent::DomainDetected { domain }
        }
        ExaminerEvent::FilterGenerationUpdated { category } if category.is_empty() => {
            return Err(ApiError::BadRequest("empty category".into()));
        }
        ExaminerEvent::CategoryDeactivated { category } if category.is_empty() => {
            return Err(ApiError::BadRequest("empty category".into()));
        }
        other => other,
    };

    let kind = event.kind();
    debug!(kind, "Queueing event");
    state
        .events
        .send(event)
        .await
        .map_err(|_| ApiError::Unavailable)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: kind.to_string(),
        }),
    ))
}

/// Window of the `recent_hits` health figure.
const RECENT_HITS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// GET /api/health - liveness, queue depth and hits of the last day.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let recent_hits = state.examiner.recent_hits(RECENT_HITS_WINDOW)?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        enabled: state.examiner.is_on(),
        queued: state.examiner.queue().len(),
        recent_hits,
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// GET /api/feature - current feature switch.
pub async fn get_feature(State(state): State<AppState>) -> Json<FeatureState> {
    Json(FeatureState {
        enabled: state.examiner.is_on(),
    })
}

/// PUT /api/feature - turn the category filter on or off.
pub async fn put_feature(
    State(state): State<AppState>,
    Json(req): Json<FeatureState>,
) -> Result<Json<FeatureState>> {
    state.examiner.set_enabled(req.enabled)?;
    info!("Category filter switched {} via API", if req.enabled { "on" } else { "off" });

    Ok(Json(FeatureState {
        enabled: state.examiner.is_on(),
    }))
}
