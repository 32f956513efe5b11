//! Route table and handlers for program sessions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use crate::models::session::{
    LastAction, Lifecycle, NewProgramSession, ProgramSession, SessionFilter,
};
use crate::{AppError, Result};

use super::{ApiResponse, AppState};

/// Header carrying the acting user's id.
pub const USER_HEADER: &str = "x-user-id";

/// Build the router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/program-sessions",
            get(list_sessions).post(create_session),
        )
        .route("/program-sessions/run", patch(run_session))
        .route("/program-sessions/stop", patch(stop_session))
        .route("/program-sessions/restart", patch(restart_session))
        .route(
            "/program-sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionAction {
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    lifecycle: Option<String>,
    last_action: Option<String>,
    created_by: Option<String>,
    updated_by: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<SessionFilter> {
        Ok(SessionFilter {
            lifecycle: self.lifecycle.as_deref().map(Lifecycle::parse).transpose()?,
            last_action: self.last_action.as_deref().map(LastAction::parse).transpose()?,
            created_by: self.created_by,
            updated_by: self.updated_by,
        })
    }
}

fn acting_user(headers: &HeaderMap) -> Result<String> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Unauthorized(format!("missing {USER_HEADER} header")))
}

fn session_payload(session: &ProgramSession) -> serde_json::Value {
    json!({ "programSession": session })
}

async fn health() -> &'static str {
    "ok"
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(input): axum::Json<NewProgramSession>,
) -> Result<impl IntoResponse> {
    let user_id = acting_user(&headers)?;
    input.validate()?;
    let created = state
        .repo
        .create(&ProgramSession::new(input, user_id))
        .await?;
    Ok(ApiResponse::ok(
        "Program session created successfully",
        session_payload(&created),
    ))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse> {
    let sessions = state.repo.list(&query.into_filter()?).await?;
    Ok(ApiResponse::ok(
        "Program sessions fetched successfully",
        json!({ "programSessions": sessions }),
    ))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let session = state
        .repo
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("session {id} not found")))?;
    Ok(ApiResponse::ok(
        "Program session fetched successfully",
        session_payload(&session),
    ))
}

async fn run_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(action): axum::Json<SessionAction>,
) -> Result<impl IntoResponse> {
    let user_id = acting_user(&headers)?;
    let session = state.supervisor.run(&action.session_id, &user_id).await?;
    Ok(ApiResponse::ok(
        "Program session started successfully",
        session_payload(&session),
    ))
}

async fn stop_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(action): axum::Json<SessionAction>,
) -> Result<impl IntoResponse> {
    let user_id = acting_user(&headers)?;
    let session = state.supervisor.stop(&action.session_id, &user_id).await?;
    Ok(ApiResponse::ok(
        "Program session stopped successfully",
        session_payload(&session),
    ))
}

async fn restart_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::Json(action): axum::Json<SessionAction>,
) -> Result<impl IntoResponse> {
    let user_id = acting_user(&headers)?;
    let session = state
        .supervisor
        .restart(&action.session_id, &user_id)
        .await?;
    Ok(ApiResponse::ok(
        "Program session restarted successfully",
        session_payload(&session),
    ))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    acting_user(&headers)?;
    state.supervisor.remove_session(&id).await?;
    Ok(ApiResponse::ok(
        "Program session deleted successfully",
        json!({}),
    ))
}
