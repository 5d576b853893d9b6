use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    extractors::{AuthGuard, JsonBody},
    names,
    rejections::{AppError, Operation, ResultExt},
    services::practice::{StartSession, SubmitAnswer},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::SESSIONS_URL, post(start_session).get(list_sessions))
        .route(names::SESSION_ANSWER_URL, post(submit_answer))
        .route(names::SESSION_COMPLETE_URL, post(complete_session))
}

async fn start_session(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<StartSession>,
) -> Result<impl IntoResponse, AppError> {
    if request.deck_id.trim().is_empty() || request.child_id.trim().is_empty() {
        return Err(AppError::MissingFields {
            message: "Deck ID and child ID are required",
            hint: "Please select a deck and child to start practicing!",
        });
    }

    let started = state
        .practice
        .start_session(&caller.account_id, request)
        .await
        .reject(Operation::SessionStart)?;

    Ok((StatusCode::CREATED, Json(started)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListSessionsQuery {
    child_id: Option<String>,
    limit: Option<String>,
}

async fn list_sessions(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let child_id = query
        .child_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(AppError::MissingChildId)?;
    let limit = query.limit.and_then(|l| l.trim().parse::<i64>().ok());

    let sessions = state
        .practice
        .list_sessions(&caller.account_id, &child_id, limit)
        .await
        .reject(Operation::SessionList)?;

    Ok(Json(sessions))
}

async fn submit_answer(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    JsonBody(answer): JsonBody<SubmitAnswer>,
) -> Result<impl IntoResponse, AppError> {
    if answer.question_id.trim().is_empty() || answer.selected_answer.is_empty() {
        return Err(AppError::MissingFields {
            message: "Question ID and selected answer are required",
            hint: "Please select an answer before submitting!",
        });
    }

    let feedback = state
        .practice
        .submit_answer(&caller.account_id, &session_id, answer)
        .await
        .reject(Operation::AnswerSubmit)?;

    Ok(Json(feedback))
}

async fn complete_session(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let summary = state
        .practice
        .complete_session(&caller.account_id, &session_id)
        .await
        .reject(Operation::SessionComplete)?;

    Ok(Json(summary))
}
