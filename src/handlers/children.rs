use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    db::models::{ChildModel, NewChild},
    extractors::{AuthGuard, JsonBody},
    names,
    rejections::{AppError, Operation, ResultExt},
    services::{practice::DEFAULT_SESSION_LIST_LIMIT, scoring::round2},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route(names::CHILDREN_URL, get(list_children).post(create_child))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChildStatistics {
    total_decks: usize,
    total_sessions: usize,
    average_score: f64,
    last_session_date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ChildWithStats {
    #[serde(flatten)]
    child: ChildModel,
    statistics: ChildStatistics,
}

async fn list_children(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let children = state
        .db
        .children_for_parent(&caller.account_id)
        .await
        .reject(Operation::ChildList)?;

    let mut with_stats = Vec::with_capacity(children.len());
    for child in children {
        let decks = state
            .db
            .decks_for_user(&caller.account_id, Some(&child.id))
            .await
            .reject(Operation::ChildList)?;
        let sessions = state
            .db
            .sessions_for_child(&child.id, DEFAULT_SESSION_LIST_LIMIT)
            .await
            .reject(Operation::ChildList)?;

        let average_score = if sessions.is_empty() {
            0.0
        } else {
            sessions
                .iter()
                .map(|s| s.session.score_percentage.unwrap_or(0.0))
                .sum::<f64>()
                / sessions.len() as f64
        };

        with_stats.push(ChildWithStats {
            statistics: ChildStatistics {
                total_decks: decks.len(),
                total_sessions: sessions.len(),
                average_score: round2(average_score),
                last_session_date: sessions.first().and_then(|s| s.session.completed_at),
            },
            child,
        });
    }

    Ok(Json(with_stats))
}

#[derive(Deserialize)]
struct CreateChildBody {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    grade_level: Option<Value>,
    #[serde(default)]
    birth_year: Option<Value>,
}

/// Accepts either a JSON number or a numeric string. Empty values count as
/// absent; `Err(())` means the value is present but not an integer.
fn optional_int(value: Option<&Value>) -> Result<Option<i64>, ()> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_i64().map(Some).ok_or(()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| ()),
        Some(_) => Err(()),
    }
}

async fn create_child(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateChildBody>,
) -> Result<impl IntoResponse, AppError> {
    let name = match &body.name {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        _ => return Err(AppError::InvalidName),
    };

    let grade_level = optional_int(body.grade_level.as_ref())
        .ok()
        .and_then(|grade| match grade {
            Some(g) if !(names::MIN_GRADE..=names::MAX_GRADE).contains(&g) => None,
            other => Some(other),
        })
        .ok_or(AppError::InvalidGrade)?;

    let current_year = i64::from(Utc::now().year());
    let birth_year = optional_int(body.birth_year.as_ref())
        .ok()
        .and_then(|year| match year {
            Some(y) if !(names::MIN_BIRTH_YEAR..=current_year).contains(&y) => None,
            other => Some(other),
        })
        .ok_or(AppError::InvalidBirthYear)?;

    let child = state
        .db
        .create_child(NewChild {
            parent_id: caller.account_id,
            name,
            grade_level,
            birth_year,
        })
        .await
        .reject(Operation::ChildCreation)?;

    Ok((StatusCode::CREATED, Json(child)))
}
