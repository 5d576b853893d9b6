// Database model structs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Practice,
    Test,
    Review,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChildModel {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub grade_level: Option<i64>,
    pub birth_year: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeckModel {
    pub id: String,
    pub user_id: String,
    pub child_id: String,
    pub name: String,
    pub description: Option<String>,
    pub subject: String,
    pub total_questions: i64,
    pub csv_filename: Option<String>,
    pub processing_status: ProcessingStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionModel {
    pub id: String,
    pub deck_id: String,
    pub question_text: String,
    pub correct_answer: String,
    pub distractor_1: String,
    pub distractor_2: String,
    pub distractor_3: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub difficulty_level: i64,
    pub original_csv_row: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionModel {
    pub id: String,
    pub child_id: String,
    pub deck_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub duration_seconds: Option<i64>,
    pub score_percentage: Option<f64>,
    pub session_type: SessionType,
}

impl SessionModel {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A session joined with the parent account that owns its child.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OwnedSessionModel {
    #[sqlx(flatten)]
    pub session: SessionModel,
    pub parent_id: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub session: SessionModel,
    pub deck_name: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResponseModel {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub selected_answer: String,
    pub is_correct: bool,
    pub response_time_seconds: Option<f64>,
    pub answered_at: DateTime<Utc>,
}

/// Values supplied by the caller when a session reaches its terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCompletion {
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// The score written by a completion, counted from the stored responses.
#[derive(Debug, Clone, Copy, PartialEq, sqlx::FromRow)]
pub struct SessionScore {
    pub correct_answers: i64,
    pub score_percentage: f64,
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub session_id: String,
    pub question_id: String,
    pub selected_answer: String,
    pub is_correct: bool,
    pub response_time_seconds: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub child_id: String,
    pub deck_id: String,
    pub total_questions: i64,
    pub session_type: SessionType,
}

#[derive(Debug, Clone)]
pub struct NewDeck {
    pub user_id: String,
    pub child_id: String,
    pub name: String,
    pub description: Option<String>,
    pub csv_filename: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DeckUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub subject: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewChild {
    pub parent_id: String,
    pub name: String,
    pub grade_level: Option<i64>,
    pub birth_year: Option<i64>,
}
