use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::{
    db::models::{DeckModel, DeckUpdate, NewDeck, ProcessingStatus, SessionModel},
    extractors::{AuthGuard, Caller, JsonBody},
    flashcards::{self, CsvValidation},
    names,
    rejections::{AppError, Operation, ResultExt},
    services::deck_stats::{self, CategoryCount, CategoryTree, PerformanceMetrics},
    storage, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(names::CSV_VALIDATE_URL, post(validate_csv))
        .route(names::DECKS_URL, post(create_deck).get(list_decks))
        .route(
            names::DECK_URL,
            get(get_deck).put(update_deck).delete(delete_deck),
        )
}

// ---------------------------------------------------------------------------
// Multipart upload
// ---------------------------------------------------------------------------

struct CsvUpload {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
    /// Set when the file went past the size cap; the rest was discarded.
    oversized: bool,
}

impl CsvUpload {
    fn looks_like_csv(&self) -> bool {
        self.content_type.contains("csv") || self.filename.to_lowercase().ends_with(".csv")
    }
}

#[derive(Default)]
struct DeckForm {
    name: Option<String>,
    description: Option<String>,
    child_id: Option<String>,
    csv: Option<CsvUpload>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::warn!("failed to read multipart body: {e}");
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge
    } else {
        AppError::InvalidRequest("failed to read multipart body")
    }
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(multipart_error)
}

/// Reads a file field, keeping at most `MAX_CSV_BYTES`. The remainder is
/// drained so the fields that follow can still be read.
async fn read_csv_field(mut field: Field<'_>) -> Result<CsvUpload, AppError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    let mut bytes = Vec::new();
    let mut oversized = false;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if oversized {
            continue;
        }
        if bytes.len() + chunk.len() > names::MAX_CSV_BYTES {
            oversized = true;
            bytes = Vec::new();
        } else {
            bytes.extend_from_slice(&chunk);
        }
    }

    Ok(CsvUpload {
        filename,
        content_type,
        bytes,
        oversized,
    })
}

async fn read_deck_form(mut multipart: Multipart) -> Result<DeckForm, AppError> {
    let mut form = DeckForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = Some(field_text(field).await?),
            "description" => form.description = Some(field_text(field).await?),
            "childId" => form.child_id = Some(field_text(field).await?),
            names::CSV_FIELD => form.csv = Some(read_csv_field(field).await?),
            _ => {}
        }
    }

    Ok(form)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_upload(upload: &CsvUpload) -> CsvValidation {
    flashcards::validate_bytes(&upload.bytes).unwrap_or_else(|e| {
        tracing::warn!(filename = %upload.filename, "{e}");
        CsvValidation::failed(e.to_string())
    })
}

async fn validate_csv(
    AuthGuard(_caller): AuthGuard,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let upload = read_deck_form(multipart)
        .await?
        .csv
        .ok_or(AppError::MissingFields {
            message: "CSV file is required",
            hint: "Please upload a CSV file with your flashcards.",
        })?;

    if upload.oversized {
        return Err(AppError::FileTooLarge);
    }

    Ok(Json(validate_upload(&upload)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckCreated {
    deck_id: String,
    processing_job_id: String,
    estimated_completion_time: u32,
    row_count: usize,
    warnings: Vec<String>,
}

async fn create_deck(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = read_deck_form(multipart).await?;

    let (Some(name), Some(child_id), Some(upload)) =
        (non_blank(form.name), non_blank(form.child_id), form.csv)
    else {
        return Err(AppError::MissingFields {
            message: "Name, child ID, and CSV file are required",
            hint: "Please fill in all the required information and select a CSV file.",
        });
    };

    let child = state
        .db
        .get_child(&child_id)
        .await
        .reject(Operation::DeckCreation)?;
    if !child.is_some_and(|c| c.parent_id == caller.account_id) {
        return Err(AppError::UnauthorizedChild);
    }

    if !upload.looks_like_csv() {
        return Err(AppError::InvalidFileType);
    }
    if upload.oversized {
        return Err(AppError::FileTooLarge);
    }

    let validation = validate_upload(&upload);
    if !validation.valid {
        return Err(AppError::InvalidCsv {
            errors: validation.errors,
            warnings: validation.warnings,
        });
    }

    let filename = storage::sanitize_filename(&upload.filename);
    let deck = state
        .db
        .create_deck(NewDeck {
            user_id: caller.account_id.clone(),
            child_id,
            name,
            description: non_blank(form.description),
            csv_filename: Some(filename.clone()),
        })
        .await
        .reject(Operation::DeckCreation)?;

    if let Some(archive) = &state.archive {
        let archived = archive
            .store(&caller.account_id, &deck.id, &filename, &upload.bytes)
            .await;
        if archived.is_err() {
            state
                .db
                .set_deck_status(&deck.id, ProcessingStatus::Failed)
                .await
                .reject(Operation::DeckCreation)?;
        }
        archived.reject(Operation::DeckCreation)?;
    }

    let response = DeckCreated {
        processing_job_id: format!("job_{}_{}", deck.id, Utc::now().timestamp_millis()),
        deck_id: deck.id,
        estimated_completion_time: names::ESTIMATED_PROCESSING_SECONDS,
        row_count: validation.row_count,
        warnings: validation.warnings,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// Listing and detail
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDecksQuery {
    child_id: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

fn positive(value: Option<&str>) -> Option<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckSummary {
    id: String,
    name: String,
    description: String,
    total_questions: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_test_date: Option<DateTime<Utc>>,
    processing_status: ProcessingStatus,
    categories: Vec<CategoryCount>,
}

#[derive(Serialize)]
struct Pagination {
    page: i64,
    limit: i64,
    total: usize,
}

#[derive(Serialize)]
struct DeckList {
    decks: Vec<DeckSummary>,
    pagination: Pagination,
}

async fn list_decks(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Query(query): Query<ListDecksQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = positive(query.page.as_deref()).unwrap_or(1);
    let limit = positive(query.limit.as_deref())
        .unwrap_or(names::DEFAULT_PAGE_LIMIT)
        .min(names::MAX_PAGE_LIMIT);
    let child_id = non_blank(query.child_id);

    let decks = state
        .db
        .decks_for_user(&caller.account_id, child_id.as_deref())
        .await
        .reject(Operation::DeckList)?;
    let total = decks.len();

    let offset = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
    let mut summaries = Vec::new();
    for deck in decks.into_iter().skip(offset).take(limit as usize) {
        let questions = state
            .db
            .questions_for_deck(&deck.id)
            .await
            .reject(Operation::DeckList)?;
        let sessions = state
            .db
            .sessions_for_deck(&deck.id)
            .await
            .reject(Operation::DeckList)?;
        let last = sessions.iter().find(|s| s.is_completed());

        summaries.push(DeckSummary {
            last_score: last.and_then(|s| s.score_percentage),
            last_test_date: last.and_then(|s| s.completed_at),
            categories: deck_stats::category_counts(&questions),
            id: deck.id,
            name: deck.name,
            description: deck.description.unwrap_or_default(),
            total_questions: deck.total_questions,
            processing_status: deck.processing_status,
        });
    }

    Ok(Json(DeckList {
        decks: summaries,
        pagination: Pagination { page, limit, total },
    }))
}

/// Loads a live deck and checks that the caller owns it.
async fn owned_deck(
    state: &AppState,
    caller: &Caller,
    deck_id: &str,
    op: Operation,
) -> Result<DeckModel, AppError> {
    let deck = state
        .db
        .get_deck(deck_id)
        .await
        .reject(op)?
        .ok_or(AppError::DeckNotFound)?;

    if deck.user_id != caller.account_id {
        return Err(AppError::UnauthorizedDeck);
    }
    Ok(deck)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeckDetail {
    id: String,
    name: String,
    description: String,
    subject: String,
    total_questions: i64,
    processing_status: ProcessingStatus,
    categories: Vec<CategoryTree>,
    recent_sessions: Vec<SessionModel>,
    performance_metrics: PerformanceMetrics,
}

async fn get_deck(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Path(deck_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deck = owned_deck(&state, &caller, &deck_id, Operation::DeckFetch).await?;

    let questions = state
        .db
        .questions_for_deck(&deck.id)
        .await
        .reject(Operation::DeckFetch)?;
    let mut sessions = state
        .db
        .sessions_for_deck(&deck.id)
        .await
        .reject(Operation::DeckFetch)?;

    let performance_metrics = deck_stats::performance_metrics(&sessions, names::TREND_WINDOW);
    sessions.truncate(names::RECENT_DECK_SESSIONS);

    Ok(Json(DeckDetail {
        id: deck.id,
        name: deck.name,
        description: deck.description.unwrap_or_default(),
        subject: deck.subject,
        total_questions: deck.total_questions,
        processing_status: deck.processing_status,
        categories: deck_stats::category_tree(&questions),
        recent_sessions: sessions,
        performance_metrics,
    }))
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Distinguishes an absent key from an explicit `null`.
fn present<'de, D: Deserializer<'de>, T: Deserialize<'de>>(d: D) -> Result<Option<T>, D::Error> {
    T::deserialize(d).map(Some)
}

#[derive(Deserialize)]
struct UpdateDeckBody {
    name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    description: Option<Option<String>>,
    subject: Option<String>,
}

async fn update_deck(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Path(deck_id): Path<String>,
    JsonBody(body): JsonBody<UpdateDeckBody>,
) -> Result<impl IntoResponse, AppError> {
    let deck = owned_deck(&state, &caller, &deck_id, Operation::DeckUpdate).await?;

    let update = DeckUpdate {
        name: non_blank(body.name),
        description: body.description.map(non_blank),
        subject: non_blank(body.subject),
    };

    let updated = state
        .db
        .update_deck(&deck.id, update)
        .await
        .reject(Operation::DeckUpdate)?;

    Ok(Json(updated))
}

async fn delete_deck(
    AuthGuard(caller): AuthGuard,
    State(state): State<AppState>,
    Path(deck_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deck = owned_deck(&state, &caller, &deck_id, Operation::DeckDelete).await?;

    state
        .db
        .soft_delete_deck(&deck.id)
        .await
        .reject(Operation::DeckDelete)?;

    Ok(Json(json!({ "success": true })))
}
