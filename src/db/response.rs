use chrono::Utc;
use color_eyre::Result;
use ulid::Ulid;

use super::models::{NewResponse, ResponseModel};
use super::Db;

/// What happened to an answer submission at the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The response was stored; carries the session's correct-answer counter
    /// after this response was applied.
    Recorded { correct_answers: i64 },
    /// A response for this (session, question) pair already exists.
    Duplicate,
    /// The session was completed before the response could be stored.
    SessionClosed,
}

impl Db {
    pub async fn response_exists(&self, session_id: &str, question_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM question_responses WHERE session_id = ? AND question_id = ?)",
        )
        .bind(session_id)
        .bind(question_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Stores a response and, for a correct one, bumps the session counter in
    /// the same transaction. The `UNIQUE (session_id, question_id)` constraint
    /// decides which of two concurrent submissions wins.
    pub async fn record_response(&self, response: NewResponse) -> Result<RecordOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO question_responses (id, session_id, question_id, selected_answer, \
                                             is_correct, response_time_seconds, answered_at) \
             SELECT ?, ?, ?, ?, ?, ?, ? \
             WHERE EXISTS (SELECT 1 FROM test_sessions WHERE id = ? AND completed_at IS NULL) \
             ON CONFLICT (session_id, question_id) DO NOTHING",
        )
        .bind(Ulid::new().to_string())
        .bind(&response.session_id)
        .bind(&response.question_id)
        .bind(&response.selected_answer)
        .bind(response.is_correct)
        .bind(response.response_time_seconds)
        .bind(Utc::now())
        .bind(&response.session_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            let closed: bool = sqlx::query_scalar(
                "SELECT completed_at IS NOT NULL FROM test_sessions WHERE id = ?",
            )
            .bind(&response.session_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;

            tracing::warn!(
                session_id = %response.session_id,
                question_id = %response.question_id,
                closed,
                "response was not recorded"
            );
            return Ok(if closed {
                RecordOutcome::SessionClosed
            } else {
                RecordOutcome::Duplicate
            });
        }

        let correct_answers: i64 = if response.is_correct {
            sqlx::query_scalar(
                "UPDATE test_sessions SET correct_answers = correct_answers + 1 \
                 WHERE id = ? RETURNING correct_answers",
            )
            .bind(&response.session_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_scalar("SELECT correct_answers FROM test_sessions WHERE id = ?")
                .bind(&response.session_id)
                .fetch_one(&mut *tx)
                .await?
        };

        tx.commit().await?;

        tracing::info!(
            session_id = %response.session_id,
            question_id = %response.question_id,
            is_correct = response.is_correct,
            "answer recorded"
        );
        Ok(RecordOutcome::Recorded { correct_answers })
    }

    pub async fn responses_for_session(&self, session_id: &str) -> Result<Vec<ResponseModel>> {
        let responses = sqlx::query_as::<_, ResponseModel>(
            "SELECT id, session_id, question_id, selected_answer, is_correct, \
                    response_time_seconds, answered_at \
             FROM question_responses WHERE session_id = ? ORDER BY answered_at, id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(responses)
    }
}
