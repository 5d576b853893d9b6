use chrono::Utc;
use color_eyre::Result;
use ulid::Ulid;

use super::models::{
    NewSession, OwnedSessionModel, SessionCompletion, SessionListItem, SessionModel,
    SessionScore,
};
use super::Db;

const SESSION_COLUMNS: &str = "s.id AS id, s.child_id AS child_id, s.deck_id AS deck_id, \
     s.started_at AS started_at, s.completed_at AS completed_at, \
     s.total_questions AS total_questions, s.correct_answers AS correct_answers, \
     s.duration_seconds AS duration_seconds, s.score_percentage AS score_percentage, \
     s.session_type AS session_type";

impl Db {
    pub async fn create_session(&self, session: NewSession) -> Result<SessionModel> {
        let id = Ulid::new().to_string();

        let created = sqlx::query_as::<_, SessionModel>(
            "INSERT INTO test_sessions (id, child_id, deck_id, started_at, total_questions, \
                                        correct_answers, session_type) \
             VALUES (?, ?, ?, ?, ?, 0, ?) \
             RETURNING id, child_id, deck_id, started_at, completed_at, total_questions, \
                       correct_answers, duration_seconds, score_percentage, session_type",
        )
        .bind(&id)
        .bind(&session.child_id)
        .bind(&session.deck_id)
        .bind(Utc::now())
        .bind(session.total_questions)
        .bind(session.session_type)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            session_id = %id,
            child_id = %session.child_id,
            deck_id = %session.deck_id,
            total_questions = session.total_questions,
            "test session created"
        );
        Ok(created)
    }

    /// Fetches a session together with the account that owns its child.
    pub async fn get_owned_session(&self, session_id: &str) -> Result<Option<OwnedSessionModel>> {
        let session = sqlx::query_as::<_, OwnedSessionModel>(&format!(
            "SELECT {SESSION_COLUMNS}, c.parent_id AS parent_id \
             FROM test_sessions s \
             JOIN child_profiles c ON c.id = s.child_id \
             WHERE s.id = ?"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Newest first, with the deck name joined in.
    pub async fn sessions_for_child(
        &self,
        child_id: &str,
        limit: i64,
    ) -> Result<Vec<SessionListItem>> {
        let sessions = sqlx::query_as::<_, SessionListItem>(&format!(
            "SELECT {SESSION_COLUMNS}, COALESCE(d.name, 'Unknown Deck') AS deck_name \
             FROM test_sessions s \
             LEFT JOIN decks d ON d.id = s.deck_id \
             WHERE s.child_id = ? \
             ORDER BY s.started_at DESC, s.id DESC \
             LIMIT ?"
        ))
        .bind(child_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Newest first.
    pub async fn sessions_for_deck(&self, deck_id: &str) -> Result<Vec<SessionModel>> {
        let sessions = sqlx::query_as::<_, SessionModel>(&format!(
            "SELECT {SESSION_COLUMNS} FROM test_sessions s \
             WHERE s.deck_id = ? \
             ORDER BY s.started_at DESC, s.id DESC"
        ))
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    /// Moves a session into its terminal state. The correct count and score
    /// are taken from the stored responses within the same statement.
    /// Returns `None` when the session was already completed, in which case
    /// nothing is written.
    pub async fn complete_session(
        &self,
        session_id: &str,
        completion: &SessionCompletion,
    ) -> Result<Option<SessionScore>> {
        let score = sqlx::query_as::<_, SessionScore>(
            "UPDATE test_sessions SET \
                completed_at = ?1, \
                duration_seconds = ?2, \
                correct_answers = (SELECT COUNT(*) FROM question_responses \
                                   WHERE session_id = ?3 AND is_correct = 1), \
                score_percentage = CASE WHEN total_questions > 0 THEN \
                    ROUND((SELECT COUNT(*) FROM question_responses \
                           WHERE session_id = ?3 AND is_correct = 1) * 100.0 / total_questions, 2) \
                    ELSE 0.0 END \
             WHERE id = ?3 AND completed_at IS NULL \
             RETURNING correct_answers, score_percentage",
        )
        .bind(completion.completed_at)
        .bind(completion.duration_seconds)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(score) = &score {
            tracing::info!(
                session_id,
                correct_answers = score.correct_answers,
                score = score.score_percentage,
                "test session completed"
            );
        }
        Ok(score)
    }
}
