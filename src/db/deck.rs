use chrono::Utc;
use color_eyre::{eyre::ensure, Result};
use ulid::Ulid;

use super::models::{DeckModel, DeckUpdate, NewDeck, ProcessingStatus};
use super::Db;
use crate::models::GeneratedQuestion;

const DECK_COLUMNS: &str = "id, user_id, child_id, name, description, subject, total_questions, \
     csv_filename, processing_status, is_active, created_at, updated_at";

impl Db {
    /// Creates a deck in the `pending` state; questions arrive later from the
    /// generation step.
    pub async fn create_deck(&self, deck: NewDeck) -> Result<DeckModel> {
        let id = Ulid::new().to_string();
        let now = Utc::now();

        let created = sqlx::query_as::<_, DeckModel>(&format!(
            "INSERT INTO decks (id, user_id, child_id, name, description, subject, total_questions, \
                                csv_filename, processing_status, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 'Latin', 0, ?, 'pending', 1, ?, ?) RETURNING {DECK_COLUMNS}"
        ))
        .bind(&id)
        .bind(&deck.user_id)
        .bind(&deck.child_id)
        .bind(&deck.name)
        .bind(&deck.description)
        .bind(&deck.csv_filename)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(deck_id = %id, user_id = %deck.user_id, "deck created");
        Ok(created)
    }

    /// Returns the deck unless it does not exist or has been soft-deleted.
    pub async fn get_deck(&self, deck_id: &str) -> Result<Option<DeckModel>> {
        let deck = sqlx::query_as::<_, DeckModel>(&format!(
            "SELECT {DECK_COLUMNS} FROM decks WHERE id = ? AND is_active = 1"
        ))
        .bind(deck_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(deck)
    }

    pub async fn decks_for_user(
        &self,
        user_id: &str,
        child_id: Option<&str>,
    ) -> Result<Vec<DeckModel>> {
        let decks = sqlx::query_as::<_, DeckModel>(&format!(
            "SELECT {DECK_COLUMNS} FROM decks \
             WHERE user_id = ? AND is_active = 1 AND (? IS NULL OR child_id = ?) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .bind(child_id)
        .bind(child_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(decks)
    }

    pub async fn update_deck(&self, deck_id: &str, update: DeckUpdate) -> Result<DeckModel> {
        let description_set = update.description.is_some();
        let description = update.description.flatten();

        let updated = sqlx::query_as::<_, DeckModel>(&format!(
            "UPDATE decks SET \
                name = COALESCE(?, name), \
                description = CASE WHEN ? THEN ? ELSE description END, \
                subject = COALESCE(?, subject), \
                updated_at = ? \
             WHERE id = ? RETURNING {DECK_COLUMNS}"
        ))
        .bind(&update.name)
        .bind(description_set)
        .bind(&description)
        .bind(&update.subject)
        .bind(Utc::now())
        .bind(deck_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(deck_id, "deck updated");
        Ok(updated)
    }

    /// Decks are never hard-deleted; they are hidden via `is_active`.
    pub async fn soft_delete_deck(&self, deck_id: &str) -> Result<()> {
        sqlx::query("UPDATE decks SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(deck_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(deck_id, "deck soft-deleted");
        Ok(())
    }

    pub async fn set_deck_status(&self, deck_id: &str, status: ProcessingStatus) -> Result<()> {
        sqlx::query("UPDATE decks SET processing_status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(deck_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(deck_id, ?status, "deck processing status changed");
        Ok(())
    }

    /// Inserts the generated questions for a deck and marks it `completed`,
    /// keeping `total_questions` equal to the stored question count.
    pub async fn store_generated_questions(
        &self,
        deck_id: &str,
        questions: &[GeneratedQuestion],
    ) -> Result<usize> {
        for q in questions {
            ensure!(
                q.has_distinct_answers(),
                "question {:?} does not have four distinct answers",
                q.question_text
            );
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for q in questions {
            sqlx::query(
                "INSERT INTO questions (id, deck_id, question_text, correct_answer, distractor_1, \
                                        distractor_2, distractor_3, category, subcategory, \
                                        difficulty_level, original_csv_row, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Ulid::new().to_string())
            .bind(deck_id)
            .bind(&q.question_text)
            .bind(&q.correct_answer)
            .bind(&q.distractors[0])
            .bind(&q.distractors[1])
            .bind(&q.distractors[2])
            .bind(&q.category)
            .bind(&q.subcategory)
            .bind(q.difficulty_level)
            .bind(q.original_csv_row)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE decks SET total_questions = \
                (SELECT COUNT(*) FROM questions WHERE deck_id = ?1), \
                processing_status = 'completed', updated_at = ?2 \
             WHERE id = ?1",
        )
        .bind(deck_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(deck_id, count = questions.len(), "generated questions stored");
        Ok(questions.len())
    }
}
