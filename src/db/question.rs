use color_eyre::Result;

use super::models::QuestionModel;
use super::Db;

const QUESTION_COLUMNS: &str = "id, deck_id, question_text, correct_answer, distractor_1, \
     distractor_2, distractor_3, category, subcategory, difficulty_level, original_csv_row";

impl Db {
    pub async fn questions_for_deck(&self, deck_id: &str) -> Result<Vec<QuestionModel>> {
        let questions = sqlx::query_as::<_, QuestionModel>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE deck_id = ? \
             ORDER BY original_csv_row, id"
        ))
        .bind(deck_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    /// Looks a question up only within the given deck.
    pub async fn question_in_deck(
        &self,
        deck_id: &str,
        question_id: &str,
    ) -> Result<Option<QuestionModel>> {
        let question = sqlx::query_as::<_, QuestionModel>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE deck_id = ? AND id = ?"
        ))
        .bind(deck_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }
}
