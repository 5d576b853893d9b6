use serde::Deserialize;

/// One multiple-choice item as produced by the question-generation step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub question_text: String,
    pub correct_answer: String,
    pub distractors: [String; 3],
    pub category: Option<String>,
    pub subcategory: Option<String>,
    #[serde(default = "default_difficulty")]
    pub difficulty_level: i64,
    pub original_csv_row: Option<i64>,
}

fn default_difficulty() -> i64 {
    1
}

impl GeneratedQuestion {
    /// The correct answer and the three distractors must all differ.
    pub fn has_distinct_answers(&self) -> bool {
        let answers = [
            &self.correct_answer,
            &self.distractors[0],
            &self.distractors[1],
            &self.distractors[2],
        ];
        answers
            .iter()
            .enumerate()
            .all(|(i, a)| answers[i + 1..].iter().all(|b| a != b))
    }
}
