//! Pure pieces of the practice engine: question selection, shuffling,
//! answer checking, scoring and the feedback shown to the child.

use rand::Rng;
use serde::{Serialize, Serializer};

use crate::db::models::{QuestionModel, ResponseModel, SessionType};

pub const DEFAULT_QUESTION_LIMIT: usize = 20;
pub const SECONDS_PER_TEST_QUESTION: i64 = 30;
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const GENERAL: &str = "General";
const MILESTONE_EVERY: i64 = 5;
const SPEED_DEMON_SECONDS: f64 = 10.0;

const CORRECT_MESSAGES: &[&str] = &[
    "Great job! 🌟",
    "Excellent work! ✨",
    "You got it right! 🎉",
    "Fantastic! Keep it up! 🚀",
    "Well done! 👏",
    "Perfect! You're doing amazing! ⭐",
    "Outstanding! 🎊",
    "Brilliant answer! 💫",
];

const INCORRECT_MESSAGES: &[&str] = &[
    "That's okay! Learning is about trying! 🌱",
    "Don't worry! You'll get the next one! 💪",
    "Good effort! Keep practicing! 🌟",
    "That's alright! Every mistake helps you learn! 📚",
    "Nice try! You're getting better! 🎯",
    "Don't give up! You're doing great! 🌈",
    "That's okay! Learning takes time! ⏰",
    "Good attempt! Keep going! 🚀",
];

/// Unbiased in-place Fisher–Yates shuffle: walks from the last index down to
/// 1, swapping each slot with a uniformly chosen index in `[0, i]`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

pub fn category_of(question: &QuestionModel) -> &str {
    question.category.as_deref().unwrap_or(UNCATEGORIZED)
}

/// Applies the category filter, shuffles, and truncates to the requested
/// count (or to at most [`DEFAULT_QUESTION_LIMIT`] when none is given).
pub fn select_questions<R: Rng + ?Sized>(
    mut questions: Vec<QuestionModel>,
    categories: &[String],
    requested: Option<i64>,
    rng: &mut R,
) -> Vec<QuestionModel> {
    if !categories.is_empty() {
        questions.retain(|q| categories.iter().any(|c| c == category_of(q)));
    }

    shuffle(&mut questions, rng);

    let limit = match requested {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => DEFAULT_QUESTION_LIMIT,
    };
    questions.truncate(limit);
    questions
}

/// The four answer strings in a shuffled order.
pub fn answer_options<R: Rng + ?Sized>(question: &QuestionModel, rng: &mut R) -> Vec<String> {
    let mut options = vec![
        question.correct_answer.clone(),
        question.distractor_1.clone(),
        question.distractor_2.clone(),
        question.distractor_3.clone(),
    ];
    shuffle(&mut options, rng);
    options
}

pub fn is_correct_answer(selected: &str, correct: &str) -> bool {
    selected.trim().to_lowercase() == correct.trim().to_lowercase()
}

pub fn time_limit(session_type: SessionType, question_count: usize) -> Option<i64> {
    match session_type {
        SessionType::Test => Some(question_count as i64 * SECONDS_PER_TEST_QUESTION),
        SessionType::Practice | SessionType::Review => None,
    }
}

/// Feedback after a single answer. `correct_answers` is the session's count
/// including this answer.
pub fn encouragement<R: Rng + ?Sized>(is_correct: bool, correct_answers: i64, rng: &mut R) -> String {
    if is_correct && correct_answers > 0 && correct_answers % MILESTONE_EVERY == 0 {
        return format!("Amazing! You've gotten {correct_answers} questions right! 🏆");
    }

    let pool = if is_correct {
        CORRECT_MESSAGES
    } else {
        INCORRECT_MESSAGES
    };
    pool[rng.random_range(0..pool.len())].to_string()
}

pub fn explanation(question: &QuestionModel) -> String {
    let category = question
        .category
        .as_deref()
        .map(|c| format!(" This is a {c} question."))
        .unwrap_or_default();
    format!(
        "The correct answer is \"{}\".{category} Keep practicing to remember it better!",
        question.correct_answer
    )
}

pub fn score_percentage(correct: i64, total: i64) -> f64 {
    if total > 0 {
        correct as f64 * 100.0 / total as f64
    } else {
        0.0
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Achievement {
    PerfectScore,
    ExcellentPerformance,
    GreatJob,
    GoodWork,
    SpeedDemon,
    StudyChampion,
    LearningStar,
    GreatEffort,
}

impl Achievement {
    pub fn label(self) -> &'static str {
        match self {
            Achievement::PerfectScore => "Perfect Score! 🏆",
            Achievement::ExcellentPerformance => "Excellent Performance! ⭐",
            Achievement::GreatJob => "Great Job! 🌟",
            Achievement::GoodWork => "Good Work! 👍",
            Achievement::SpeedDemon => "Speed Demon! ⚡",
            Achievement::StudyChampion => "Study Champion! 📚",
            Achievement::LearningStar => "Learning Star! ⭐",
            Achievement::GreatEffort => "Great Effort! 🎯",
        }
    }
}

impl Serialize for Achievement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Score bands are exclusive (highest band only), the speed badge stacks with
/// anything, and the effort badges are exclusive with each other. With nothing
/// earned the child still gets a participation badge.
pub fn achievements(score: f64, correct_answers: i64, duration_seconds: i64) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if score == 100.0 {
        earned.push(Achievement::PerfectScore);
    } else if score >= 90.0 {
        earned.push(Achievement::ExcellentPerformance);
    } else if score >= 80.0 {
        earned.push(Achievement::GreatJob);
    } else if score >= 70.0 {
        earned.push(Achievement::GoodWork);
    }

    if correct_answers > 0 && (duration_seconds as f64 / correct_answers as f64) < SPEED_DEMON_SECONDS
    {
        earned.push(Achievement::SpeedDemon);
    }

    if correct_answers >= 10 {
        earned.push(Achievement::StudyChampion);
    } else if correct_answers >= 5 {
        earned.push(Achievement::LearningStar);
    }

    if earned.is_empty() {
        earned.push(Achievement::GreatEffort);
    }

    earned
}

pub fn final_encouragement(score: f64, correct: i64, total: i64) -> String {
    if score == 100.0 {
        format!(
            "🎉 Wow! You got ALL {total} questions right! You're a superstar! Keep up the amazing work!"
        )
    } else if score >= 90.0 {
        format!(
            "🌟 Fantastic job! You got {correct} out of {total} questions right! You're doing excellent!"
        )
    } else if score >= 80.0 {
        format!(
            "👏 Great work! You got {correct} out of {total} questions right! You're really improving!"
        )
    } else if score >= 70.0 {
        format!(
            "💪 Good job! You got {correct} out of {total} questions right! Keep practicing and you'll get even better!"
        )
    } else if score >= 50.0 {
        format!(
            "🌱 Nice effort! You got {correct} out of {total} questions right! Every practice session helps you learn more!"
        )
    } else {
        format!(
            "🌈 Thank you for practicing! You got {correct} out of {total} questions right! Remember, learning takes time and every try makes you stronger!"
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub category: String,
    pub correct: i64,
    pub total: i64,
}

/// Tallies responses per question category, in the order categories first
/// appear in the deck. Categories nobody answered are dropped.
pub fn category_breakdown(
    questions: &[QuestionModel],
    responses: &[ResponseModel],
) -> Vec<CategoryScore> {
    let mut scores: Vec<CategoryScore> = Vec::new();
    for q in questions {
        let category = category_of(q);
        if !scores.iter().any(|s| s.category == category) {
            scores.push(CategoryScore {
                category: category.to_string(),
                correct: 0,
                total: 0,
            });
        }
    }

    for response in responses {
        let Some(question) = questions.iter().find(|q| q.id == response.question_id) else {
            continue;
        };
        let category = category_of(question);
        if let Some(score) = scores.iter_mut().find(|s| s.category == category) {
            score.total += 1;
            if response.is_correct {
                score.correct += 1;
            }
        }
    }

    scores.retain(|s| s.total > 0);
    scores
}
