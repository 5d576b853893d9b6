//! Read-side aggregates shown on deck and child overviews.

use serde::Serialize;

use crate::db::models::{QuestionModel, SessionModel};

use super::scoring::{self, round2, GENERAL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub name: String,
    pub question_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTree {
    pub name: String,
    pub subcategories: Vec<CategoryCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub average_score: f64,
    pub improvement_trend: f64,
    pub time_spent_minutes: i64,
}

fn bump(counts: &mut Vec<CategoryCount>, name: &str) {
    match counts.iter_mut().find(|c| c.name == name) {
        Some(count) => count.question_count += 1,
        None => counts.push(CategoryCount {
            name: name.to_string(),
            question_count: 1,
        }),
    }
}

/// Question counts per category, in first-seen order.
pub fn category_counts(questions: &[QuestionModel]) -> Vec<CategoryCount> {
    let mut counts = Vec::new();
    for q in questions {
        bump(&mut counts, scoring::category_of(q));
    }
    counts
}

/// Question counts per category and subcategory, in first-seen order.
pub fn category_tree(questions: &[QuestionModel]) -> Vec<CategoryTree> {
    let mut tree: Vec<CategoryTree> = Vec::new();
    for q in questions {
        let category = scoring::category_of(q);
        let subcategory = q.subcategory.as_deref().unwrap_or(GENERAL);

        let index = match tree.iter().position(|c| c.name == category) {
            Some(index) => index,
            None => {
                tree.push(CategoryTree {
                    name: category.to_string(),
                    subcategories: Vec::new(),
                });
                tree.len() - 1
            }
        };
        bump(&mut tree[index].subcategories, subcategory);
    }
    tree
}

fn mean_score(sessions: &[&SessionModel]) -> f64 {
    if sessions.is_empty() {
        return 0.0;
    }
    sessions
        .iter()
        .map(|s| s.score_percentage.unwrap_or(0.0))
        .sum::<f64>()
        / sessions.len() as f64
}

/// Metrics over completed sessions given newest first. The trend compares
/// the newest `window` sessions with the oldest `window` once there are at
/// least twice that many.
pub fn performance_metrics(sessions: &[SessionModel], window: usize) -> PerformanceMetrics {
    let completed: Vec<&SessionModel> = sessions.iter().filter(|s| s.is_completed()).collect();

    let improvement_trend = if window > 0 && completed.len() >= window * 2 {
        let newest = &completed[..window];
        let oldest = &completed[completed.len() - window..];
        mean_score(newest) - mean_score(oldest)
    } else {
        0.0
    };

    let seconds: i64 = completed.iter().filter_map(|s| s.duration_seconds).sum();

    PerformanceMetrics {
        average_score: round2(mean_score(&completed)),
        improvement_trend: round2(improvement_trend),
        time_spent_minutes: (seconds as f64 / 60.0).round() as i64,
    }
}
