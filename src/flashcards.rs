//! Flashcard CSV ingestion: splits an uploaded file into fields, locates the
//! question and answer columns and produces a verdict plus a short preview.
//!
//! Validation never fails on malformed content. Problems are collected as
//! blocking `errors` or advisory `warnings`; the only error path is a file
//! that cannot be read as UTF-8 text.

use indexmap::IndexMap;
use serde::Serialize;

pub const QUESTION_ALIASES: &[&str] = &["question", "q", "term", "front"];
pub const ANSWER_ALIASES: &[&str] = &["answer", "a", "definition", "back"];

pub const MIN_ROWS: usize = 5;
pub const MAX_ROWS: usize = 500;
pub const PREVIEW_ROWS: usize = 10;
const MIN_QUESTION_CHARS: usize = 3;

/// Placeholder deny-list. It only raises advisory warnings and needs to be
/// replaced by a real content-safety policy.
pub const REVIEW_WORDS: &[&str] = &["inappropriate", "bad", "harmful"];

pub const EMPTY_FILE: &str = "CSV file is empty";
pub const TOO_FEW_ROWS: &str = "We need at least 5 questions to make a great practice session!";
pub const TOO_MANY_ROWS: &str =
    "Wow! That's a lot of questions. Let's split them into smaller groups.";
pub const TOO_MANY_ISSUES: &str = "Too many rows have issues. Please review your CSV file.";
const NO_QUESTION_COLUMN: &str =
    "Could not find question column. Expected column names: question, q, term, or front";
const NO_ANSWER_COLUMN: &str =
    "Could not find answer column. Expected column names: answer, a, definition, or back";

#[derive(Debug, thiserror::Error)]
#[error("failed to parse CSV file: {0}")]
pub struct CsvReadError(#[from] std::str::Utf8Error);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CsvValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub question_column: Option<usize>,
    pub answer_column: Option<usize>,
    /// Leading rows keyed by column name, in header order.
    pub preview: Vec<IndexMap<String, String>>,
}

impl CsvValidation {
    fn empty() -> Self {
        Self::failed(EMPTY_FILE.to_string())
    }

    /// A verdict with a single blocking error and nothing parsed.
    pub fn failed(error: String) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
            row_count: 0,
            columns: Vec::new(),
            question_column: None,
            answer_column: None,
            preview: Vec::new(),
        }
    }
}

/// Validates raw upload bytes.
pub fn validate_bytes(bytes: &[u8]) -> Result<CsvValidation, CsvReadError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(validate(text))
}

pub fn validate(text: &str) -> CsvValidation {
    let lines: Vec<&str> = text.split('\n').filter(|l| !l.trim().is_empty()).collect();

    let Some((header, data)) = lines.split_first() else {
        return CsvValidation::empty();
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let columns = parse_line(header);
    let question_column = find_column(&columns, QUESTION_ALIASES);
    let answer_column = find_column(&columns, ANSWER_ALIASES);

    if question_column.is_none() {
        errors.push(NO_QUESTION_COLUMN.to_string());
    }
    if answer_column.is_none() {
        errors.push(NO_ANSWER_COLUMN.to_string());
    }

    let row_count = data.len();
    if row_count < MIN_ROWS {
        errors.push(TOO_FEW_ROWS.to_string());
    }
    if row_count > MAX_ROWS {
        errors.push(TOO_MANY_ROWS.to_string());
    }

    let mut preview = Vec::with_capacity(row_count.min(PREVIEW_ROWS));
    for (i, line) in data.iter().take(PREVIEW_ROWS).enumerate() {
        let values = parse_line(line);
        let line_no = i + 2;

        if let (Some(q), Some(a)) = (question_column, answer_column) {
            let question = values.get(q).map(|v| v.trim()).unwrap_or_default();
            let answer = values.get(a).map(|v| v.trim()).unwrap_or_default();
            check_row(line_no, question, answer, &mut warnings);
        }

        let row: IndexMap<String, String> = columns
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.clone(), values.get(idx).cloned().unwrap_or_default()))
            .collect();
        preview.push(row);
    }

    if warnings.len() as f64 > row_count as f64 * 0.5 {
        errors.push(TOO_MANY_ISSUES.to_string());
    }

    CsvValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
        row_count,
        columns,
        question_column,
        answer_column,
        preview,
    }
}

fn check_row(line_no: usize, question: &str, answer: &str, warnings: &mut Vec<String>) {
    let question_len = question.chars().count();
    if question.is_empty() {
        warnings.push(format!("Row {line_no}: Missing question"));
    } else if question_len < MIN_QUESTION_CHARS {
        warnings.push(format!(
            "Row {line_no}: Question too short ({question_len} characters)"
        ));
    }

    if answer.is_empty() {
        warnings.push(format!("Row {line_no}: Missing answer"));
    }

    if needs_review(question) || needs_review(answer) {
        warnings.push(format!("Row {line_no}: Content may need review"));
    }
}

fn needs_review(text: &str) -> bool {
    let lower = text.to_lowercase();
    REVIEW_WORDS.iter().any(|w| lower.contains(w))
}

/// Splits one CSV line on commas outside double quotes. Inside quotes a
/// doubled `""` stands for a literal quote. Fields are trimmed.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Finds the first column matching an alias, trying aliases in priority
/// order. A header matches when it equals, contains, or is contained by the
/// alias after lowercasing and trimming.
pub fn find_column(columns: &[String], aliases: &[&str]) -> Option<usize> {
    let normalized: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();

    aliases.iter().find_map(|alias| {
        normalized.iter().position(|col| {
            !col.is_empty() && (col == alias || col.contains(alias) || alias.contains(col.as_str()))
        })
    })
}
