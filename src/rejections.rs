use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::services::practice::PracticeError;

/// Operations whose unexpected failures surface as a generic `*_FAILED` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SessionStart,
    SessionList,
    AnswerSubmit,
    SessionComplete,
    DeckCreation,
    DeckList,
    DeckFetch,
    DeckUpdate,
    DeckDelete,
    ChildList,
    ChildCreation,
}

impl Operation {
    fn code(self) -> &'static str {
        match self {
            Operation::SessionStart => "SESSION_START_FAILED",
            Operation::SessionList => "SESSION_LIST_FAILED",
            Operation::AnswerSubmit => "ANSWER_SUBMIT_FAILED",
            Operation::SessionComplete => "SESSION_COMPLETE_FAILED",
            Operation::DeckCreation => "DECK_CREATION_FAILED",
            Operation::DeckList => "DECK_LIST_FAILED",
            Operation::DeckFetch => "DECK_FETCH_FAILED",
            Operation::DeckUpdate => "DECK_UPDATE_FAILED",
            Operation::DeckDelete => "DECK_DELETE_FAILED",
            Operation::ChildList => "CHILD_LIST_FAILED",
            Operation::ChildCreation => "CHILD_CREATION_FAILED",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Operation::SessionStart => "Failed to start session",
            Operation::SessionList => "Failed to fetch sessions",
            Operation::AnswerSubmit => "Failed to submit answer",
            Operation::SessionComplete => "Failed to complete session",
            Operation::DeckCreation => "Failed to create deck",
            Operation::DeckList => "Failed to fetch decks",
            Operation::DeckFetch => "Failed to fetch deck",
            Operation::DeckUpdate => "Failed to update deck",
            Operation::DeckDelete => "Failed to delete deck",
            Operation::ChildList => "Failed to fetch children",
            Operation::ChildCreation => "Failed to create child profile",
        }
    }

    fn child_friendly_message(self) -> &'static str {
        match self {
            Operation::SessionStart => {
                "Something went wrong starting your practice session. Please try again!"
            }
            Operation::AnswerSubmit => {
                "Something went wrong submitting your answer. Please try again!"
            }
            Operation::SessionComplete => {
                "Something went wrong finishing your session. Please try again!"
            }
            Operation::DeckCreation => "Something went wrong creating your deck. Please try again!",
            Operation::ChildCreation => {
                "Something went wrong creating the child profile. Please try again!"
            }
            Operation::SessionList
            | Operation::DeckList
            | Operation::DeckFetch
            | Operation::DeckUpdate
            | Operation::DeckDelete
            | Operation::ChildList => "Something went wrong. Please try again!",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    MissingFields {
        message: &'static str,
        hint: &'static str,
    },
    #[error("Child ID is required")]
    MissingChildId,
    #[error("Child name is required")]
    InvalidName,
    #[error("Grade level must be between 1 and 12")]
    InvalidGrade,
    #[error("Invalid birth year")]
    InvalidBirthYear,
    #[error("Please upload a CSV file")]
    InvalidFileType,
    #[error("CSV file must be smaller than 10MB")]
    FileTooLarge,
    #[error("CSV validation failed")]
    InvalidCsv {
        errors: Vec<String>,
        warnings: Vec<String>,
    },
    #[error("{0}")]
    InvalidRequest(&'static str),
    #[error("Deck is still being processed")]
    DeckNotReady,
    #[error("No questions found in deck")]
    NoQuestions,
    #[error("Session has already been completed")]
    SessionCompleted,
    #[error("Session has already been completed")]
    SessionAlreadyCompleted,
    #[error("Question has already been answered")]
    AlreadyAnswered,
    #[error("Authentication required")]
    AuthRequired,
    #[error("Deck not found or not accessible")]
    UnauthorizedDeck,
    #[error("Child not found or not accessible")]
    UnauthorizedChild,
    #[error("Not authorized to access this session")]
    UnauthorizedSession,
    #[error("Deck not found")]
    DeckNotFound,
    #[error("Test session not found")]
    SessionNotFound,
    #[error("Question not found")]
    QuestionNotFound,
    #[error("{}", .0.description())]
    Failed(Operation),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::UnauthorizedDeck
            | AppError::UnauthorizedChild
            | AppError::UnauthorizedSession => StatusCode::FORBIDDEN,
            AppError::DeckNotFound | AppError::SessionNotFound | AppError::QuestionNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingFields { .. } => "MISSING_FIELDS",
            AppError::MissingChildId => "MISSING_CHILD_ID",
            AppError::InvalidName => "INVALID_NAME",
            AppError::InvalidGrade => "INVALID_GRADE",
            AppError::InvalidBirthYear => "INVALID_BIRTH_YEAR",
            AppError::InvalidFileType => "INVALID_FILE_TYPE",
            AppError::FileTooLarge => "FILE_TOO_LARGE",
            AppError::InvalidCsv { .. } => "INVALID_CSV",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::DeckNotReady => "DECK_NOT_READY",
            AppError::NoQuestions => "NO_QUESTIONS",
            AppError::SessionCompleted => "SESSION_COMPLETED",
            AppError::SessionAlreadyCompleted => "SESSION_ALREADY_COMPLETED",
            AppError::AlreadyAnswered => "ALREADY_ANSWERED",
            AppError::AuthRequired => "AUTH_REQUIRED",
            AppError::UnauthorizedDeck => "UNAUTHORIZED_DECK",
            AppError::UnauthorizedChild => "UNAUTHORIZED_CHILD",
            AppError::UnauthorizedSession => "UNAUTHORIZED_SESSION",
            AppError::DeckNotFound => "DECK_NOT_FOUND",
            AppError::SessionNotFound => "SESSION_NOT_FOUND",
            AppError::QuestionNotFound => "QUESTION_NOT_FOUND",
            AppError::Failed(op) => op.code(),
        }
    }

    pub fn child_friendly_message(&self) -> &'static str {
        match self {
            AppError::MissingFields { hint, .. } => *hint,
            AppError::MissingChildId | AppError::UnauthorizedChild => {
                "Please select one of your children."
            }
            AppError::InvalidName => "Please enter your child's name.",
            AppError::InvalidGrade => "Please select a grade level between 1st and 12th grade.",
            AppError::InvalidBirthYear => "Please enter a valid birth year.",
            AppError::InvalidFileType => "Please upload a CSV file with your flashcards.",
            AppError::FileTooLarge => "Your file is too big! Please use a smaller CSV file.",
            AppError::InvalidCsv { .. } => {
                "There are some problems with your CSV file. Please check it and try again."
            }
            AppError::InvalidRequest(_) => "Something went wrong. Please try again!",
            AppError::DeckNotReady => {
                "Your deck is still being prepared! Please wait a few minutes and try again."
            }
            AppError::NoQuestions => {
                "This deck doesn't have any questions yet. Please add some questions first!"
            }
            AppError::SessionCompleted | AppError::SessionAlreadyCompleted => {
                "This practice session is already finished!"
            }
            AppError::AlreadyAnswered => "You've already answered this question!",
            AppError::AuthRequired => "Please sign in to keep practicing!",
            AppError::UnauthorizedDeck => "We couldn't find that deck. Please try another one!",
            AppError::UnauthorizedSession => "You don't have permission to access this session.",
            AppError::DeckNotFound => "We couldn't find that deck. Please check and try again.",
            AppError::SessionNotFound => "We couldn't find your practice session!",
            AppError::QuestionNotFound => "We couldn't find that question. Please try again!",
            AppError::Failed(op) => op.child_friendly_message(),
        }
    }

    /// Maps a session engine failure, turning storage errors into the
    /// operation's generic failure after logging them.
    pub fn from_practice(err: PracticeError, op: Operation) -> Self {
        match err {
            PracticeError::UnauthorizedDeck => AppError::UnauthorizedDeck,
            PracticeError::UnauthorizedChild => AppError::UnauthorizedChild,
            PracticeError::DeckNotReady => AppError::DeckNotReady,
            PracticeError::NoQuestions => AppError::NoQuestions,
            PracticeError::SessionNotFound => AppError::SessionNotFound,
            PracticeError::UnauthorizedSession => AppError::UnauthorizedSession,
            PracticeError::SessionCompleted => AppError::SessionCompleted,
            PracticeError::SessionAlreadyCompleted => AppError::SessionAlreadyCompleted,
            PracticeError::QuestionNotFound => AppError::QuestionNotFound,
            PracticeError::AlreadyAnswered => AppError::AlreadyAnswered,
            PracticeError::Storage(report) => {
                tracing::error!(code = op.code(), "{report:?}");
                AppError::Failed(op)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::warn!(code = self.code(), "request rejected: {self}");
        }

        let mut error = json!({
            "code": self.code(),
            "message": self.to_string(),
            "childFriendlyMessage": self.child_friendly_message(),
        });
        if let AppError::InvalidCsv { errors, warnings } = self {
            error["details"] = json!({ "errors": errors, "warnings": warnings });
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

pub trait ResultExt<T> {
    /// Logs the failure and converts it into `op`'s generic failure.
    fn reject(self, op: Operation) -> Result<T, AppError>;
}

impl<T> ResultExt<T> for color_eyre::Result<T> {
    fn reject(self, op: Operation) -> Result<T, AppError> {
        self.map_err(|e| {
            tracing::error!(code = op.code(), "{e:?}");
            AppError::Failed(op)
        })
    }
}

impl<T> ResultExt<T> for Result<T, PracticeError> {
    fn reject(self, op: Operation) -> Result<T, AppError> {
        self.map_err(|e| AppError::from_practice(e, op))
    }
}
