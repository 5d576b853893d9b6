use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::db::models::{
    ChildModel, DeckModel, NewResponse, NewSession, OwnedSessionModel, ProcessingStatus,
    QuestionModel, ResponseModel, SessionCompletion, SessionListItem, SessionModel, SessionScore,
    SessionType,
};
use crate::db::{Db, RecordOutcome};

use super::scoring::{self, Achievement, CategoryScore};

type Result<T> = color_eyre::Result<T>;

// ---------------------------------------------------------------------------
// PracticeRepository trait (the persistence operations the engine needs)
// ---------------------------------------------------------------------------

#[cfg_attr(test, mockall::automock)]
pub trait PracticeRepository: Send + Sync {
    fn get_deck(
        &self,
        deck_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<DeckModel>>> + Send;

    fn get_child(
        &self,
        child_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChildModel>>> + Send;

    fn questions_for_deck(
        &self,
        deck_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<QuestionModel>>> + Send;

    fn question_in_deck(
        &self,
        deck_id: &str,
        question_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<QuestionModel>>> + Send;

    fn create_session(
        &self,
        session: NewSession,
    ) -> impl std::future::Future<Output = Result<SessionModel>> + Send;

    fn get_owned_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<OwnedSessionModel>>> + Send;

    fn sessions_for_child(
        &self,
        child_id: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<SessionListItem>>> + Send;

    fn response_exists(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn record_response(
        &self,
        response: NewResponse,
    ) -> impl std::future::Future<Output = Result<RecordOutcome>> + Send;

    fn responses_for_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ResponseModel>>> + Send;

    fn complete_session(
        &self,
        session_id: &str,
        completion: &SessionCompletion,
    ) -> impl std::future::Future<Output = Result<Option<SessionScore>>> + Send;
}

impl PracticeRepository for Db {
    fn get_deck(
        &self,
        deck_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<DeckModel>>> + Send {
        Db::get_deck(self, deck_id)
    }

    fn get_child(
        &self,
        child_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChildModel>>> + Send {
        Db::get_child(self, child_id)
    }

    fn questions_for_deck(
        &self,
        deck_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<QuestionModel>>> + Send {
        Db::questions_for_deck(self, deck_id)
    }

    fn question_in_deck(
        &self,
        deck_id: &str,
        question_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<QuestionModel>>> + Send {
        Db::question_in_deck(self, deck_id, question_id)
    }

    fn create_session(
        &self,
        session: NewSession,
    ) -> impl std::future::Future<Output = Result<SessionModel>> + Send {
        Db::create_session(self, session)
    }

    fn get_owned_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<OwnedSessionModel>>> + Send {
        Db::get_owned_session(self, session_id)
    }

    fn sessions_for_child(
        &self,
        child_id: &str,
        limit: i64,
    ) -> impl std::future::Future<Output = Result<Vec<SessionListItem>>> + Send {
        Db::sessions_for_child(self, child_id, limit)
    }

    fn response_exists(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send {
        Db::response_exists(self, session_id, question_id)
    }

    fn record_response(
        &self,
        response: NewResponse,
    ) -> impl std::future::Future<Output = Result<RecordOutcome>> + Send {
        Db::record_response(self, response)
    }

    fn responses_for_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ResponseModel>>> + Send {
        Db::responses_for_session(self, session_id)
    }

    fn complete_session(
        &self,
        session_id: &str,
        completion: &SessionCompletion,
    ) -> impl std::future::Future<Output = Result<Option<SessionScore>>> + Send {
        Db::complete_session(self, session_id, completion)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PracticeError {
    #[error("deck not found or not accessible")]
    UnauthorizedDeck,
    #[error("child not found or not accessible")]
    UnauthorizedChild,
    #[error("deck is still being processed")]
    DeckNotReady,
    #[error("no questions available in deck")]
    NoQuestions,
    #[error("test session not found")]
    SessionNotFound,
    #[error("session belongs to another account")]
    UnauthorizedSession,
    #[error("session has already been completed")]
    SessionCompleted,
    #[error("session was completed before this request")]
    SessionAlreadyCompleted,
    #[error("question not found in session deck")]
    QuestionNotFound,
    #[error("question has already been answered")]
    AlreadyAnswered,
    #[error("storage failure: {0}")]
    Storage(color_eyre::Report),
}

impl From<color_eyre::Report> for PracticeError {
    fn from(report: color_eyre::Report) -> Self {
        PracticeError::Storage(report)
    }
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    #[serde(default)]
    pub deck_id: String,
    #[serde(default)]
    pub child_id: String,
    #[serde(default)]
    pub session_type: SessionType,
    pub question_count: Option<i64>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestion {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub category: String,
    pub subcategory: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub session_id: String,
    pub questions: Vec<SessionQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswer {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub selected_answer: String,
    pub response_time_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub encouragement_message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub score: f64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub duration_seconds: i64,
    pub category_breakdown: Vec<CategoryScore>,
    pub achievements: Vec<Achievement>,
    pub encouragement_message: String,
}

pub const DEFAULT_SESSION_LIST_LIMIT: i64 = 10;
const MAX_SESSION_LIST_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// PracticeService
// ---------------------------------------------------------------------------

pub struct PracticeService<R: PracticeRepository = Db> {
    repo: R,
    rng: Mutex<StdRng>,
}

impl<R: PracticeRepository> PracticeService<R> {
    pub fn new(repo: R, rng: StdRng) -> Self {
        Self {
            repo,
            rng: Mutex::new(rng),
        }
    }

    /// Runs `f` with exclusive access to the random source. Never held across
    /// an await point.
    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    async fn owned_child(&self, account_id: &str, child_id: &str) -> Result<Option<ChildModel>> {
        Ok(self
            .repo
            .get_child(child_id)
            .await?
            .filter(|child| child.parent_id == account_id))
    }

    async fn owned_session(
        &self,
        account_id: &str,
        session_id: &str,
    ) -> std::result::Result<SessionModel, PracticeError> {
        let owned = self
            .repo
            .get_owned_session(session_id)
            .await?
            .ok_or(PracticeError::SessionNotFound)?;

        if owned.parent_id != account_id {
            return Err(PracticeError::UnauthorizedSession);
        }
        Ok(owned.session)
    }

    pub async fn start_session(
        &self,
        account_id: &str,
        request: StartSession,
    ) -> std::result::Result<StartedSession, PracticeError> {
        let deck = self
            .repo
            .get_deck(&request.deck_id)
            .await?
            .filter(|deck| deck.user_id == account_id)
            .ok_or(PracticeError::UnauthorizedDeck)?;

        self.owned_child(account_id, &request.child_id)
            .await?
            .ok_or(PracticeError::UnauthorizedChild)?;

        if deck.processing_status != ProcessingStatus::Completed {
            return Err(PracticeError::DeckNotReady);
        }

        let questions = self.repo.questions_for_deck(&deck.id).await?;
        let selected = self.with_rng(|rng| {
            scoring::select_questions(
                questions,
                &request.categories,
                request.question_count,
                rng,
            )
        });
        if selected.is_empty() {
            return Err(PracticeError::NoQuestions);
        }

        let session = self
            .repo
            .create_session(NewSession {
                child_id: request.child_id.clone(),
                deck_id: deck.id.clone(),
                total_questions: selected.len() as i64,
                session_type: request.session_type,
            })
            .await?;

        let questions: Vec<SessionQuestion> = self.with_rng(|rng| {
            selected
                .iter()
                .map(|q| SessionQuestion {
                    id: q.id.clone(),
                    question_text: q.question_text.clone(),
                    options: scoring::answer_options(q, rng),
                    category: scoring::category_of(q).to_string(),
                    subcategory: q
                        .subcategory
                        .clone()
                        .unwrap_or_else(|| scoring::GENERAL.to_string()),
                })
                .collect()
        });

        Ok(StartedSession {
            session_id: session.id,
            time_limit: scoring::time_limit(request.session_type, questions.len()),
            questions,
        })
    }

    pub async fn list_sessions(
        &self,
        account_id: &str,
        child_id: &str,
        limit: Option<i64>,
    ) -> std::result::Result<Vec<SessionListItem>, PracticeError> {
        self.owned_child(account_id, child_id)
            .await?
            .ok_or(PracticeError::UnauthorizedChild)?;

        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_SESSION_LIST_LIMIT)
            .min(MAX_SESSION_LIST_LIMIT);

        Ok(self.repo.sessions_for_child(child_id, limit).await?)
    }

    pub async fn submit_answer(
        &self,
        account_id: &str,
        session_id: &str,
        answer: SubmitAnswer,
    ) -> std::result::Result<AnswerFeedback, PracticeError> {
        let session = self.owned_session(account_id, session_id).await?;
        if session.is_completed() {
            return Err(PracticeError::SessionCompleted);
        }

        let question = self
            .repo
            .question_in_deck(&session.deck_id, &answer.question_id)
            .await?
            .ok_or(PracticeError::QuestionNotFound)?;

        if self
            .repo
            .response_exists(session_id, &question.id)
            .await?
        {
            return Err(PracticeError::AlreadyAnswered);
        }

        let is_correct = scoring::is_correct_answer(&answer.selected_answer, &question.correct_answer);

        let outcome = self
            .repo
            .record_response(NewResponse {
                session_id: session_id.to_string(),
                question_id: question.id.clone(),
                selected_answer: answer.selected_answer,
                is_correct,
                response_time_seconds: answer.response_time_seconds,
            })
            .await?;

        let correct_answers = match outcome {
            RecordOutcome::Recorded { correct_answers } => correct_answers,
            RecordOutcome::Duplicate => return Err(PracticeError::AlreadyAnswered),
            RecordOutcome::SessionClosed => return Err(PracticeError::SessionCompleted),
        };

        let encouragement_message =
            self.with_rng(|rng| scoring::encouragement(is_correct, correct_answers, rng));

        Ok(if is_correct {
            AnswerFeedback {
                is_correct,
                correct_answer: None,
                explanation: None,
                encouragement_message,
            }
        } else {
            AnswerFeedback {
                is_correct,
                explanation: Some(scoring::explanation(&question)),
                correct_answer: Some(question.correct_answer),
                encouragement_message,
            }
        })
    }

    pub async fn complete_session(
        &self,
        account_id: &str,
        session_id: &str,
    ) -> std::result::Result<SessionSummary, PracticeError> {
        let session = self.owned_session(account_id, session_id).await?;
        if session.is_completed() {
            return Err(PracticeError::SessionAlreadyCompleted);
        }

        let now = Utc::now();
        let duration_seconds = (now - session.started_at).num_seconds().max(0);
        let completion = SessionCompletion {
            completed_at: now,
            duration_seconds,
        };
        let stored = self
            .repo
            .complete_session(session_id, &completion)
            .await?
            .ok_or(PracticeError::SessionAlreadyCompleted)?;

        // The session is closed now, so this is the full set of responses.
        let responses = self.repo.responses_for_session(session_id).await?;
        let questions = self.repo.questions_for_deck(&session.deck_id).await?;

        let correct_answers = stored.correct_answers;
        let score = scoring::score_percentage(correct_answers, session.total_questions);

        Ok(SessionSummary {
            score: stored.score_percentage,
            correct_answers,
            total_questions: session.total_questions,
            duration_seconds,
            category_breakdown: scoring::category_breakdown(&questions, &responses),
            achievements: scoring::achievements(score, correct_answers, duration_seconds),
            encouragement_message: scoring::final_encouragement(
                score,
                correct_answers,
                session.total_questions,
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use rand::SeedableRng;

    const ACCOUNT: &str = "account-1";

    fn service(mock: MockPracticeRepository) -> PracticeService<MockPracticeRepository> {
        PracticeService::new(mock, StdRng::seed_from_u64(42))
    }

    fn deck(status: ProcessingStatus) -> DeckModel {
        DeckModel {
            id: "deck-1".to_string(),
            user_id: ACCOUNT.to_string(),
            child_id: "child-1".to_string(),
            name: "Latin Animals".to_string(),
            description: None,
            subject: "Latin".to_string(),
            total_questions: 12,
            csv_filename: Some("animals.csv".to_string()),
            processing_status: status,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn child(parent_id: &str) -> ChildModel {
        ChildModel {
            id: "child-1".to_string(),
            parent_id: parent_id.to_string(),
            name: "Ada".to_string(),
            grade_level: Some(4),
            birth_year: Some(2015),
            created_at: Utc::now(),
            is_active: true,
        }
    }

    fn question(id: &str, category: Option<&str>, answer: &str) -> QuestionModel {
        QuestionModel {
            id: id.to_string(),
            deck_id: "deck-1".to_string(),
            question_text: format!("Translate {id}"),
            correct_answer: answer.to_string(),
            distractor_1: format!("{answer}-x"),
            distractor_2: format!("{answer}-y"),
            distractor_3: format!("{answer}-z"),
            category: category.map(str::to_string),
            subcategory: None,
            difficulty_level: 1,
            original_csv_row: None,
        }
    }

    fn mixed_deck() -> Vec<QuestionModel> {
        let mut questions: Vec<QuestionModel> = (0..8)
            .map(|i| question(&format!("a{i}"), Some("Animals"), "canis"))
            .collect();
        questions.extend((0..4).map(|i| question(&format!("p{i}"), Some("Plants"), "rosa")));
        questions
    }

    fn session(started_at: DateTime<Utc>, completed: bool, total: i64) -> SessionModel {
        SessionModel {
            id: "session-1".to_string(),
            child_id: "child-1".to_string(),
            deck_id: "deck-1".to_string(),
            started_at,
            completed_at: completed.then(Utc::now),
            total_questions: total,
            correct_answers: 0,
            duration_seconds: None,
            score_percentage: None,
            session_type: SessionType::Practice,
        }
    }

    fn owned(session: SessionModel, parent_id: &str) -> OwnedSessionModel {
        OwnedSessionModel {
            session,
            parent_id: parent_id.to_string(),
        }
    }

    fn response(question_id: &str, is_correct: bool) -> ResponseModel {
        ResponseModel {
            id: format!("r-{question_id}"),
            session_id: "session-1".to_string(),
            question_id: question_id.to_string(),
            selected_answer: "x".to_string(),
            is_correct,
            response_time_seconds: Some(4.0),
            answered_at: Utc::now(),
        }
    }

    fn start_request() -> StartSession {
        StartSession {
            deck_id: "deck-1".to_string(),
            child_id: "child-1".to_string(),
            ..StartSession::default()
        }
    }

    fn ready_repo() -> MockPracticeRepository {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_deck()
            .returning(|_| Box::pin(async { Ok(Some(deck(ProcessingStatus::Completed))) }));
        mock.expect_get_child()
            .returning(|_| Box::pin(async { Ok(Some(child(ACCOUNT))) }));
        mock.expect_questions_for_deck()
            .returning(|_| Box::pin(async { Ok(mixed_deck()) }));
        mock
    }

    fn active_session_repo() -> MockPracticeRepository {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session().returning(|_| {
            Box::pin(async { Ok(Some(owned(session(Utc::now(), false, 10), ACCOUNT))) })
        });
        mock
    }

    // ----- start_session tests -----

    #[tokio::test]
    async fn start_filters_by_category_and_count() {
        let mut mock = ready_repo();
        mock.expect_create_session()
            .withf(|s| s.total_questions == 6 && s.session_type == SessionType::Practice)
            .times(1)
            .returning(|s| {
                Box::pin(async move {
                    let mut created = session(Utc::now(), false, s.total_questions);
                    created.id = "session-new".to_string();
                    Ok(created)
                })
            });

        let svc = service(mock);
        let started = svc
            .start_session(
                ACCOUNT,
                StartSession {
                    question_count: Some(6),
                    categories: vec!["Animals".to_string()],
                    ..start_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(started.session_id, "session-new");
        assert_eq!(started.questions.len(), 6);
        assert!(started.questions.iter().all(|q| q.category == "Animals"));
        assert!(started.questions.iter().all(|q| q.subcategory == "General"));
        assert!(started.questions.iter().all(|q| q.options.len() == 4
            && q.options.contains(&"canis".to_string())));
        assert_eq!(started.time_limit, None);
    }

    #[tokio::test]
    async fn start_returns_available_count_when_filter_is_short() {
        let mut mock = ready_repo();
        mock.expect_create_session()
            .returning(|s| Box::pin(async move { Ok(session(Utc::now(), false, s.total_questions)) }));

        let svc = service(mock);
        let started = svc
            .start_session(
                ACCOUNT,
                StartSession {
                    question_count: Some(6),
                    categories: vec!["Plants".to_string()],
                    ..start_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(started.questions.len(), 4);
    }

    #[tokio::test]
    async fn test_sessions_get_thirty_seconds_per_question() {
        let mut mock = ready_repo();
        mock.expect_create_session()
            .returning(|s| Box::pin(async move { Ok(session(Utc::now(), false, s.total_questions)) }));

        let svc = service(mock);
        let started = svc
            .start_session(
                ACCOUNT,
                StartSession {
                    session_type: SessionType::Test,
                    question_count: Some(5),
                    ..start_request()
                },
            )
            .await
            .unwrap();

        assert_eq!(started.time_limit, Some(150));
    }

    #[tokio::test]
    async fn start_rejects_foreign_deck() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_deck().returning(|_| {
            Box::pin(async {
                let mut d = deck(ProcessingStatus::Completed);
                d.user_id = "someone-else".to_string();
                Ok(Some(d))
            })
        });
        mock.expect_create_session().never();

        let err = service(mock)
            .start_session(ACCOUNT, start_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::UnauthorizedDeck));
    }

    #[tokio::test]
    async fn start_rejects_foreign_child() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_deck()
            .returning(|_| Box::pin(async { Ok(Some(deck(ProcessingStatus::Completed))) }));
        mock.expect_get_child()
            .returning(|_| Box::pin(async { Ok(Some(child("someone-else"))) }));

        let err = service(mock)
            .start_session(ACCOUNT, start_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::UnauthorizedChild));
    }

    #[tokio::test]
    async fn start_rejects_deck_still_processing() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_deck()
            .returning(|_| Box::pin(async { Ok(Some(deck(ProcessingStatus::Processing))) }));
        mock.expect_get_child()
            .returning(|_| Box::pin(async { Ok(Some(child(ACCOUNT))) }));

        let err = service(mock)
            .start_session(ACCOUNT, start_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::DeckNotReady));
    }

    #[tokio::test]
    async fn start_rejects_filter_with_no_matches() {
        let mut mock = ready_repo();
        mock.expect_create_session().never();

        let err = service(mock)
            .start_session(
                ACCOUNT,
                StartSession {
                    categories: vec!["Minerals".to_string()],
                    ..start_request()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::NoQuestions));
    }

    #[tokio::test]
    async fn storage_failures_surface_as_storage_errors() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_deck()
            .returning(|_| Box::pin(async { Err(color_eyre::eyre::eyre!("db down")) }));

        let err = service(mock)
            .start_session(ACCOUNT, start_request())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::Storage(_)));
    }

    // ----- list_sessions tests -----

    #[tokio::test]
    async fn list_uses_default_limit() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_child()
            .returning(|_| Box::pin(async { Ok(Some(child(ACCOUNT))) }));
        mock.expect_sessions_for_child()
            .withf(|child_id, limit| child_id == "child-1" && *limit == 10)
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(vec![]) }));

        let sessions = service(mock)
            .list_sessions(ACCOUNT, "child-1", None)
            .await
            .unwrap();
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn list_rejects_foreign_child() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_child().returning(|_| Box::pin(async { Ok(None) }));

        let err = service(mock)
            .list_sessions(ACCOUNT, "child-1", Some(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::UnauthorizedChild));
    }

    // ----- submit_answer tests -----

    #[tokio::test]
    async fn correct_answer_ignores_case_and_whitespace() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(Some(question("q1", Some("Animals"), "dog"))) }));
        mock.expect_response_exists()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        mock.expect_record_response()
            .withf(|r| r.is_correct && r.selected_answer == " Dog ")
            .times(1)
            .returning(|_| Box::pin(async { Ok(RecordOutcome::Recorded { correct_answers: 1 }) }));

        let feedback = service(mock)
            .submit_answer(
                ACCOUNT,
                "session-1",
                SubmitAnswer {
                    question_id: "q1".to_string(),
                    selected_answer: " Dog ".to_string(),
                    response_time_seconds: Some(3.5),
                },
            )
            .await
            .unwrap();

        assert!(feedback.is_correct);
        assert!(feedback.correct_answer.is_none());
        assert!(feedback.explanation.is_none());
    }

    #[tokio::test]
    async fn wrong_answer_reveals_correct_answer() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(Some(question("q1", Some("Animals"), "dog"))) }));
        mock.expect_response_exists()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        mock.expect_record_response()
            .returning(|_| Box::pin(async { Ok(RecordOutcome::Recorded { correct_answers: 3 }) }));

        let feedback = service(mock)
            .submit_answer(
                ACCOUNT,
                "session-1",
                SubmitAnswer {
                    question_id: "q1".to_string(),
                    selected_answer: "cat".to_string(),
                    response_time_seconds: None,
                },
            )
            .await
            .unwrap();

        assert!(!feedback.is_correct);
        assert_eq!(feedback.correct_answer.as_deref(), Some("dog"));
        assert_eq!(
            feedback.explanation.as_deref(),
            Some("The correct answer is \"dog\". This is a Animals question. Keep practicing to remember it better!")
        );
    }

    #[tokio::test]
    async fn fifth_correct_answer_gets_milestone_message() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(Some(question("q1", None, "dog"))) }));
        mock.expect_response_exists()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        mock.expect_record_response()
            .returning(|_| Box::pin(async { Ok(RecordOutcome::Recorded { correct_answers: 5 }) }));

        let feedback = service(mock)
            .submit_answer(
                ACCOUNT,
                "session-1",
                SubmitAnswer {
                    question_id: "q1".to_string(),
                    selected_answer: "dog".to_string(),
                    response_time_seconds: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            feedback.encouragement_message,
            "Amazing! You've gotten 5 questions right! 🏆"
        );
    }

    #[tokio::test]
    async fn answer_rejected_when_previously_answered() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(Some(question("q1", None, "dog"))) }));
        mock.expect_response_exists()
            .returning(|_, _| Box::pin(async { Ok(true) }));
        mock.expect_record_response().never();

        let err = service(mock)
            .submit_answer(
                ACCOUNT,
                "session-1",
                SubmitAnswer {
                    question_id: "q1".to_string(),
                    selected_answer: "dog".to_string(),
                    response_time_seconds: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::AlreadyAnswered));
    }

    #[tokio::test]
    async fn losing_a_concurrent_submission_is_already_answered() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(Some(question("q1", None, "dog"))) }));
        mock.expect_response_exists()
            .returning(|_, _| Box::pin(async { Ok(false) }));
        mock.expect_record_response()
            .returning(|_| Box::pin(async { Ok(RecordOutcome::Duplicate) }));

        let err = service(mock)
            .submit_answer(
                ACCOUNT,
                "session-1",
                SubmitAnswer {
                    question_id: "q1".to_string(),
                    selected_answer: "dog".to_string(),
                    response_time_seconds: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::AlreadyAnswered));
    }

    #[tokio::test]
    async fn answer_rejected_for_completed_session() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session().returning(|_| {
            Box::pin(async { Ok(Some(owned(session(Utc::now(), true, 10), ACCOUNT))) })
        });
        mock.expect_question_in_deck().never();

        let err = service(mock)
            .submit_answer(ACCOUNT, "session-1", SubmitAnswer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::SessionCompleted));
    }

    #[tokio::test]
    async fn answer_rejected_for_question_outside_deck() {
        let mut mock = active_session_repo();
        mock.expect_question_in_deck()
            .returning(|_, _| Box::pin(async { Ok(None) }));

        let err = service(mock)
            .submit_answer(ACCOUNT, "session-1", SubmitAnswer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::QuestionNotFound));
    }

    #[tokio::test]
    async fn answer_rejected_for_unknown_or_foreign_session() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session()
            .returning(|_| Box::pin(async { Ok(None) }));
        let err = service(mock)
            .submit_answer(ACCOUNT, "missing", SubmitAnswer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::SessionNotFound));

        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session().returning(|_| {
            Box::pin(async { Ok(Some(owned(session(Utc::now(), false, 10), "someone-else"))) })
        });
        let err = service(mock)
            .submit_answer(ACCOUNT, "session-1", SubmitAnswer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::UnauthorizedSession));
    }

    // ----- complete_session tests -----

    #[tokio::test]
    async fn completion_reports_the_stored_score() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session().returning(|_| {
            Box::pin(async {
                Ok(Some(owned(
                    session(Utc::now() - Duration::seconds(600), false, 10),
                    ACCOUNT,
                )))
            })
        });
        let mut seq = mockall::Sequence::new();
        mock.expect_complete_session()
            .withf(|id, c| id == "session-1" && c.duration_seconds >= 600)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(Some(SessionScore {
                        correct_answers: 7,
                        score_percentage: 70.0,
                    }))
                })
            });
        mock.expect_responses_for_session()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Box::pin(async {
                    let mut responses: Vec<ResponseModel> =
                        (0..7).map(|i| response(&format!("a{i}"), true)).collect();
                    responses.push(response("a7", false));
                    responses.push(response("p0", false));
                    responses.push(response("p1", false));
                    Ok(responses)
                })
            });
        mock.expect_questions_for_deck()
            .returning(|_| Box::pin(async { Ok(mixed_deck()) }));

        let summary = service(mock)
            .complete_session(ACCOUNT, "session-1")
            .await
            .unwrap();

        assert_eq!(summary.score, 70.0);
        assert_eq!(summary.correct_answers, 7);
        assert!(summary.duration_seconds >= 600);
        assert!(summary.achievements.contains(&Achievement::GoodWork));
        assert!(!summary.achievements.contains(&Achievement::ExcellentPerformance));
        assert_eq!(
            summary.category_breakdown,
            vec![
                CategoryScore {
                    category: "Animals".to_string(),
                    correct: 7,
                    total: 8
                },
                CategoryScore {
                    category: "Plants".to_string(),
                    correct: 0,
                    total: 2
                },
            ]
        );
        assert!(summary.encouragement_message.starts_with("💪 Good job! You got 7 out of 10"));
    }

    #[tokio::test]
    async fn completing_twice_is_rejected() {
        let mut mock = MockPracticeRepository::new();
        mock.expect_get_owned_session().returning(|_| {
            Box::pin(async { Ok(Some(owned(session(Utc::now(), true, 10), ACCOUNT))) })
        });
        mock.expect_complete_session().never();

        let err = service(mock)
            .complete_session(ACCOUNT, "session-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::SessionAlreadyCompleted));
    }

    #[tokio::test]
    async fn losing_a_completion_race_is_already_completed() {
        let mut mock = active_session_repo();
        mock.expect_complete_session()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        mock.expect_responses_for_session().never();

        let err = service(mock)
            .complete_session(ACCOUNT, "session-1")
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::SessionAlreadyCompleted));
    }
}
