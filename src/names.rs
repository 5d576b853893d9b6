pub const HEALTH_URL: &str = "/health";
pub const CSV_VALIDATE_URL: &str = "/csv/validate";
pub const DECKS_URL: &str = "/decks";
pub const DECK_URL: &str = "/decks/{id}";
pub const CHILDREN_URL: &str = "/children";
pub const SESSIONS_URL: &str = "/sessions";
pub const SESSION_ANSWER_URL: &str = "/sessions/{id}/answer";
pub const SESSION_COMPLETE_URL: &str = "/sessions/{id}/complete";

pub fn deck_url(deck_id: &str) -> String {
    format!("/decks/{deck_id}")
}

pub fn session_answer_url(session_id: &str) -> String {
    format!("/sessions/{session_id}/answer")
}

pub fn session_complete_url(session_id: &str) -> String {
    format!("/sessions/{session_id}/complete")
}

// Identity
pub const JWT_AUDIENCE: &str = "authenticated";

// Uploads
pub const CSV_FIELD: &str = "csvFile";
pub const MAX_CSV_BYTES: usize = 10 * 1024 * 1024;
/// Transport cap for a whole multipart body. A file between `MAX_CSV_BYTES`
/// and this size is still read to the end so the other fields are checked
/// first.
pub const MAX_UPLOAD_BODY_BYTES: usize = 2 * MAX_CSV_BYTES;
pub const ESTIMATED_PROCESSING_SECONDS: u32 = 300;

// Listing defaults
pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 100;
pub const RECENT_DECK_SESSIONS: usize = 5;
pub const TREND_WINDOW: usize = 3;

// Child profiles
pub const MIN_GRADE: i64 = 1;
pub const MAX_GRADE: i64 = 12;
pub const MIN_BIRTH_YEAR: i64 = 2000;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
