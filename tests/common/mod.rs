#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use quizdeck::{
    db::{models::NewChild, models::NewDeck, Db},
    extractors::{Claims, JwtVerifier},
    models::GeneratedQuestion,
    names, router, AppState,
};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::Value;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret";

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("quizdeck_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover files from previous runs
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
    let url = format!("sqlite://{}", path.display());
    Db::new(&url).await.expect("failed to create test database")
}

pub fn app(db: Db) -> Router {
    router(AppState::new(
        db,
        JwtVerifier::new(JWT_SECRET),
        None,
        StdRng::seed_from_u64(7),
    ))
}

pub fn token_for(account_id: &str) -> String {
    let claims = Claims {
        sub: account_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        aud: names::JWT_AUDIENCE.to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to sign token")
}

pub async fn create_child(db: &Db, parent_id: &str) -> String {
    db.create_child(NewChild {
        parent_id: parent_id.to_string(),
        name: "Ada".to_string(),
        grade_level: Some(4),
        birth_year: Some(2015),
    })
    .await
    .expect("create child")
    .id
}

pub fn generated(text: &str, answer: &str, category: Option<&str>, row: i64) -> GeneratedQuestion {
    GeneratedQuestion {
        question_text: text.to_string(),
        correct_answer: answer.to_string(),
        distractors: [
            format!("{answer} (a)"),
            format!("{answer} (b)"),
            format!("{answer} (c)"),
        ],
        category: category.map(str::to_string),
        subcategory: None,
        difficulty_level: 1,
        original_csv_row: Some(row),
    }
}

/// A ready deck with 8 "Animals" and 4 "Plants" questions. The answer to
/// `animal N` is `canis N` and to `plant N` is `rosa N`.
pub async fn create_ready_deck(db: &Db, user_id: &str, child_id: &str) -> String {
    let deck = db
        .create_deck(NewDeck {
            user_id: user_id.to_string(),
            child_id: child_id.to_string(),
            name: "Latin Nature".to_string(),
            description: None,
            csv_filename: Some("nature.csv".to_string()),
        })
        .await
        .expect("create deck");

    let mut questions: Vec<GeneratedQuestion> = (0..8)
        .map(|i| generated(&format!("animal {i}"), &format!("canis {i}"), Some("Animals"), i + 2))
        .collect();
    questions.extend(
        (0..4).map(|i| generated(&format!("plant {i}"), &format!("rosa {i}"), Some("Plants"), i + 10)),
    );

    db.store_generated_questions(&deck.id, &questions)
        .await
        .expect("store questions");
    deck.id
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request build should succeed")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::empty())
        .expect("request build should succeed")
}

pub const BOUNDARY: &str = "quizdeck-test-boundary";

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

pub fn multipart_request(uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("request build should succeed")
}
