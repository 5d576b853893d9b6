pub mod db;
pub mod extractors;
pub mod flashcards;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use extractors::JwtVerifier;
use services::practice::PracticeService;
use storage::CsvArchive;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub practice: Arc<PracticeService>,
    pub jwt: JwtVerifier,
    pub archive: Option<CsvArchive>,
}

impl AppState {
    pub fn new(
        db: db::Db,
        jwt: JwtVerifier,
        archive: Option<CsvArchive>,
        rng: rand::rngs::StdRng,
    ) -> Self {
        Self {
            practice: Arc::new(PracticeService::new(db.clone(), rng)),
            db,
            jwt,
            archive,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(handlers::health::routes())
        .merge(handlers::sessions::routes())
        .merge(handlers::decks::routes())
        .merge(handlers::children::routes())
        .layer(DefaultBodyLimit::max(names::MAX_UPLOAD_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
