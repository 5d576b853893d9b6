pub mod children;
pub mod decks;
pub mod health;
pub mod sessions;
