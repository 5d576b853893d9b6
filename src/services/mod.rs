pub mod deck_stats;
pub mod practice;
pub mod scoring;
