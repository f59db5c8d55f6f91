pub mod error;
pub mod models;
pub mod openapi;
pub mod repo;
pub mod routes;
pub mod storage;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
