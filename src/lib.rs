pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod nfe;
pub mod service;

pub use config::AppConfig;
pub use db::{create_pool, MemoryStore, NfeStore, PgStore};
pub use service::{BatchProcessor, ImportOutcome, JobRegistry, NfeImporter};
