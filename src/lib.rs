/// Matching Service Library
///
/// Suggestion orchestration for the roommate-matching platform:
/// assembles candidate cohorts, scores pairs on the eight compatibility
/// dimensions, filters deal-breakers, and persists ranked suggestions.
/// The public refresh operation is guarded by a Redis-backed per-user
/// lock and rate limiter so it is safe across stateless instances.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers for the matching endpoints
/// - `models`: Candidates, filters, scores, suggestions
/// - `services`: Scoring, deal-breakers, orchestration, diagnostics
/// - `db`: Database access layer and repositories
/// - `concurrency`: Distributed lock and rate limiter
/// - `middleware`: Bearer-token authentication
/// - `error`: Error types and handling
/// - `config`: Configuration management
pub mod concurrency;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
