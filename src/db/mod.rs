/// Database access layer
///
/// Repositories are defined as traits so the orchestrator can be
/// exercised against mocks; the Postgres implementations live next to
/// them. The candidate table is read-only from this service; the
/// suggestion table is append-only apart from status transitions.
pub mod candidates;
pub mod suggestions;

pub use candidates::{CandidateRepository, PgCandidateRepository};
pub use suggestions::{PgSuggestionStore, SuggestionStore};
