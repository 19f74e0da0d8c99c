pub mod completeness;
pub mod dealbreakers;
pub mod diagnostics;
pub mod orchestrator;
pub mod scoring;
pub mod vectors;

pub use dealbreakers::{DealBreakerFilter, DealBreakerReason, DealBreakerVerdict};
pub use diagnostics::{Diagnostic, DiagnosticReason, DiagnosticReporter};
pub use orchestrator::{RefreshOutcome, SuggestionOrchestrator};
pub use scoring::CompatibilityScorer;
pub use vectors::{HttpVectorEnsurer, VectorEnsurer};
