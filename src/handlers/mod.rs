use std::sync::Arc;

use actix_web::web;

use crate::concurrency::{RefreshLock, RefreshRateLimiter};
use crate::db::SuggestionStore;
use crate::services::SuggestionOrchestrator;

pub mod suggestions;

pub use suggestions::{
    accept_suggestion, get_suggestions, refresh_suggestions, RefreshRequest, RefreshResponse,
};

/// Shared state for the matching endpoints.
pub struct AppState {
    pub orchestrator: Arc<SuggestionOrchestrator>,
    pub suggestions: Arc<dyn SuggestionStore>,
    pub lock: RefreshLock,
    pub rate_limiter: RefreshRateLimiter,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/match/suggestions")
            .route("", web::get().to(get_suggestions))
            .route("/refresh", web::post().to(refresh_suggestions))
            .route("/{id}/accept", web::post().to(accept_suggestion)),
    );
}
