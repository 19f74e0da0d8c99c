/// Suggestion endpoints.
///
/// The refresh entrypoint layers the guardrails in a fixed order:
/// authentication, verification, rate limit, per-user lock, profile
/// readiness, then the orchestrator run. The lock is released on every
/// exit path past acquisition; a crash is covered by the lock TTL.
use actix_web::{web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::concurrency::RateLimitDecision;
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::models::{Suggestion, SuggestionStatus};
use crate::services::diagnostics::{summarize, Diagnostic};

use super::AppState;

fn default_group_size() -> u32 {
    2
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default = "default_group_size")]
    pub group_size: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub run_id: String,
    pub created: u64,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// POST /match/suggestions/refresh
pub async fn refresh_suggestions(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    body: Option<web::Json<RefreshRequest>>,
) -> Result<HttpResponse> {
    if !user.email_verified {
        return Err(AppError::VerificationRequired);
    }

    let user_key = user.user_id.to_string();
    let group_size = body.map(|b| b.group_size).unwrap_or(2);

    // Rate limit before the lock: a throttled caller must not consume
    // (or block on) the lock at all.
    let decision = state.rate_limiter.check(&user_key).await?;
    if !decision.allowed {
        let mut response = AppError::RateLimited {
            retry_after: decision.retry_after,
        }
        .error_response();
        append_rate_limit_headers(&mut response, state.rate_limiter.max_requests(), &decision);
        return Ok(response);
    }

    let guard = state.lock.acquire(&user_key).await?;
    if !guard.acquired {
        return Err(AppError::LockContention {
            retry_after: guard.retry_after,
        });
    }

    let run_id = Uuid::new_v4().to_string();
    info!(user_id = %user.user_id, run_id, "Starting suggestion refresh");

    let outcome = state
        .orchestrator
        .run(user.user_id, &run_id, group_size)
        .await;

    // Release before inspecting the result so failed runs do not pin
    // the lock until the TTL expires.
    state.lock.release(&user_key).await;
    let outcome = outcome?;

    let message = outcome.diagnostic.as_ref().map(summarize);
    let mut response = HttpResponse::Ok().json(RefreshResponse {
        run_id,
        created: outcome.created,
        suggestions: outcome.suggestions,
        message,
        diagnostic: outcome.diagnostic,
    });
    append_rate_limit_headers(&mut response, state.rate_limiter.max_requests(), &decision);

    Ok(response)
}

/// GET /match/suggestions — the caller's non-expired suggestions,
/// best score first.
pub async fn get_suggestions(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let suggestions = state.suggestions.list_for_user(user.user_id, false).await?;
    Ok(HttpResponse::Ok().json(suggestions))
}

/// POST /match/suggestions/{id}/accept — mark one of the caller's own
/// suggestions as accepted.
pub async fn accept_suggestion(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let suggestion_id = path.into_inner();

    // Membership check doubles as the existence check: a suggestion
    // the caller is not part of looks like a missing one.
    let mine = state.suggestions.list_for_user(user.user_id, false).await?;
    if !mine.iter().any(|s| s.id == suggestion_id) {
        return Err(AppError::NotFound(format!("suggestion {}", suggestion_id)));
    }

    state
        .suggestions
        .update_status(suggestion_id, SuggestionStatus::Accepted)
        .await?;

    info!(user_id = %user.user_id, %suggestion_id, "Suggestion accepted");
    Ok(HttpResponse::Ok().finish())
}

fn append_rate_limit_headers(response: &mut HttpResponse, limit: u32, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = limit.to_string().parse() {
        headers.insert(
            actix_web::http::header::HeaderName::from_static("x-ratelimit-limit"),
            value,
        );
    }
    if let Ok(value) = decision.remaining.to_string().parse() {
        headers.insert(
            actix_web::http::header::HeaderName::from_static("x-ratelimit-remaining"),
            value,
        );
    }
    if let Ok(value) = decision.reset_at.to_string().parse() {
        headers.insert(
            actix_web::http::header::HeaderName::from_static("x-ratelimit-reset"),
            value,
        );
    }
}
