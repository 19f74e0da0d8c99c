/// Bearer-token authentication extractor.
/// Validates the JWT and exposes the caller's id and verification
/// status to handlers.
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    #[serde(default)]
    pub email_verified: bool,
    pub exp: usize,
}

/// The authenticated caller, extracted from a `Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email_verified: bool,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(extract_user(req))
    }
}

fn extract_user(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let jwt_config = req
        .app_data::<web::Data<JwtConfig>>()
        .ok_or_else(|| AppError::Internal("JWT config not registered".to_string()))?;

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::AuthRequired)?;

    let token = header.strip_prefix("Bearer ").ok_or(AppError::AuthRequired)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Token validation failed: {}", e);
        AppError::AuthRequired
    })?;

    let user_id = Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::AuthRequired)?;

    Ok(AuthenticatedUser {
        user_id,
        email_verified: token_data.claims.email_verified,
    })
}
