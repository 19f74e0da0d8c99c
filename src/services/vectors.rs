use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::VectorServiceConfig;
use crate::error::{AppError, Result};

/// Client for the questionnaire-vector service.
///
/// Vector generation is idempotent on the service side (keyed by user
/// id), so repeated calls for the same user are safe. Callers decide
/// how fatal a failure is: the refresh flow treats the requester's
/// vector as mandatory and a candidate's as best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorEnsurer: Send + Sync {
    /// Request vector generation for a user. Returns Ok(()) once the
    /// service has acknowledged the vector exists.
    async fn ensure_vector(&self, user_id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct HttpVectorEnsurer {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateVectorRequest {
    user_id: Uuid,
}

#[derive(Deserialize)]
struct GenerateVectorResponse {
    generated: bool,
}

impl HttpVectorEnsurer {
    pub fn new(config: &VectorServiceConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorEnsurer for HttpVectorEnsurer {
    async fn ensure_vector(&self, user_id: Uuid) -> Result<()> {
        let url = format!("{}/internal/vectors/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&GenerateVectorRequest { user_id })
            .send()
            .await
            .map_err(|e| {
                warn!(%user_id, "Vector service request failed: {}", e);
                AppError::VectorGenerationFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%user_id, %status, "Vector service returned error: {}", body);
            return Err(AppError::VectorGenerationFailed(format!(
                "vector service returned {}",
                status
            )));
        }

        let parsed: GenerateVectorResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorGenerationFailed(e.to_string()))?;

        if parsed.generated {
            info!(%user_id, "Generated questionnaire vector");
        }

        Ok(())
    }
}
