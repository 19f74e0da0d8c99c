use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{OrchestratorConfig, ScoringConfig};
use crate::db::{CandidateRepository, SuggestionStore};
use crate::error::{AppError, Result};
use crate::models::{Candidate, CohortFilter, Suggestion, SuggestionStatus};
use crate::services::completeness::{MissingField, ProfileCompletenessChecker};
use crate::services::dealbreakers::DealBreakerFilter;
use crate::services::diagnostics::{Diagnostic, DiagnosticReporter, RunStats};
use crate::services::scoring::{rank_order, CompatibilityScorer};
use crate::services::vectors::VectorEnsurer;

/// Result of one refresh run. `diagnostic` is populated only when the
/// run produced zero suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub created: u64,
    pub suggestions: Vec<Suggestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

/// Drives one suggestion refresh end to end: requester readiness,
/// cohort assembly, deal-breaker filtering, scoring, ranking,
/// persistence, and the zero-result diagnostic.
pub struct SuggestionOrchestrator {
    candidates: Arc<dyn CandidateRepository>,
    suggestions: Arc<dyn SuggestionStore>,
    vectors: Arc<dyn VectorEnsurer>,
    scorer: CompatibilityScorer,
    reporter: DiagnosticReporter,
    config: OrchestratorConfig,
}

impl SuggestionOrchestrator {
    pub fn new(
        candidates: Arc<dyn CandidateRepository>,
        suggestions: Arc<dyn SuggestionStore>,
        vectors: Arc<dyn VectorEnsurer>,
        scoring_config: ScoringConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let reporter = DiagnosticReporter::new(candidates.clone());
        Self {
            candidates,
            suggestions,
            vectors,
            scorer: CompatibilityScorer::new(scoring_config),
            reporter,
            config,
        }
    }

    /// Run a refresh for one requester. Callers must already hold the
    /// per-user refresh lock.
    pub async fn run(
        &self,
        requester_id: Uuid,
        run_id: &str,
        group_size: u32,
    ) -> Result<RefreshOutcome> {
        // Pair matching only. The aggregation formula for larger groups
        // is undefined, so anything else is rejected outright.
        if group_size != 2 {
            return Err(AppError::Validation(format!(
                "unsupported group size {}, only pair matching is available",
                group_size
            )));
        }

        let requester = self.ready_requester(requester_id).await?;

        let filter = CohortFilter::new(
            requester.degree_level,
            requester.campus_city.clone(),
            self.config.cohort_limit,
        )
        .exclude(requester_id);

        let cohort = self.candidates.load_cohort(&filter).await?;
        let mut stats = RunStats {
            cohort_size: cohort.len() as u64,
            ..Default::default()
        };

        info!(
            %requester_id,
            run_id,
            cohort_size = cohort.len(),
            "Assembled candidate cohort"
        );

        let mut scored = Vec::new();
        for candidate in cohort {
            let candidate = self.with_vector(candidate).await;
            if !candidate.has_vector() {
                stats.missing_vectors += 1;
                continue;
            }

            let verdict = DealBreakerFilter::evaluate(&requester, &candidate);
            if verdict.blocked {
                stats.record_block(&verdict.reasons);
                continue;
            }

            // None cannot happen past the vector check above, but a
            // missing score is still data insufficiency, not a zero.
            let Some(score) = self.scorer.score(&requester, &candidate) else {
                stats.missing_vectors += 1;
                continue;
            };

            if score.overall < self.config.min_viability {
                stats.record_below_threshold(score.overall);
                continue;
            }

            scored.push(score);
        }

        scored.sort_by(rank_order);
        scored.truncate(self.config.top_n);

        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.expiry_hours);
        let suggestions: Vec<Suggestion> = scored
            .into_iter()
            .map(|score| Suggestion {
                id: Uuid::new_v4(),
                run_id: run_id.to_string(),
                member_ids: vec![score.members.0, score.members.1],
                score,
                status: SuggestionStatus::Pending,
                created_at: now,
                expires_at,
            })
            .collect();

        // The response only ever advertises rows the store actually
        // persisted; a pair skipped by the uniqueness invariant is not
        // a suggestion the caller can act on.
        let suggestions = if suggestions.is_empty() {
            suggestions
        } else {
            self.suggestions.insert_batch(&suggestions).await?
        };
        let created = suggestions.len() as u64;

        let diagnostic = if suggestions.is_empty() {
            Some(self.reporter.explain(&filter, &stats).await?)
        } else {
            None
        };

        info!(
            %requester_id,
            run_id,
            created,
            blocked = stats.blocked_pairs,
            below_threshold = stats.below_threshold,
            missing_vectors = stats.missing_vectors,
            "Refresh run complete"
        );

        Ok(RefreshOutcome {
            created,
            suggestions,
            diagnostic,
        })
    }

    /// Load the requester and verify matching can run for them. A
    /// missing vector gets one generation attempt before failing.
    async fn ready_requester(&self, requester_id: Uuid) -> Result<Candidate> {
        let requester = self
            .candidates
            .get_by_user_id(requester_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("candidate profile {}", requester_id)))?;

        let missing = ProfileCompletenessChecker::missing(&requester);
        let non_vector: Vec<MissingField> = missing
            .iter()
            .copied()
            .filter(|f| *f != MissingField::QuestionnaireVector)
            .collect();
        if !non_vector.is_empty() {
            return Err(AppError::ProfileIncomplete(non_vector));
        }

        if requester.has_vector() {
            return Ok(requester);
        }

        // For the requester the vector is mandatory: generate, re-fetch,
        // and give up with a typed error if it still is not there.
        self.vectors
            .ensure_vector(requester_id)
            .await
            .map_err(|e| {
                warn!(%requester_id, "Requester vector generation failed: {}", e);
                AppError::ProfileIncomplete(vec![MissingField::QuestionnaireVector])
            })?;

        let refreshed = self
            .candidates
            .get_by_user_id(requester_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("candidate profile {}", requester_id)))?;

        if refreshed.has_vector() {
            Ok(refreshed)
        } else {
            Err(AppError::ProfileIncomplete(vec![
                MissingField::QuestionnaireVector,
            ]))
        }
    }

    /// Best-effort vector generation for a cohort member. Failures are
    /// logged and the candidate is returned unchanged; the caller skips
    /// vectorless candidates.
    async fn with_vector(&self, candidate: Candidate) -> Candidate {
        if candidate.has_vector() {
            return candidate;
        }

        if let Err(e) = self.vectors.ensure_vector(candidate.user_id).await {
            warn!(user_id = %candidate.user_id, "Candidate vector generation failed: {}", e);
            return candidate;
        }

        match self.candidates.get_by_user_id(candidate.user_id).await {
            Ok(Some(refreshed)) => refreshed,
            Ok(None) => candidate,
            Err(e) => {
                warn!(user_id = %candidate.user_id, "Candidate re-fetch failed: {}", e);
                candidate
            }
        }
    }
}
