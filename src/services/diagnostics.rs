use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::CandidateRepository;
use crate::error::Result;
use crate::models::CohortFilter;
use crate::services::dealbreakers::DealBreakerReason;

/// Why a refresh produced zero suggestions.
///
/// Reasons are advisory: they shape the message shown to the user and
/// never block the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum DiagnosticReason {
    /// Nobody matched the city filter; `same_level_elsewhere` is how
    /// many same-degree-level candidates exist in other cities.
    NoCandidatesInCity { same_level_elsewhere: u64 },
    /// Every scored pair was vetoed by a hard constraint.
    AllBlockedByDealBreakers {
        total: u64,
        top: Vec<BlockedReasonCount>,
    },
    /// Pairs scored, but none reached the viability threshold.
    BelowThreshold { count: u64, avg_score: f64 },
    /// Candidates were skipped because their questionnaire vector has
    /// not been generated yet.
    MissingVectors { count: u64 },
    /// Nobody matched the filter at all.
    EmptyCohort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedReasonCount {
    pub reason: DealBreakerReason,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub possible_reasons: Vec<DiagnosticReason>,
    /// Cohort size under the full filter.
    pub cohort_size: u64,
    /// Cohort size with the city constraint removed.
    pub cohort_size_ignoring_city: u64,
    /// Total active candidates in the pool, any filter.
    pub active_candidates: u64,
}

/// Counters the orchestrator accumulates during one run, consumed here
/// when the run ends with zero suggestions.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub cohort_size: u64,
    pub missing_vectors: u64,
    pub blocked_pairs: u64,
    pub block_reasons: HashMap<DealBreakerReason, u64>,
    pub below_threshold: u64,
    pub below_threshold_score_sum: f64,
}

impl RunStats {
    pub fn record_block(&mut self, reasons: &[DealBreakerReason]) {
        self.blocked_pairs += 1;
        for reason in reasons {
            *self.block_reasons.entry(reason.clone()).or_insert(0) += 1;
        }
    }

    pub fn record_below_threshold(&mut self, overall: f64) {
        self.below_threshold += 1;
        self.below_threshold_score_sum += overall;
    }
}

pub struct DiagnosticReporter {
    candidates: Arc<dyn CandidateRepository>,
}

impl DiagnosticReporter {
    pub fn new(candidates: Arc<dyn CandidateRepository>) -> Self {
        Self { candidates }
    }

    /// Explain a zero-result run. Relaxed-filter counts come from extra
    /// read-only queries; a failing count degrades to zero rather than
    /// failing the run.
    pub async fn explain(&self, filter: &CohortFilter, stats: &RunStats) -> Result<Diagnostic> {
        let cohort_size = stats.cohort_size;
        let cohort_ignoring_city = if filter.campus_city.is_some() {
            self.count_or_zero(&filter.ignoring_city()).await
        } else {
            cohort_size
        };
        let active_candidates = match self.candidates.count_active().await {
            Ok(n) => n,
            Err(e) => {
                warn!("Active-candidate count failed during diagnostics: {}", e);
                0
            }
        };

        let mut possible_reasons = Vec::new();

        if cohort_size == 0 {
            if filter.campus_city.is_some() && cohort_ignoring_city > 0 {
                possible_reasons.push(DiagnosticReason::NoCandidatesInCity {
                    same_level_elsewhere: cohort_ignoring_city,
                });
            } else {
                possible_reasons.push(DiagnosticReason::EmptyCohort);
            }
        }

        if stats.missing_vectors > 0 {
            possible_reasons.push(DiagnosticReason::MissingVectors {
                count: stats.missing_vectors,
            });
        }

        if stats.blocked_pairs > 0 {
            let mut top: Vec<BlockedReasonCount> = stats
                .block_reasons
                .iter()
                .map(|(reason, count)| BlockedReasonCount {
                    reason: reason.clone(),
                    count: *count,
                })
                .collect();
            top.sort_by(|a, b| b.count.cmp(&a.count).then(a.reason.label().cmp(&b.reason.label())));
            top.truncate(3);

            possible_reasons.push(DiagnosticReason::AllBlockedByDealBreakers {
                total: stats.blocked_pairs,
                top,
            });
        }

        if stats.below_threshold > 0 {
            possible_reasons.push(DiagnosticReason::BelowThreshold {
                count: stats.below_threshold,
                avg_score: stats.below_threshold_score_sum / stats.below_threshold as f64,
            });
        }

        Ok(Diagnostic {
            possible_reasons,
            cohort_size,
            cohort_size_ignoring_city: cohort_ignoring_city,
            active_candidates,
        })
    }

    async fn count_or_zero(&self, filter: &CohortFilter) -> u64 {
        match self.candidates.count_cohort(filter).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Relaxed cohort count failed during diagnostics: {}", e);
                0
            }
        }
    }
}

/// Short human-readable summary of a diagnostic, used for the
/// `message` field of a zero-result response.
pub fn summarize(diagnostic: &Diagnostic) -> String {
    let first = diagnostic.possible_reasons.first();
    match first {
        Some(DiagnosticReason::NoCandidatesInCity {
            same_level_elsewhere,
        }) => format!(
            "No candidates found in your city yet; {} candidates at your degree level exist elsewhere.",
            same_level_elsewhere
        ),
        Some(DiagnosticReason::AllBlockedByDealBreakers { total, .. }) => format!(
            "All {} candidate pairings conflicted with a hard constraint.",
            total
        ),
        Some(DiagnosticReason::BelowThreshold { count, .. }) => format!(
            "{} candidates were considered but none reached the compatibility threshold.",
            count
        ),
        Some(DiagnosticReason::MissingVectors { count }) => format!(
            "{} candidates have not completed the questionnaire yet.",
            count
        ),
        Some(DiagnosticReason::EmptyCohort) | None => {
            "No eligible candidates found for your filters yet.".to_string()
        }
    }
}
