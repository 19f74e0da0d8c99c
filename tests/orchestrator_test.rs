/// End-to-end orchestrator runs against in-memory repositories.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use matching_service::config::{OrchestratorConfig, ScoringConfig};
use matching_service::db::{CandidateRepository, SuggestionStore};
use matching_service::error::{AppError, Result};
use matching_service::models::{
    pair_key, Candidate, CohortFilter, DegreeLevel, Dimension, HardConstraints, PairScore,
    Suggestion, SuggestionStatus,
};
use matching_service::services::diagnostics::DiagnosticReason;
use matching_service::services::{SuggestionOrchestrator, VectorEnsurer};

struct InMemoryCandidates {
    candidates: Vec<Candidate>,
    active_pairs: Vec<(Uuid, Uuid)>,
}

#[async_trait]
impl CandidateRepository for InMemoryCandidates {
    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Option<Candidate>> {
        Ok(self
            .candidates
            .iter()
            .find(|c| c.user_id == user_id)
            .cloned())
    }

    async fn load_cohort(&self, filter: &CohortFilter) -> Result<Vec<Candidate>> {
        let mut rows: Vec<Candidate> = self
            .candidates
            .iter()
            .filter(|c| self.matches(c, filter, true))
            .cloned()
            .collect();
        rows.truncate(filter.limit());
        Ok(rows)
    }

    async fn count_cohort(&self, filter: &CohortFilter) -> Result<u64> {
        Ok(self
            .candidates
            .iter()
            .filter(|c| self.matches(c, filter, false))
            .count() as u64)
    }

    async fn count_active(&self) -> Result<u64> {
        Ok(self.candidates.iter().filter(|c| c.active).count() as u64)
    }
}

impl InMemoryCandidates {
    fn matches(&self, c: &Candidate, filter: &CohortFilter, check_pairs: bool) -> bool {
        if c.degree_level != filter.degree_level {
            return false;
        }
        if let Some(city) = &filter.campus_city {
            if c.campus_city.as_ref() != Some(city) {
                return false;
            }
        }
        if filter.only_active && !c.active {
            return false;
        }
        if filter.exclude_user_ids.contains(&c.user_id) {
            return false;
        }
        if check_pairs && filter.exclude_already_matched {
            for excluded in &filter.exclude_user_ids {
                let key = pair_key(c.user_id, *excluded);
                if self.active_pairs.contains(&key) {
                    return false;
                }
            }
        }
        true
    }
}

#[derive(Default)]
struct InMemorySuggestions {
    rows: Mutex<Vec<Suggestion>>,
}

#[async_trait]
impl SuggestionStore for InMemorySuggestions {
    async fn insert_batch(&self, suggestions: &[Suggestion]) -> Result<Vec<Suggestion>> {
        let mut rows = self.rows.lock().unwrap();

        // Lazy expiry of stale pending rows, as the Postgres store does.
        let now = Utc::now();
        for row in rows.iter_mut() {
            if row.status == SuggestionStatus::Pending && row.expires_at <= now {
                row.status = SuggestionStatus::Expired;
            }
        }

        let mut created = Vec::new();
        for suggestion in suggestions {
            let key = pair_key(suggestion.member_ids[0], suggestion.member_ids[1]);
            let duplicate = rows.iter().any(|existing: &Suggestion| {
                existing.status != SuggestionStatus::Expired
                    && pair_key(existing.member_ids[0], existing.member_ids[1]) == key
            });
            if !duplicate {
                rows.push(suggestion.clone());
                created.push(suggestion.clone());
            }
        }
        Ok(created)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        include_expired: bool,
    ) -> Result<Vec<Suggestion>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                s.member_ids.contains(&user_id)
                    && (include_expired || s.status != SuggestionStatus::Expired)
            })
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: Uuid, status: SuggestionStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|s| s.id == id) {
            row.status = status;
        }
        Ok(())
    }
}

/// Vector service stand-in: acknowledges every request but generates
/// nothing, so vectorless candidates stay vectorless.
struct NoopVectors;

#[async_trait]
impl VectorEnsurer for NoopVectors {
    async fn ensure_vector(&self, _user_id: Uuid) -> Result<()> {
        Ok(())
    }
}

fn scoring_config() -> ScoringConfig {
    ScoringConfig {
        harmony_weight: 0.6,
        context_weight: 0.4,
        same_city_bonus: 0.08,
        same_institution_bonus: 0.05,
    }
}

fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        min_viability: 0.30,
        top_n: 10,
        cohort_limit: 500,
        expiry_hours: 168,
    }
}

fn candidate(city: &str, value: f64) -> Candidate {
    let vector: HashMap<Dimension, f64> = Dimension::ALL.iter().map(|d| (*d, value)).collect();
    Candidate {
        user_id: Uuid::new_v4(),
        degree_level: DegreeLevel::Bachelor,
        campus_city: Some(city.to_string()),
        institution_id: None,
        programme_id: None,
        vector: Some(vector),
        constraints: HardConstraints::default(),
        active: true,
    }
}

fn build(
    candidates: Vec<Candidate>,
    active_pairs: Vec<(Uuid, Uuid)>,
) -> (SuggestionOrchestrator, Arc<InMemorySuggestions>) {
    let store = Arc::new(InMemorySuggestions::default());
    let orchestrator = SuggestionOrchestrator::new(
        Arc::new(InMemoryCandidates {
            candidates,
            active_pairs,
        }),
        store.clone(),
        Arc::new(NoopVectors),
        scoring_config(),
        orchestrator_config(),
    );
    (orchestrator, store)
}

#[tokio::test]
async fn compatible_cohort_produces_ranked_suggestions() {
    let requester = candidate("Utrecht", 7.0);
    let close = candidate("Utrecht", 7.0);
    let further = candidate("Utrecht", 4.0);

    let (orchestrator, store) = build(
        vec![requester.clone(), close.clone(), further.clone()],
        vec![],
    );

    let outcome = orchestrator
        .run(requester.user_id, "run-1", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 2);
    assert_eq!(outcome.suggestions.len(), 2);
    assert!(outcome.diagnostic.is_none());

    // Ranked best first, every survivor above the viability threshold.
    assert!(outcome.suggestions[0].score.overall >= outcome.suggestions[1].score.overall);
    for suggestion in &outcome.suggestions {
        assert!(suggestion.score.overall >= 0.30);
        assert_eq!(suggestion.run_id, "run-1");
        assert!(suggestion.member_ids.contains(&requester.user_id));
    }

    // The best match is the identical profile.
    let best = &outcome.suggestions[0];
    assert!(best.member_ids.contains(&close.user_id));

    let persisted = store
        .list_for_user(requester.user_id, false)
        .await
        .unwrap();
    assert_eq!(persisted.len(), 2);
}

#[tokio::test]
async fn top_n_caps_persisted_suggestions() {
    let requester = candidate("Utrecht", 5.0);
    let mut pool = vec![requester.clone()];
    for _ in 0..15 {
        pool.push(candidate("Utrecht", 5.0));
    }

    let (orchestrator, _) = build(pool, vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-top-n", 2)
        .await
        .unwrap();

    assert_eq!(outcome.suggestions.len(), 10);
    assert_eq!(outcome.created, 10);
}

#[tokio::test]
async fn city_mismatch_yields_diagnostic_with_elsewhere_count() {
    // Scenario: requester alone in their city, same degree level
    // candidates exist in another city.
    let requester = candidate("Groningen", 6.0);
    let elsewhere_a = candidate("Utrecht", 6.0);
    let elsewhere_b = candidate("Utrecht", 6.0);

    let (orchestrator, _) = build(vec![requester.clone(), elsewhere_a, elsewhere_b], vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-city", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 0);
    assert!(outcome.suggestions.is_empty());

    let diagnostic = outcome.diagnostic.expect("zero results must carry a diagnostic");
    assert!(diagnostic.possible_reasons.iter().any(|r| matches!(
        r,
        DiagnosticReason::NoCandidatesInCity {
            same_level_elsewhere: 2
        }
    )));
}

#[tokio::test]
async fn deal_breaker_block_is_counted_in_diagnostic() {
    // Scenario: one perfectly compatible candidate, blocked by smoking.
    let mut requester = candidate("Utrecht", 6.0);
    requester.constraints.requires_non_smoker = true;
    let mut smoker = candidate("Utrecht", 6.0);
    smoker.constraints.smoker = true;

    let (orchestrator, _) = build(vec![requester.clone(), smoker], vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-smoke", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 0);
    let diagnostic = outcome.diagnostic.unwrap();
    let blocked = diagnostic
        .possible_reasons
        .iter()
        .find_map(|r| match r {
            DiagnosticReason::AllBlockedByDealBreakers { total, top } => Some((*total, top)),
            _ => None,
        })
        .expect("expected deal-breaker diagnostic");
    assert_eq!(blocked.0, 1);
    assert_eq!(blocked.1[0].count, 1);
}

#[tokio::test]
async fn vectorless_candidates_are_skipped_and_counted() {
    let requester = candidate("Utrecht", 6.0);
    let mut unvectored = candidate("Utrecht", 6.0);
    unvectored.vector = None;

    let (orchestrator, _) = build(vec![requester.clone(), unvectored], vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-vec", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 0);
    let diagnostic = outcome.diagnostic.unwrap();
    assert!(diagnostic
        .possible_reasons
        .iter()
        .any(|r| matches!(r, DiagnosticReason::MissingVectors { count: 1 })));
}

#[tokio::test]
async fn requester_without_vector_is_profile_incomplete() {
    let mut requester = candidate("Utrecht", 6.0);
    requester.vector = None;
    let other = candidate("Utrecht", 6.0);

    let (orchestrator, _) = build(vec![requester.clone(), other], vec![]);
    let err = orchestrator
        .run(requester.user_id, "run-incomplete", 2)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ProfileIncomplete(_)));
}

#[tokio::test]
async fn below_threshold_pairs_are_dropped_with_stats() {
    // Opposite ends of every scale in different cities: overall 0.
    let requester = candidate("Utrecht", 0.0);
    let mut opposite = candidate("Utrecht", 10.0);
    opposite.campus_city = Some("Utrecht".to_string());

    let (orchestrator, _) = build(vec![requester.clone(), opposite], vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-threshold", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 0);
    let diagnostic = outcome.diagnostic.unwrap();
    assert!(diagnostic
        .possible_reasons
        .iter()
        .any(|r| matches!(r, DiagnosticReason::BelowThreshold { count: 1, .. })));
}

#[tokio::test]
async fn already_matched_pair_is_not_suggested_again() {
    let requester = candidate("Utrecht", 6.0);
    let partner = candidate("Utrecht", 6.0);
    let fresh = candidate("Utrecht", 6.0);

    let (orchestrator, _) = build(
        vec![requester.clone(), partner.clone(), fresh.clone()],
        vec![pair_key(requester.user_id, partner.user_id)],
    );

    let outcome = orchestrator
        .run(requester.user_id, "run-rematch", 2)
        .await
        .unwrap();

    assert_eq!(outcome.created, 1);
    assert!(outcome.suggestions[0].member_ids.contains(&fresh.user_id));
    assert!(!outcome
        .suggestions
        .iter()
        .any(|s| s.member_ids.contains(&partner.user_id)));
}

#[tokio::test]
async fn group_size_other_than_two_is_rejected() {
    let requester = candidate("Utrecht", 6.0);
    let (orchestrator, _) = build(vec![requester.clone()], vec![]);

    let err = orchestrator
        .run(requester.user_id, "run-group", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn accepted_suggestion_keeps_its_pair_reserved() {
    let requester = candidate("Utrecht", 6.0);
    let partner = candidate("Utrecht", 6.0);

    let (orchestrator, store) = build(vec![requester.clone(), partner.clone()], vec![]);
    let outcome = orchestrator
        .run(requester.user_id, "run-accept", 2)
        .await
        .unwrap();
    assert_eq!(outcome.created, 1);

    let suggestion = &outcome.suggestions[0];
    store
        .update_status(suggestion.id, SuggestionStatus::Accepted)
        .await
        .unwrap();

    // Accepted is still active: a re-run must not recreate the pair.
    let listed = store
        .list_for_user(requester.user_id, false)
        .await
        .unwrap();
    assert_eq!(listed[0].status, SuggestionStatus::Accepted);
    assert!(store
        .insert_batch(&[suggestion.clone()])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn aged_out_pending_pair_is_expired_and_resuggested() {
    let requester = candidate("Utrecht", 6.0);
    let partner = candidate("Utrecht", 6.0);
    let (orchestrator, store) = build(vec![requester.clone(), partner.clone()], vec![]);

    // A pending suggestion for the same pair that aged past its expiry
    // without ever being responded to.
    let (member_a, member_b) = pair_key(requester.user_id, partner.user_id);
    let stale_id = Uuid::new_v4();
    store.rows.lock().unwrap().push(Suggestion {
        id: stale_id,
        run_id: "run-old".to_string(),
        member_ids: vec![member_a, member_b],
        score: PairScore {
            members: (member_a, member_b),
            dimension_scores: HashMap::new(),
            harmony: 0.9,
            context: 0.9,
            overall: 0.9,
        },
        status: SuggestionStatus::Pending,
        created_at: Utc::now() - Duration::hours(200),
        expires_at: Utc::now() - Duration::hours(32),
    });

    let outcome = orchestrator
        .run(requester.user_id, "run-again", 2)
        .await
        .unwrap();

    // The stale row no longer reserves the pair, and everything the
    // response advertises was actually persisted.
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.suggestions.len() as u64, outcome.created);
    assert!(outcome.diagnostic.is_none());

    let rows = store.rows.lock().unwrap();
    assert!(rows
        .iter()
        .any(|s| s.id == stale_id && s.status == SuggestionStatus::Expired));
    assert!(rows.iter().any(|s| s.id == outcome.suggestions[0].id));
}

#[tokio::test]
async fn unknown_requester_is_not_found() {
    let (orchestrator, _) = build(vec![], vec![]);
    let err = orchestrator
        .run(Uuid::new_v4(), "run-missing", 2)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
