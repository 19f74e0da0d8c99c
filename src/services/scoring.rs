/// Compatibility Scoring
///
/// Computes per-dimension similarities and the harmony/context/overall
/// aggregates for a candidate pair. The hard contract is symmetry and
/// [0,1] range on every component; the exact distance function and
/// blend weights come from configuration.
use std::collections::HashMap;

use crate::config::ScoringConfig;
use crate::models::{pair_key, Candidate, Dimension, PairScore};

/// Scale midpoint used when a single dimension is absent from an
/// otherwise-present vector. Keeps symmetry trivially intact.
const MIDPOINT: f64 = 5.0;

pub struct CompatibilityScorer {
    config: ScoringConfig,
}

impl CompatibilityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a pair of candidates. Both candidates must carry a vector;
    /// callers are expected to have run the vector ensurer first.
    ///
    /// Returns `None` when either vector is missing ("insufficient
    /// data") rather than guessing a score.
    pub fn score(&self, a: &Candidate, b: &Candidate) -> Option<PairScore> {
        let vec_a = a.vector.as_ref()?;
        let vec_b = b.vector.as_ref()?;

        let mut dimension_scores = HashMap::with_capacity(Dimension::ALL.len());
        for dim in Dimension::ALL {
            dimension_scores.insert(dim, Self::dimension_similarity(dim, vec_a, vec_b));
        }

        let harmony = mean_over(&dimension_scores, &Dimension::HARMONY);
        let context_base = mean_over(&dimension_scores, &Dimension::CONTEXT);

        let mut bonus = 0.0;
        if let (Some(city_a), Some(city_b)) = (&a.campus_city, &b.campus_city) {
            if city_a == city_b {
                bonus += self.config.same_city_bonus;
            }
        }
        if let (Some(inst_a), Some(inst_b)) = (a.institution_id, b.institution_id) {
            if inst_a == inst_b {
                bonus += self.config.same_institution_bonus;
            }
        }
        let context = clamp01(context_base + bonus);

        let overall = clamp01(
            self.config.harmony_weight * harmony + self.config.context_weight * context,
        );

        Some(PairScore {
            members: pair_key(a.user_id, b.user_id),
            dimension_scores,
            harmony: clamp01(harmony),
            context,
            overall,
        })
    }

    /// Normalized similarity on one dimension: `1 - |a - b| / range`,
    /// clamped. Missing values are scored at the scale midpoint.
    fn dimension_similarity(
        dim: Dimension,
        vec_a: &HashMap<Dimension, f64>,
        vec_b: &HashMap<Dimension, f64>,
    ) -> f64 {
        let a = vec_a.get(&dim).copied().unwrap_or(MIDPOINT);
        let b = vec_b.get(&dim).copied().unwrap_or(MIDPOINT);
        clamp01(1.0 - (a - b).abs() / dim.range())
    }
}

/// Ranking order for scored pairs: overall descending, equal overall
/// broken by higher context.
pub fn rank_order(a: &PairScore, b: &PairScore) -> std::cmp::Ordering {
    b.overall
        .partial_cmp(&a.overall)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then(
            b.context
                .partial_cmp(&a.context)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
}

fn mean_over(scores: &HashMap<Dimension, f64>, dims: &[Dimension]) -> f64 {
    let sum: f64 = dims.iter().filter_map(|d| scores.get(d)).sum();
    sum / dims.len() as f64
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
