/// Deal-breaker filtering
///
/// Hard constraints are evaluated bidirectionally: a violation by
/// either party blocks the pair regardless of score. Verdicts are
/// deterministic for identical inputs and carry typed reason codes
/// consumed by the diagnostic reporter.
use serde::{Deserialize, Serialize};

use crate::models::{Candidate, GenderPreference, HardConstraints};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "flag")]
pub enum DealBreakerReason {
    Smoking,
    Pets,
    GenderPreference,
    Substances,
    /// A named onboarding "must not" flag declared by one side and
    /// forbidden by the other.
    Flag(String),
}

impl DealBreakerReason {
    pub fn label(&self) -> String {
        match self {
            DealBreakerReason::Smoking => "smoking".to_string(),
            DealBreakerReason::Pets => "pets".to_string(),
            DealBreakerReason::GenderPreference => "gender_preference".to_string(),
            DealBreakerReason::Substances => "substances".to_string(),
            DealBreakerReason::Flag(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DealBreakerVerdict {
    pub blocked: bool,
    pub reasons: Vec<DealBreakerReason>,
}

pub struct DealBreakerFilter;

impl DealBreakerFilter {
    /// Evaluate both directions of every hard constraint. A pair can
    /// carry multiple reasons.
    pub fn evaluate(a: &Candidate, b: &Candidate) -> DealBreakerVerdict {
        let ca = &a.constraints;
        let cb = &b.constraints;
        let mut reasons = Vec::new();

        if (ca.requires_non_smoker && cb.smoker) || (cb.requires_non_smoker && ca.smoker) {
            reasons.push(DealBreakerReason::Smoking);
        }

        if (ca.pet_allergy && cb.has_pets) || (cb.pet_allergy && ca.has_pets) {
            reasons.push(DealBreakerReason::Pets);
        }

        if gender_mismatch(ca, cb) || gender_mismatch(cb, ca) {
            reasons.push(DealBreakerReason::GenderPreference);
        }

        if (ca.requires_substance_free && cb.uses_substances_at_home)
            || (cb.requires_substance_free && ca.uses_substances_at_home)
        {
            reasons.push(DealBreakerReason::Substances);
        }

        let mut flag_conflicts: Vec<&String> = ca
            .forbidden_flags
            .intersection(&cb.declared_flags)
            .chain(cb.forbidden_flags.intersection(&ca.declared_flags))
            .collect();
        flag_conflicts.sort();
        flag_conflicts.dedup();
        reasons.extend(
            flag_conflicts
                .into_iter()
                .map(|name| DealBreakerReason::Flag(name.clone())),
        );

        DealBreakerVerdict {
            blocked: !reasons.is_empty(),
            reasons,
        }
    }
}

/// `holder` insists on a same-gender roommate and `other` does not
/// match, or other's gender is undeclared.
fn gender_mismatch(holder: &HardConstraints, other: &HardConstraints) -> bool {
    match holder.gender_preference {
        Some(GenderPreference::SameGenderOnly) => match (holder.gender, other.gender) {
            (Some(g1), Some(g2)) => g1 != g2,
            _ => true,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DegreeLevel, Gender};
    use uuid::Uuid;

    fn candidate(constraints: HardConstraints) -> Candidate {
        Candidate {
            user_id: Uuid::new_v4(),
            degree_level: DegreeLevel::Bachelor,
            campus_city: Some("Amsterdam".to_string()),
            institution_id: None,
            programme_id: None,
            vector: Some(Default::default()),
            constraints,
            active: true,
        }
    }

    #[test]
    fn smoker_blocks_non_smoker_requirement_both_directions() {
        let smoker = candidate(HardConstraints {
            smoker: true,
            ..Default::default()
        });
        let strict = candidate(HardConstraints {
            requires_non_smoker: true,
            ..Default::default()
        });

        let verdict = DealBreakerFilter::evaluate(&smoker, &strict);
        assert!(verdict.blocked);
        assert_eq!(verdict.reasons, vec![DealBreakerReason::Smoking]);

        let reversed = DealBreakerFilter::evaluate(&strict, &smoker);
        assert_eq!(reversed.reasons, verdict.reasons);
    }

    #[test]
    fn pet_allergy_blocks_pet_owner() {
        let owner = candidate(HardConstraints {
            has_pets: true,
            ..Default::default()
        });
        let allergic = candidate(HardConstraints {
            pet_allergy: true,
            ..Default::default()
        });

        let verdict = DealBreakerFilter::evaluate(&allergic, &owner);
        assert!(verdict.blocked);
        assert_eq!(verdict.reasons, vec![DealBreakerReason::Pets]);
    }

    #[test]
    fn same_gender_preference_blocks_mismatch() {
        let strict = candidate(HardConstraints {
            gender: Some(Gender::Female),
            gender_preference: Some(GenderPreference::SameGenderOnly),
            ..Default::default()
        });
        let other = candidate(HardConstraints {
            gender: Some(Gender::Male),
            gender_preference: Some(GenderPreference::Any),
            ..Default::default()
        });

        let verdict = DealBreakerFilter::evaluate(&strict, &other);
        assert!(verdict.blocked);
        assert_eq!(verdict.reasons, vec![DealBreakerReason::GenderPreference]);
    }

    #[test]
    fn matching_gender_passes_same_gender_preference() {
        let strict = candidate(HardConstraints {
            gender: Some(Gender::Female),
            gender_preference: Some(GenderPreference::SameGenderOnly),
            ..Default::default()
        });
        let same = candidate(HardConstraints {
            gender: Some(Gender::Female),
            ..Default::default()
        });

        assert!(!DealBreakerFilter::evaluate(&strict, &same).blocked);
    }

    #[test]
    fn multiple_reasons_accumulate() {
        let a = candidate(HardConstraints {
            smoker: true,
            uses_substances_at_home: true,
            ..Default::default()
        });
        let b = candidate(HardConstraints {
            requires_non_smoker: true,
            requires_substance_free: true,
            ..Default::default()
        });

        let verdict = DealBreakerFilter::evaluate(&a, &b);
        assert!(verdict.blocked);
        assert_eq!(verdict.reasons.len(), 2);
        assert!(verdict.reasons.contains(&DealBreakerReason::Smoking));
        assert!(verdict.reasons.contains(&DealBreakerReason::Substances));
    }

    #[test]
    fn named_flag_conflict_is_reported_once() {
        let mut ca = HardConstraints::default();
        ca.declared_flags.insert("overnight_guests".to_string());
        let mut cb = HardConstraints::default();
        cb.forbidden_flags.insert("overnight_guests".to_string());

        let verdict = DealBreakerFilter::evaluate(&candidate(ca), &candidate(cb));
        assert_eq!(
            verdict.reasons,
            vec![DealBreakerReason::Flag("overnight_guests".to_string())]
        );
    }

    #[test]
    fn verdict_is_deterministic() {
        let a = candidate(HardConstraints {
            smoker: true,
            has_pets: true,
            ..Default::default()
        });
        let b = candidate(HardConstraints {
            requires_non_smoker: true,
            pet_allergy: true,
            ..Default::default()
        });

        let first = DealBreakerFilter::evaluate(&a, &b);
        for _ in 0..10 {
            let again = DealBreakerFilter::evaluate(&a, &b);
            assert_eq!(again.blocked, first.blocked);
            assert_eq!(again.reasons, first.reasons);
        }
    }

    #[test]
    fn compatible_pair_passes() {
        let verdict =
            DealBreakerFilter::evaluate(&candidate(Default::default()), &candidate(Default::default()));
        assert!(!verdict.blocked);
        assert!(verdict.reasons.is_empty());
    }
}
