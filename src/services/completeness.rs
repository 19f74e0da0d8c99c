/// Profile completeness checks, consolidated in one place so the HTTP
/// layer, the orchestrator, and unit tests all share the same verdict.
use serde::{Deserialize, Serialize};

use crate::models::Candidate;

/// A requirement the profile is missing before matching can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    CampusCity,
    QuestionnaireVector,
    GenderPreference,
}

pub struct ProfileCompletenessChecker;

impl ProfileCompletenessChecker {
    /// Returns every missing requirement; empty means matchable.
    pub fn missing(candidate: &Candidate) -> Vec<MissingField> {
        let mut missing = Vec::new();

        if candidate.campus_city.is_none() {
            missing.push(MissingField::CampusCity);
        }
        if candidate.vector.is_none() {
            missing.push(MissingField::QuestionnaireVector);
        }
        // A declared gender preference without a declared gender cannot
        // be evaluated bidirectionally.
        if candidate.constraints.gender_preference.is_some()
            && candidate.constraints.gender.is_none()
        {
            missing.push(MissingField::GenderPreference);
        }

        missing
    }

    pub fn is_complete(candidate: &Candidate) -> bool {
        Self::missing(candidate).is_empty()
    }
}
