/// Data models for the suggestion orchestration engine
///
/// - `Candidate`: a matchable user profile with its questionnaire vector
/// - `CohortFilter`: eligibility filter for assembling a scoring cohort
/// - `PairScore`: per-dimension and aggregate compatibility scores
/// - `Suggestion`: a persisted, ranked pair suggestion
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Hard cap on cohort size. Bounds the O(n) scoring cost of a refresh
/// and prevents oversized cohorts from starving the service.
pub const MAX_COHORT_LIMIT: usize = 1000;

/// The eight fixed compatibility dimensions.
///
/// Values on every dimension live on a 0..=10 questionnaire scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Cleanliness,
    Noise,
    Guests,
    Sleep,
    SharedSpaces,
    Substances,
    StudySocial,
    HomeVibe,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Cleanliness,
        Dimension::Noise,
        Dimension::Guests,
        Dimension::Sleep,
        Dimension::SharedSpaces,
        Dimension::Substances,
        Dimension::StudySocial,
        Dimension::HomeVibe,
    ];

    /// Personality/values-oriented dimensions feeding the harmony score.
    pub const HARMONY: [Dimension; 4] = [
        Dimension::Cleanliness,
        Dimension::Substances,
        Dimension::StudySocial,
        Dimension::HomeVibe,
    ];

    /// Logistics-oriented dimensions feeding the context score.
    pub const CONTEXT: [Dimension; 4] = [
        Dimension::Sleep,
        Dimension::Noise,
        Dimension::Guests,
        Dimension::SharedSpaces,
    ];

    /// Width of the questionnaire scale for this dimension.
    pub fn range(&self) -> f64 {
        10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "degree_level", rename_all = "lowercase")]
pub enum DegreeLevel {
    Bachelor,
    Master,
    Phd,
}

/// Self-declared gender, used only for explicit roommate preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    NonBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "gender_preference", rename_all = "snake_case")]
pub enum GenderPreference {
    Any,
    SameGenderOnly,
}

/// Non-negotiable boolean constraints captured at onboarding.
///
/// A `true` on a "requires_*" field is a hard veto against any partner
/// who exhibits the corresponding behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardConstraints {
    pub smoker: bool,
    pub requires_non_smoker: bool,
    pub has_pets: bool,
    pub pet_allergy: bool,
    pub gender: Option<Gender>,
    pub gender_preference: Option<GenderPreference>,
    pub uses_substances_at_home: bool,
    pub requires_substance_free: bool,
    /// Additional "must not share a home with X" flags from onboarding.
    /// Keyed by flag name; a flag conflicts when one side declares the
    /// behavior and the other forbids it under the same name.
    #[serde(default)]
    pub declared_flags: HashSet<String>,
    #[serde(default)]
    pub forbidden_flags: HashSet<String>,
}

/// A matchable user profile. Created when onboarding completes; never
/// deleted, only deactivated. The vector is populated lazily by the
/// vector ensurer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub user_id: Uuid,
    pub degree_level: DegreeLevel,
    pub campus_city: Option<String>,
    pub institution_id: Option<Uuid>,
    pub programme_id: Option<Uuid>,
    pub vector: Option<HashMap<Dimension, f64>>,
    pub constraints: HardConstraints,
    pub active: bool,
}

impl Candidate {
    pub fn has_vector(&self) -> bool {
        self.vector.is_some()
    }
}

/// Filter describing the eligible cohort for one requester.
#[derive(Debug, Clone)]
pub struct CohortFilter {
    pub degree_level: DegreeLevel,
    pub campus_city: Option<String>,
    pub exclude_user_ids: HashSet<Uuid>,
    pub only_active: bool,
    pub exclude_already_matched: bool,
    limit: usize,
}

impl CohortFilter {
    pub fn new(degree_level: DegreeLevel, campus_city: Option<String>, limit: usize) -> Self {
        Self {
            degree_level,
            campus_city,
            exclude_user_ids: HashSet::new(),
            only_active: true,
            exclude_already_matched: true,
            limit: limit.min(MAX_COHORT_LIMIT),
        }
    }

    pub fn exclude(mut self, user_id: Uuid) -> Self {
        self.exclude_user_ids.insert(user_id);
        self
    }

    /// Effective row limit, always <= MAX_COHORT_LIMIT.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Same filter without the city constraint, used by the diagnostic
    /// reporter to measure how much the city filter costs.
    pub fn ignoring_city(&self) -> Self {
        let mut relaxed = self.clone();
        relaxed.campus_city = None;
        relaxed
    }
}

/// Compatibility scores for one unordered pair. Symmetric by
/// construction: `score(a, b) == score(b, a)` on every component, and
/// every component lies in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairScore {
    pub members: (Uuid, Uuid),
    pub dimension_scores: HashMap<Dimension, f64>,
    pub harmony: f64,
    pub context: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "suggestion_status", rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Expired,
}

/// A persisted pair suggestion. Immutable except for `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: Uuid,
    pub run_id: String,
    pub member_ids: Vec<Uuid>,
    pub score: PairScore,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Canonical unordered-pair key, smaller id first. Used for the
/// active-pair uniqueness invariant.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}
