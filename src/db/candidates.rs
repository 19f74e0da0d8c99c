use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Candidate, CohortFilter, DegreeLevel, Dimension, HardConstraints};

/// Read-only access to matchable candidate profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Option<Candidate>>;

    /// Load the eligible cohort. Never returns more than
    /// `filter.limit()` rows.
    async fn load_cohort(&self, filter: &CohortFilter) -> Result<Vec<Candidate>>;

    /// Count matching rows without loading them (diagnostics).
    async fn count_cohort(&self, filter: &CohortFilter) -> Result<u64>;

    /// Total active candidates, ignoring every other constraint.
    async fn count_active(&self) -> Result<u64>;
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    user_id: Uuid,
    degree_level: DegreeLevel,
    campus_city: Option<String>,
    institution_id: Option<Uuid>,
    programme_id: Option<Uuid>,
    vector: Option<Json<HashMap<Dimension, f64>>>,
    constraints: Json<HardConstraints>,
    active: bool,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            user_id: row.user_id,
            degree_level: row.degree_level,
            campus_city: row.campus_city,
            institution_id: row.institution_id,
            programme_id: row.programme_id,
            vector: row.vector.map(|json| json.0),
            constraints: row.constraints.0,
            active: row.active,
        }
    }
}

pub struct PgCandidateRepository {
    pool: PgPool,
}

impl PgCandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CANDIDATE_COLUMNS: &str = "user_id, degree_level, campus_city, institution_id, \
     programme_id, vector, constraints, active";

#[async_trait]
impl CandidateRepository for PgCandidateRepository {
    async fn get_by_user_id(&self, user_id: Uuid) -> Result<Option<Candidate>> {
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Candidate::from))
    }

    async fn load_cohort(&self, filter: &CohortFilter) -> Result<Vec<Candidate>> {
        // The already-matched exclusion keys off non-expired suggestions
        // containing any excluded user (the requester).
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            r#"
            SELECT {CANDIDATE_COLUMNS}
            FROM candidates c
            WHERE c.degree_level = $1
              AND ($2::text IS NULL OR c.campus_city = $2)
              AND (NOT $3 OR c.active)
              AND c.user_id <> ALL($4)
              AND (
                NOT $5 OR NOT EXISTS (
                  SELECT 1 FROM suggestions s
                  WHERE s.status <> 'expired'
                    AND s.expires_at > now()
                    AND ((s.member_a = c.user_id AND s.member_b = ANY($4))
                      OR (s.member_b = c.user_id AND s.member_a = ANY($4)))
                )
              )
            ORDER BY c.user_id
            LIMIT $6
            "#
        ))
        .bind(filter.degree_level)
        .bind(filter.campus_city.as_deref())
        .bind(filter.only_active)
        .bind(filter.exclude_user_ids.iter().copied().collect::<Vec<_>>())
        .bind(filter.exclude_already_matched)
        .bind(filter.limit() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Candidate::from).collect())
    }

    async fn count_cohort(&self, filter: &CohortFilter) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM candidates c
            WHERE c.degree_level = $1
              AND ($2::text IS NULL OR c.campus_city = $2)
              AND (NOT $3 OR c.active)
              AND c.user_id <> ALL($4)
            "#,
        )
        .bind(filter.degree_level)
        .bind(filter.campus_city.as_deref())
        .bind(filter.only_active)
        .bind(filter.exclude_user_ids.iter().copied().collect::<Vec<_>>())
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn count_active(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates WHERE active")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
