use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{pair_key, PairScore, Suggestion, SuggestionStatus};

/// Append-only suggestion persistence. Rows never mutate except the
/// status transition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    /// Insert a run's suggestions. Stale pending rows are expired
    /// first so an aged-out pair stops reserving the uniqueness index;
    /// pairs that still have an active suggestion are skipped. Returns
    /// the suggestions actually created.
    async fn insert_batch(&self, suggestions: &[Suggestion]) -> Result<Vec<Suggestion>>;

    async fn list_for_user(&self, user_id: Uuid, include_expired: bool)
        -> Result<Vec<Suggestion>>;

    async fn update_status(&self, id: Uuid, status: SuggestionStatus) -> Result<()>;
}

#[derive(sqlx::FromRow)]
struct SuggestionRow {
    id: Uuid,
    run_id: String,
    member_a: Uuid,
    member_b: Uuid,
    score: Json<PairScore>,
    status: SuggestionStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SuggestionRow> for Suggestion {
    fn from(row: SuggestionRow) -> Self {
        Suggestion {
            id: row.id,
            run_id: row.run_id,
            member_ids: vec![row.member_a, row.member_b],
            score: row.score.0,
            status: row.status,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

pub struct PgSuggestionStore {
    pool: PgPool,
}

impl PgSuggestionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SuggestionStore for PgSuggestionStore {
    async fn insert_batch(&self, suggestions: &[Suggestion]) -> Result<Vec<Suggestion>> {
        let mut created = Vec::new();
        let mut tx = self.pool.begin().await?;

        // Lazy expiry: a stale pending row keeps its pair reserved in
        // the partial unique index until its status catches up with
        // its expires_at. Transition it here so the pair becomes
        // suggestible again.
        sqlx::query(
            "UPDATE suggestions SET status = 'expired' \
             WHERE status = 'pending' AND expires_at <= now()",
        )
        .execute(&mut *tx)
        .await?;

        for suggestion in suggestions {
            let (member_a, member_b) = pair_key(suggestion.member_ids[0], suggestion.member_ids[1]);

            // ON CONFLICT DO NOTHING against the partial unique index on
            // the active sorted pair enforces the uniqueness invariant
            // even across concurrent runs for different requesters.
            let inserted: Option<Uuid> = sqlx::query_scalar(
                r#"
                INSERT INTO suggestions
                    (id, run_id, member_a, member_b, score, status, created_at, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT DO NOTHING
                RETURNING id
                "#,
            )
            .bind(suggestion.id)
            .bind(&suggestion.run_id)
            .bind(member_a)
            .bind(member_b)
            .bind(Json(&suggestion.score))
            .bind(suggestion.status)
            .bind(suggestion.created_at)
            .bind(suggestion.expires_at)
            .fetch_optional(&mut *tx)
            .await?;

            if inserted.is_some() {
                created.push(suggestion.clone());
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        include_expired: bool,
    ) -> Result<Vec<Suggestion>> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r#"
            SELECT id, run_id, member_a, member_b, score, status, created_at, expires_at
            FROM suggestions
            WHERE (member_a = $1 OR member_b = $1)
              AND ($2 OR (status <> 'expired' AND expires_at > now()))
            ORDER BY (score->>'overall')::float8 DESC
            "#,
        )
        .bind(user_id)
        .bind(include_expired)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Suggestion::from).collect())
    }

    async fn update_status(&self, id: Uuid, status: SuggestionStatus) -> Result<()> {
        sqlx::query("UPDATE suggestions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
