//! PostgreSQL cluster store implementation.

use async_trait::async_trait;
use corral_proto::{AdmissionConstraint, ClusterState};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};

use crate::config::StorageConfig;
use crate::error::{Result, SchedulerError};
use crate::types::{is_visible, Cluster, ClusterMutation, ClusterSummary, TlsMaterial};

use super::{ClusterFilter, ClusterStore};

const CLUSTER_COLUMNS: &str = "name, url, tls_ca, tls_crt, tls_key, state, score, max_score, \
     govern, admission_constraints, region, is_static, deleted, created_at";

/// Columns read on the scheduling path. No TLS material.
const SUMMARY_COLUMNS: &str = "name, url, state, score, max_score, govern, admission_constraints";

/// PostgreSQL-backed cluster store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to PostgreSQL and create a new store.
    ///
    /// The required tables are created if they don't exist.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| SchedulerError::Config("storage.url is required for postgres".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Create a store from an existing connection pool.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Ensure the required tables exist.
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clusters (
                name TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                tls_ca TEXT,
                tls_crt TEXT,
                tls_key TEXT,
                state TEXT NOT NULL,
                score BIGINT NOT NULL,
                max_score BIGINT NOT NULL,
                govern BOOLEAN NOT NULL DEFAULT FALSE,
                admission_constraints JSONB NOT NULL DEFAULT '[]'::jsonb,
                region TEXT,
                is_static BOOLEAN NOT NULL DEFAULT FALSE,
                deleted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CHECK (score >= 0 AND score <= max_score)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_clusters_live_state
            ON clusters (state, score DESC)
            WHERE NOT deleted
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_clusters_region
            ON clusters (region)
            WHERE NOT deleted
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_clusters_deleted
            ON clusters (name)
            WHERE deleted
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn state_from_row(row: &PgRow) -> Result<ClusterState> {
        let state_str: String = row.try_get("state")?;
        state_str.parse().map_err(|e| {
            SchedulerError::Serialisation(format!("failed to parse state '{state_str}': {e}"))
        })
    }

    fn constraints_from_row(row: &PgRow) -> Result<Vec<AdmissionConstraint>> {
        let constraints_json: serde_json::Value = row.try_get("admission_constraints")?;
        serde_json::from_value(constraints_json).map_err(|e| {
            SchedulerError::Serialisation(format!(
                "failed to deserialise admission constraints: {e}"
            ))
        })
    }

    /// Parse a row into a Cluster.
    fn row_to_cluster(row: &PgRow) -> Result<Cluster> {
        let tls_ca: Option<String> = row.try_get("tls_ca")?;
        let tls_crt: Option<String> = row.try_get("tls_crt")?;
        let tls_key: Option<String> = row.try_get("tls_key")?;
        let tls = match (tls_ca, tls_crt, tls_key) {
            (Some(ca), Some(crt), Some(key)) => Some(TlsMaterial::new(ca, crt, key)),
            _ => None,
        };

        Ok(Cluster {
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            tls,
            state: Self::state_from_row(row)?,
            score: score_from_db(row.try_get("score")?)?,
            max_score: score_from_db(row.try_get("max_score")?)?,
            govern: row.try_get("govern")?,
            admission_constraints: Self::constraints_from_row(row)?,
            region: row.try_get("region")?,
            is_static: row.try_get("is_static")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Parse a `SUMMARY_COLUMNS` row.
    fn row_to_summary(row: &PgRow) -> Result<ClusterSummary> {
        Ok(ClusterSummary {
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            score: score_from_db(row.try_get("score")?)?,
            max_score: score_from_db(row.try_get("max_score")?)?,
            state: Self::state_from_row(row)?,
            govern: row.try_get("govern")?,
            admission_constraints: Self::constraints_from_row(row)?,
        })
    }

    /// Bind every column of `cluster` in `CLUSTER_COLUMNS` order.
    fn push_values(builder: &mut QueryBuilder<'_, Postgres>, cluster: &Cluster) -> Result<()> {
        let constraints = serde_json::to_value(&cluster.admission_constraints)?;
        let tls = cluster.tls.as_ref();

        builder.push(" VALUES (");
        let mut values = builder.separated(", ");
        values
            .push_bind(cluster.name.clone())
            .push_bind(cluster.url.clone())
            .push_bind(tls.map(|t| t.ca.clone()))
            .push_bind(tls.map(|t| t.crt.clone()))
            .push_bind(tls.map(|t| t.key().to_owned()))
            .push_bind(cluster.state.as_str())
            .push_bind(i64::from(cluster.score))
            .push_bind(i64::from(cluster.max_score))
            .push_bind(cluster.govern)
            .push_bind(constraints)
            .push_bind(cluster.region.clone())
            .push_bind(cluster.is_static)
            .push_bind(cluster.deleted)
            .push_bind(cluster.created_at);
        values.push_unseparated(")");
        Ok(())
    }
}

const UPSERT_ASSIGNMENTS: &str = " ON CONFLICT (name) DO UPDATE SET \
     url = EXCLUDED.url, tls_ca = EXCLUDED.tls_ca, tls_crt = EXCLUDED.tls_crt, \
     tls_key = EXCLUDED.tls_key, state = EXCLUDED.state, score = EXCLUDED.score, \
     max_score = EXCLUDED.max_score, govern = EXCLUDED.govern, \
     admission_constraints = EXCLUDED.admission_constraints, region = EXCLUDED.region, \
     is_static = EXCLUDED.is_static, deleted = EXCLUDED.deleted, created_at = EXCLUDED.created_at";

fn score_from_db(value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| SchedulerError::Serialisation(format!("score out of range: {value}")))
}

#[async_trait]
impl ClusterStore for PostgresStore {
    async fn insert(&self, cluster: &Cluster) -> Result<()> {
        let mut builder = QueryBuilder::new(format!("INSERT INTO clusters ({CLUSTER_COLUMNS})"));
        Self::push_values(&mut builder, cluster)?;
        builder.push(UPSERT_ASSIGNMENTS);
        builder.push(" WHERE clusters.deleted");

        let result = builder.build().execute(&self.pool).await?;

        // Zero rows means the conflict target was live and the WHERE refused it.
        if result.rows_affected() == 0 {
            return Err(SchedulerError::AlreadyExists(cluster.name.clone()));
        }

        Ok(())
    }

    async fn upsert(&self, cluster: &Cluster) -> Result<()> {
        let mut builder = QueryBuilder::new(format!("INSERT INTO clusters ({CLUSTER_COLUMNS})"));
        Self::push_values(&mut builder, cluster)?;
        builder.push(UPSERT_ASSIGNMENTS);

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn find_raw(&self, name: &str) -> Result<Option<Cluster>> {
        let row = sqlx::query(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM clusters WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_cluster).transpose()
    }

    async fn soft_delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE clusters SET deleted = TRUE
            WHERE name = $1 AND NOT deleted
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clusters WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply(&self, name: &str, mutation: &ClusterMutation) -> Result<Cluster> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM clusters WHERE name = $1 FOR UPDATE"
        ))
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let mut cluster = row
            .as_ref()
            .map(Self::row_to_cluster)
            .transpose()?
            .filter(is_visible)
            .ok_or_else(|| SchedulerError::NotFound(name.to_owned()))?;

        // Dropping `tx` on error rolls back and releases the row lock.
        cluster.apply(mutation)?;

        let constraints = serde_json::to_value(&cluster.admission_constraints)?;
        sqlx::query(
            r#"
            UPDATE clusters
            SET state = $1, score = $2, max_score = $3, admission_constraints = $4
            WHERE name = $5
            "#,
        )
        .bind(cluster.state.as_str())
        .bind(i64::from(cluster.score))
        .bind(i64::from(cluster.max_score))
        .bind(constraints)
        .bind(name)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(cluster)
    }

    async fn list_filtered(&self, filter: &ClusterFilter) -> Result<Vec<ClusterSummary>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {SUMMARY_COLUMNS} FROM clusters WHERE NOT deleted"
        ));

        if let Some(state) = filter.state {
            builder.push(" AND state = ").push_bind(state.as_str());
        }

        if let Some(min_score) = filter.min_score {
            builder.push(" AND score >= ").push_bind(i64::from(min_score));
        }

        if let Some(ref region) = filter.region {
            builder.push(" AND region = ").push_bind(region.clone());
        }

        if let Some(ref url) = filter.url {
            builder.push(" AND url = ").push_bind(url.clone());
        }

        builder.push(" ORDER BY name");

        let rows = builder.build().fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn list(&self) -> Result<Vec<Cluster>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLUSTER_COLUMNS} FROM clusters WHERE NOT deleted ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_cluster).collect()
    }

    async fn purge_deleted(&self, limit: u32) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM clusters
            WHERE name IN (
                SELECT name FROM clusters
                WHERE deleted
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            AND deleted
            "#,
        )
        .bind(i64::from(limit))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore").finish_non_exhaustive()
    }
}
