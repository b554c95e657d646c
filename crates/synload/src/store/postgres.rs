//! Postgres implementation of [`SynonymStore`]

use super::{DeleteScope, Key, StoreResult, SynonymStore};
use crate::config::DbConfig;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info};

/// Build the connection pool for the load
///
/// No connection is opened until the first query; an unreachable server
/// surfaces as a store error from that query.
pub fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let options = config.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect_lazy_with(options);

    info!(
        server = %config.server,
        database = %config.database,
        user = %config.user,
        "Database connection pool configured"
    );

    Ok(pool)
}

/// Synonym store backed by the MGI Postgres schema
#[derive(Clone)]
pub struct PgSynonymStore {
    pool: PgPool,
    key_sequence: String,
}

impl PgSynonymStore {
    pub fn new(pool: PgPool, key_sequence: impl Into<String>) -> Self {
        Self {
            pool,
            key_sequence: key_sequence.into(),
        }
    }
}

#[async_trait]
impl SynonymStore for PgSynonymStore {
    async fn find_mgi_type(&self, name: &str) -> StoreResult<Option<Key>> {
        let key = sqlx::query_scalar::<_, i64>(
            "SELECT _MGIType_key::bigint FROM ACC_MGIType WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_object(&self, accession_id: &str, mgi_type_key: Key) -> StoreResult<Option<Key>> {
        let key = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT _Object_key::bigint
            FROM ACC_Accession
            WHERE accID = $1
              AND _MGIType_key = $2
              AND preferred = 1
            LIMIT 1
            "#,
        )
        .bind(accession_id)
        .bind(mgi_type_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_reference(&self, jnum: &str) -> StoreResult<Option<Key>> {
        let key = sqlx::query_scalar::<_, i64>(
            "SELECT _Refs_key::bigint FROM BIB_Citation_Cache WHERE jnumID = $1",
        )
        .bind(jnum)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_user(&self, login: &str) -> StoreResult<Option<Key>> {
        let key = sqlx::query_scalar::<_, i64>(
            "SELECT _User_key::bigint FROM MGI_User WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn synonym_types(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, Key)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT synonymType, _SynonymType_key::bigint
            FROM MGI_SynonymType
            WHERE _MGIType_key = $1
            "#,
        )
        .bind(mgi_type_key)
        .fetch_all(&self.pool)
        .await?;
        debug!(count = rows.len(), mgi_type_key, "Fetched synonym types");
        Ok(rows)
    }

    async fn existing_synonyms(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, String)>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT a.accID, s.synonym
            FROM ACC_Accession a
            JOIN MGI_Synonym s
              ON s._Object_key = a._Object_key
             AND s._MGIType_key = a._MGIType_key
            WHERE a._MGIType_key = $1
              AND a._LogicalDB_key = 1
              AND a.prefixPart = 'MGI:'
              AND a.preferred = 1
            "#,
        )
        .bind(mgi_type_key)
        .fetch_all(&self.pool)
        .await?;
        debug!(count = rows.len(), mgi_type_key, "Fetched existing synonyms");
        Ok(rows)
    }

    async fn max_synonym_key(&self) -> StoreResult<Option<Key>> {
        let key = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT MAX(_Synonym_key)::bigint FROM MGI_Synonym",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(key)
    }

    async fn next_sequence_key(&self) -> StoreResult<Key> {
        let key = sqlx::query_scalar::<_, i64>("SELECT nextval($1::regclass)")
            .bind(&self.key_sequence)
            .fetch_one(&self.pool)
            .await?;
        Ok(key)
    }

    async fn peek_sequence_key(&self) -> StoreResult<Key> {
        let key = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(pg_sequence_last_value($1::regclass) + s.seqincrement, s.seqstart)
            FROM pg_sequence s
            WHERE s.seqrelid = $1::regclass
            "#,
        )
        .bind(&self.key_sequence)
        .fetch_one(&self.pool)
        .await?;
        Ok(key)
    }

    async fn delete_scoped(&self, scope: &DeleteScope) -> StoreResult<u64> {
        let result = match *scope {
            DeleteScope::CreatedBy {
                mgi_type_key,
                user_key,
            } => {
                sqlx::query("DELETE FROM MGI_Synonym WHERE _MGIType_key = $1 AND _CreatedBy_key = $2")
                    .bind(mgi_type_key)
                    .bind(user_key)
                    .execute(&self.pool)
                    .await?
            },
            DeleteScope::Reference {
                mgi_type_key,
                reference_key,
            } => {
                sqlx::query(
                    "DELETE FROM MGI_Synonym WHERE _MGIType_key = $1 AND _Refs_key IS NOT DISTINCT FROM $2",
                )
                .bind(mgi_type_key)
                .bind(reference_key)
                .execute(&self.pool)
                .await?
            },
        };
        Ok(result.rows_affected())
    }

    async fn sync_key_sequence(&self) -> StoreResult<()> {
        // setval rejects NULL and values below the sequence minimum, so an
        // empty table leaves the sequence alone.
        sqlx::query(
            r#"
            SELECT setval($1::regclass, m.max_key)
            FROM (SELECT MAX(_Synonym_key) AS max_key FROM MGI_Synonym) m
            WHERE m.max_key IS NOT NULL
            "#,
        )
        .bind(&self.key_sequence)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
