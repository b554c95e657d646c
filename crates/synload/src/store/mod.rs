//! Access to the relational store
//!
//! [`SynonymStore`] is everything the load needs from the database: key
//! lookups for external identifiers, the two bulk reads behind the lookup
//! cache, key seeding, and the two mutations (the reload delete and the
//! post-load sequence resync). The bulk load itself goes through
//! [`crate::bulk::BulkLoader`].
//!
//! Resolution methods return `Ok(None)` for "not found"; errors are
//! reserved for a failing store.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgSynonymStore};

use async_trait::async_trait;
use thiserror::Error;

/// Internal numeric key of a store row
pub type Key = i64;

/// Store access errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The store cannot serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Rows removed by a reload, within one object type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    CreatedBy { mgi_type_key: Key, user_key: Key },
    /// `reference_key` of `None` targets synonyms without a reference
    Reference { mgi_type_key: Key, reference_key: Option<Key> },
}

impl DeleteScope {
    /// SQL-like description for the diagnostics file
    pub fn describe(&self, table: &str) -> String {
        match self {
            DeleteScope::CreatedBy {
                mgi_type_key,
                user_key,
            } => format!(
                "delete from {} where _MGIType_key = {} and _CreatedBy_key = {}",
                table, mgi_type_key, user_key
            ),
            DeleteScope::Reference {
                mgi_type_key,
                reference_key: Some(key),
            } => format!(
                "delete from {} where _MGIType_key = {} and _Refs_key = {}",
                table, mgi_type_key, key
            ),
            DeleteScope::Reference {
                mgi_type_key,
                reference_key: None,
            } => format!(
                "delete from {} where _MGIType_key = {} and _Refs_key is null",
                table, mgi_type_key
            ),
        }
    }
}

/// Read and scoped-write access to the synonym tables
#[async_trait]
pub trait SynonymStore: Send + Sync {
    /// Object type name (`ACC_MGIType.name`) to key
    async fn find_mgi_type(&self, name: &str) -> StoreResult<Option<Key>>;

    /// Accession ID of an object of the given type to the object key
    async fn find_object(&self, accession_id: &str, mgi_type_key: Key) -> StoreResult<Option<Key>>;

    /// J: number to reference key
    async fn find_reference(&self, jnum: &str) -> StoreResult<Option<Key>>;

    /// User login to user key
    async fn find_user(&self, login: &str) -> StoreResult<Option<Key>>;

    /// `(synonym type name, key)` for every synonym type of the object type
    async fn synonym_types(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, Key)>>;

    /// `(accession ID, synonym)` for every stored synonym of the object type
    async fn existing_synonyms(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, String)>>;

    /// Largest synonym key in the table, `None` when empty
    async fn max_synonym_key(&self) -> StoreResult<Option<Key>>;

    /// Next value of the synonym key sequence, advancing it
    async fn next_sequence_key(&self) -> StoreResult<Key>;

    /// Value the next `next_sequence_key` call would return, without advancing
    async fn peek_sequence_key(&self) -> StoreResult<Key>;

    /// Delete every synonym in `scope`, returning the number of rows removed
    async fn delete_scoped(&self, scope: &DeleteScope) -> StoreResult<u64>;

    /// Move the synonym key sequence up to the largest key in the table
    async fn sync_key_sequence(&self) -> StoreResult<()>;
}
