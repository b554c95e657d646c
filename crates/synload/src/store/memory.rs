//! In-memory [`SynonymStore`]
//!
//! Holds the handful of tables the load reads, plus the synonym table
//! itself. It also acts as a [`BulkLoader`] that reads the bulk-load file
//! back into its synonym table, so whole runs can be exercised without a
//! database.

use super::{DeleteScope, Key, StoreResult, SynonymStore};
use crate::bulk::{BulkLoadError, BulkLoader};
use crate::record::SynonymRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Sequence position of a fresh store; the first `nextval` yields 1000.
const INITIAL_SEQUENCE_VALUE: Key = 999;

#[derive(Debug)]
struct State {
    synonyms: Vec<SynonymRecord>,
    /// Last value handed out by the key sequence
    sequence: Key,
    mutations: usize,
}

#[derive(Debug)]
pub struct MemoryStore {
    mgi_types: HashMap<String, Key>,
    /// `(mgi type key, accession ID)` to object key
    objects: HashMap<(Key, String), Key>,
    references: HashMap<String, Key>,
    users: HashMap<String, Key>,
    /// `(mgi type key, name, synonym type key)`
    synonym_types: Vec<(Key, String, Key)>,
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            mgi_types: HashMap::new(),
            objects: HashMap::new(),
            references: HashMap::new(),
            users: HashMap::new(),
            synonym_types: Vec::new(),
            state: Mutex::new(State {
                synonyms: Vec::new(),
                sequence: INITIAL_SEQUENCE_VALUE,
                mutations: 0,
            }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mgi_type(mut self, name: &str, key: Key) -> Self {
        self.mgi_types.insert(name.to_lowercase(), key);
        self
    }

    pub fn with_object(mut self, accession_id: &str, mgi_type_key: Key, key: Key) -> Self {
        self.objects
            .insert((mgi_type_key, accession_id.to_string()), key);
        self
    }

    pub fn with_reference(mut self, jnum: &str, key: Key) -> Self {
        self.references.insert(jnum.to_string(), key);
        self
    }

    pub fn with_user(mut self, login: &str, key: Key) -> Self {
        self.users.insert(login.to_string(), key);
        self
    }

    pub fn with_synonym_type(mut self, mgi_type_key: Key, name: &str, key: Key) -> Self {
        self.synonym_types
            .push((mgi_type_key, name.to_string(), key));
        self
    }

    /// Seed the synonym table; does not count as a mutation
    pub fn with_synonym(self, record: SynonymRecord) -> Self {
        self.state().synonyms.push(record);
        self
    }

    /// Set the last value handed out by the key sequence
    pub fn with_sequence(self, last_value: Key) -> Self {
        self.state().sequence = last_value;
        self
    }

    /// Snapshot of the synonym table in insertion order
    pub fn synonyms(&self) -> Vec<SynonymRecord> {
        self.state().synonyms.clone()
    }

    /// Number of write operations performed since construction
    pub fn mutation_count(&self) -> usize {
        self.state().mutations
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn accession_of(&self, mgi_type_key: Key, object_key: Key) -> Option<&str> {
        self.objects
            .iter()
            .find(|((type_key, _), key)| *type_key == mgi_type_key && **key == object_key)
            .map(|((_, acc), _)| acc.as_str())
    }
}

#[async_trait]
impl SynonymStore for MemoryStore {
    async fn find_mgi_type(&self, name: &str) -> StoreResult<Option<Key>> {
        Ok(self.mgi_types.get(&name.to_lowercase()).copied())
    }

    async fn find_object(&self, accession_id: &str, mgi_type_key: Key) -> StoreResult<Option<Key>> {
        Ok(self
            .objects
            .get(&(mgi_type_key, accession_id.to_string()))
            .copied())
    }

    async fn find_reference(&self, jnum: &str) -> StoreResult<Option<Key>> {
        Ok(self.references.get(jnum).copied())
    }

    async fn find_user(&self, login: &str) -> StoreResult<Option<Key>> {
        Ok(self.users.get(login).copied())
    }

    async fn synonym_types(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, Key)>> {
        Ok(self
            .synonym_types
            .iter()
            .filter(|(type_key, _, _)| *type_key == mgi_type_key)
            .map(|(_, name, key)| (name.clone(), *key))
            .collect())
    }

    async fn existing_synonyms(&self, mgi_type_key: Key) -> StoreResult<Vec<(String, String)>> {
        let state = self.state();
        Ok(state
            .synonyms
            .iter()
            .filter(|s| s.mgi_type_key == mgi_type_key)
            .filter_map(|s| {
                self.accession_of(mgi_type_key, s.object_key)
                    .map(|acc| (acc.to_string(), s.synonym.clone()))
            })
            .collect())
    }

    async fn max_synonym_key(&self) -> StoreResult<Option<Key>> {
        Ok(self.state().synonyms.iter().map(|s| s.synonym_key).max())
    }

    async fn next_sequence_key(&self) -> StoreResult<Key> {
        let mut state = self.state();
        state.sequence += 1;
        state.mutations += 1;
        Ok(state.sequence)
    }

    async fn peek_sequence_key(&self) -> StoreResult<Key> {
        Ok(self.state().sequence + 1)
    }

    async fn delete_scoped(&self, scope: &DeleteScope) -> StoreResult<u64> {
        let mut state = self.state();
        let before = state.synonyms.len();
        state.synonyms.retain(|s| match *scope {
            DeleteScope::CreatedBy {
                mgi_type_key,
                user_key,
            } => !(s.mgi_type_key == mgi_type_key && s.created_by_key == user_key),
            DeleteScope::Reference {
                mgi_type_key,
                reference_key,
            } => !(s.mgi_type_key == mgi_type_key && s.reference_key == reference_key),
        });
        state.mutations += 1;
        Ok((before - state.synonyms.len()) as u64)
    }

    async fn sync_key_sequence(&self) -> StoreResult<()> {
        let mut state = self.state();
        if let Some(max) = state.synonyms.iter().map(|s| s.synonym_key).max() {
            state.sequence = max;
            state.mutations += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl BulkLoader for MemoryStore {
    fn describe(&self, table: &str, file: &Path) -> String {
        format!("memory load of {} into {}", file.display(), table)
    }

    async fn load(&self, _table: &str, file: &Path) -> Result<Option<u64>, BulkLoadError> {
        let content = tokio::fs::read_to_string(file).await?;

        let mut rows = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let record = SynonymRecord::from_bcp_line(line)
                .map_err(|e| BulkLoadError::Format(format!("line {}: {}", idx + 1, e)))?;
            rows.push(record);
        }

        let mut state = self.state();
        for row in &rows {
            if state.synonyms.iter().any(|s| s.synonym_key == row.synonym_key) {
                return Err(BulkLoadError::Rejected(format!(
                    "duplicate key value {} for _Synonym_key",
                    row.synonym_key
                )));
            }
        }
        let count = rows.len() as u64;
        state.synonyms.extend(rows);
        state.mutations += 1;

        Ok(Some(count))
    }
}
