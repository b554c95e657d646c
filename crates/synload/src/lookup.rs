//! Lookup tables loaded once per run
//!
//! Both tables are read in bulk before the first record is validated and
//! reflect the store as of that moment. Synonyms accepted earlier in the
//! same run are not added to the existing-synonym index.

use crate::error::{LoadError, Result};
use crate::store::{Key, SynonymStore};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Synonym type name to key, for one object type
#[derive(Debug, Clone, Default)]
pub struct SynonymTypeLookup {
    types: HashMap<String, Key>,
}

impl SynonymTypeLookup {
    /// Build from `(name, key)` rows; a repeated name keeps its first key
    pub fn from_rows(rows: impl IntoIterator<Item = (String, Key)>) -> Self {
        let mut types = HashMap::new();
        for (name, key) in rows {
            if let Some(existing) = types.get(&name) {
                warn!(
                    synonym_type = %name,
                    kept = existing,
                    ignored = key,
                    "Synonym type name is not unique, keeping the first key"
                );
                continue;
            }
            types.insert(name, key);
        }
        Self { types }
    }

    /// Exact, case-sensitive lookup
    pub fn get(&self, name: &str) -> Option<Key> {
        self.types.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Accession ID to the synonyms already stored for that object
#[derive(Debug, Clone, Default)]
pub struct ExistingSynonymIndex {
    by_accession: HashMap<String, HashSet<String>>,
    count: usize,
}

impl ExistingSynonymIndex {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut by_accession: HashMap<String, HashSet<String>> = HashMap::new();
        let mut count = 0;
        for (accession_id, synonym) in rows {
            if by_accession.entry(accession_id).or_default().insert(synonym) {
                count += 1;
            }
        }
        Self {
            by_accession,
            count,
        }
    }

    /// Whether `synonym` is stored for `accession_id`; exact and case-sensitive
    pub fn contains(&self, accession_id: &str, synonym: &str) -> bool {
        self.by_accession
            .get(accession_id)
            .is_some_and(|set| set.contains(synonym))
    }

    /// Number of distinct `(accession, synonym)` pairs
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Both lookup tables of a run
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    pub synonym_types: SynonymTypeLookup,
    pub existing: ExistingSynonymIndex,
}

impl LookupCache {
    pub async fn load(store: &dyn SynonymStore, mgi_type_key: Key) -> Result<Self> {
        let types = store
            .synonym_types(mgi_type_key)
            .await
            .map_err(|source| LoadError::Lookup {
                what: "synonym type",
                source,
            })?;
        let synonym_types = SynonymTypeLookup::from_rows(types);

        let rows = store
            .existing_synonyms(mgi_type_key)
            .await
            .map_err(|source| LoadError::Lookup {
                what: "existing synonym",
                source,
            })?;
        let existing = ExistingSynonymIndex::from_rows(rows);

        info!(
            mgi_type_key,
            synonym_types = synonym_types.len(),
            existing_synonyms = existing.len(),
            "Lookups loaded"
        );

        Ok(Self {
            synonym_types,
            existing,
        })
    }
}
