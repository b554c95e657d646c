//! Resolution of external identifiers to store keys
//!
//! Object lookups go straight to the store. References and users repeat
//! across a file, so their keys are memoized for the life of the run,
//! negative answers included.

use crate::config::NO_REFERENCE_TOKEN;
use crate::store::{Key, StoreResult, SynonymStore};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Kind of identifier being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    ObjectType,
    Object,
    Reference,
    User,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::ObjectType => write!(f, "object type"),
            IdentifierKind::Object => write!(f, "object"),
            IdentifierKind::Reference => write!(f, "reference"),
            IdentifierKind::User => write!(f, "user"),
        }
    }
}

/// Outcome of resolving one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(Key),
    /// The reference token for "no reference"
    NoReference,
    NotFound,
}

impl Resolution {
    /// Key to store; `None` for both "no reference" and "not found"
    pub fn key(self) -> Option<Key> {
        match self {
            Resolution::Found(key) => Some(key),
            Resolution::NoReference | Resolution::NotFound => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        !matches!(self, Resolution::NotFound)
    }
}

impl From<Option<Key>> for Resolution {
    fn from(key: Option<Key>) -> Self {
        key.map_or(Resolution::NotFound, Resolution::Found)
    }
}

/// Resolves identifiers within one object type
pub struct Resolver<'a> {
    store: &'a dyn SynonymStore,
    mgi_type_key: Key,
    references: HashMap<String, Resolution>,
    users: HashMap<String, Resolution>,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn SynonymStore, mgi_type_key: Key) -> Self {
        Self {
            store,
            mgi_type_key,
            references: HashMap::new(),
            users: HashMap::new(),
        }
    }

    /// Resolve the object type name that scopes a whole run
    pub async fn object_type(store: &dyn SynonymStore, name: &str) -> StoreResult<Resolution> {
        Ok(store.find_mgi_type(name.trim()).await?.into())
    }

    pub async fn resolve(&mut self, kind: IdentifierKind, token: &str) -> StoreResult<Resolution> {
        let token = token.trim();
        match kind {
            IdentifierKind::ObjectType => Self::object_type(self.store, token).await,
            IdentifierKind::Object => {
                Ok(self.store.find_object(token, self.mgi_type_key).await?.into())
            },
            IdentifierKind::Reference => {
                if token == NO_REFERENCE_TOKEN {
                    return Ok(Resolution::NoReference);
                }
                if let Some(hit) = self.references.get(token) {
                    return Ok(*hit);
                }
                let resolution: Resolution = self.store.find_reference(token).await?.into();
                debug!(jnum = token, ?resolution, "Resolved reference");
                self.references.insert(token.to_string(), resolution);
                Ok(resolution)
            },
            IdentifierKind::User => {
                if let Some(hit) = self.users.get(token) {
                    return Ok(*hit);
                }
                let resolution: Resolution = self.store.find_user(token).await?.into();
                debug!(login = token, ?resolution, "Resolved user");
                self.users.insert(token.to_string(), resolution);
                Ok(resolution)
            },
        }
    }
}
