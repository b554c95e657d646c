//! Processing modes
//!
//! - `load`: validate every record, write the bulk-load file, load it
//! - `preview`: validate and write every file, but never touch the store
//! - `reload`: delete the run's existing synonyms first, then `load`

use crate::error::{LoadError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Load,
    Preview,
    Reload,
}

impl Mode {
    /// Check the configured mode string before any other work is done
    pub fn verify(raw: &str) -> Result<Self> {
        raw.parse()
    }

    /// Whether the bulk-load file is applied to the store
    pub fn commits(self) -> bool {
        !matches!(self, Mode::Preview)
    }

    /// Whether existing synonyms in the run's scope are deleted first
    pub fn deletes_first(self) -> bool {
        matches!(self, Mode::Reload)
    }
}

impl std::str::FromStr for Mode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "load" => Ok(Mode::Load),
            "preview" => Ok(Mode::Preview),
            "reload" => Ok(Mode::Reload),
            other => Err(LoadError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Load => write!(f, "load"),
            Mode::Preview => write!(f, "preview"),
            Mode::Reload => write!(f, "reload"),
        }
    }
}
