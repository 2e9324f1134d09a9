//! Stack files: the declarative resource list handed to `plan` and `apply`.
//!
//! ```toml
//! [fields]
//! owner = "platform"
//!
//! [[resources]]
//! id = "topic"
//! type = "memory"
//! args = { name = "orders" }
//!
//! [[resources]]
//! id = "subscriber"
//! type = "memory"
//! [resources.args]
//! topic = "${topic.id}"
//! dependencies = ["topic"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_core::{Fields, Resource};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("cannot read stack file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid stack file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFile {
    /// Custom fields attached to every record this stack creates.
    #[serde(default, skip_serializing_if = "Fields::is_empty")]
    pub fields: Fields,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl StackFile {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, StackError> {
        let content = std::fs::read_to_string(path).map_err(|source| StackError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let stack = Self::parse(&content).map_err(|source| StackError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "loaded {} resources from {}",
            stack.resources.len(),
            path.display()
        );
        Ok(stack)
    }
}
