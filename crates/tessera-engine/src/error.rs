use crate::report::RollbackReport;
use thiserror::Error;

/// Why a run did not succeed. Every variant past planning carries what
/// cleanup achieved.
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// The resource set could not be planned; nothing was created.
    #[error("planning failed: {0}")]
    Planning(#[source] tessera_core::Error),

    #[error("creation of '{resource_id}' failed: {source} ({rollback})")]
    CreationFailed {
        resource_id: String,
        #[source]
        source: tessera_core::Error,
        rollback: RollbackReport,
        /// Failures observed after the first one, concurrent mode only.
        additional_failures: Vec<(String, tessera_core::Error)>,
    },

    #[error("run cancelled ({rollback})")]
    Cancelled { rollback: RollbackReport },
}

impl ExecuteError {
    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            Self::Planning(_) => None,
            Self::CreationFailed { rollback, .. } | Self::Cancelled { rollback } => Some(rollback),
        }
    }

    /// True when cleanup left resources behind.
    pub fn rollback_failed(&self) -> bool {
        self.rollback().is_some_and(|r| !r.is_complete())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
