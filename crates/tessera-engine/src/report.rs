//! Run report: structured metadata for every execution.

use crate::config::ExecutionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_core::{Fields, ResourceRecord};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One resource the run created.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreatedResource {
    /// Declarative id from the plan.
    pub id: String,
    pub record: ResourceRecord,
    pub outputs: Fields,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RunReport {
    pub run_id: String,
    pub mode: ExecutionMode,
    pub state: RunState,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    /// Created resources in creation order.
    pub resources: Vec<CreatedResource>,
}

impl RunReport {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            mode,
            state: RunState::Pending,
            started: Utc::now(),
            ended: None,
            resources: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.state = RunState::Running;
        self.started = Utc::now();
    }

    pub fn finalize(&mut self, state: RunState) {
        self.state = state;
        self.ended = Some(Utc::now());
    }

    pub fn wall_ms(&self) -> u64 {
        self.ended
            .map(|end| (end - self.started).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    pub fn get(&self, id: &str) -> Option<&CreatedResource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn order(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "run {} [{}] {}: {} resources in {}ms",
            self.run_id,
            self.mode,
            self.state,
            self.resources.len(),
            self.wall_ms()
        )
    }
}

/// A rollback step that did not complete.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RollbackFailure {
    pub resource_id: String,
    pub resource_type: String,
    /// Backend id, when the failed step was discarding an untracked resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    pub message: String,
}

/// What cleanup after a failed run achieved.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RollbackReport {
    /// Declarative ids removed, in deletion order.
    pub deleted: Vec<String>,
    pub failures: Vec<RollbackFailure>,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failures.len()
    }
}

impl std::fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} rolled back", self.deleted.len())?;
        if !self.failures.is_empty() {
            let ids: Vec<&str> = self.failures.iter().map(|x| x.resource_id.as_str()).collect();
            write!(f, ", {} left behind ({})", self.failures.len(), ids.join(", "))?;
        }
        Ok(())
    }
}
