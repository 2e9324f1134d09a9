use serde::{Deserialize, Serialize};

/// How the engine walks a plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Strict creation order, one resource at a time.
    #[default]
    Sequential,
    /// Ready-set scheduling: a resource starts once all its dependencies exist.
    Concurrent,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!("unknown execution mode '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Upper bound on in-flight creations in concurrent mode. 0 means unbounded.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl EngineConfig {
    /// The admission limit with 0 mapped to unbounded.
    pub fn admission_limit(&self) -> usize {
        if self.max_concurrency == 0 {
            usize::MAX
        } else {
            self.max_concurrency
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.mode, ExecutionMode::Sequential);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.admission_limit(), 8);
    }

    #[test]
    fn zero_is_unbounded() {
        let config = EngineConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.admission_limit(), usize::MAX);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Concurrent".parse::<ExecutionMode>(), Ok(ExecutionMode::Concurrent));
        assert!("parallel".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn mode_serializes_lowercase() {
        let json = serde_json::to_string(&ExecutionMode::Concurrent).unwrap();
        assert_eq!(json, "\"concurrent\"");
    }
}
