//! Wiring from settings to a ready engine.

use crate::config::{ProvidersConfig, StorageBackend, StorageConfig, TesseraConfig};
use serde_json::Value;
use std::sync::Arc;
use tessera_core::{Fields, Storage};
use tessera_engine::Engine;
use tessera_manager::{FsStorage, MemoryStorage, ProviderRegistry, ResourceManager};
use tessera_providers::{LocalFileProvider, MemoryProvider};

pub fn build_registry(config: &ProvidersConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(LocalFileProvider::new(&config.local_file_root));
    for resource_type in &config.memory {
        registry.register(MemoryProvider::new(resource_type.as_str()));
    }
    tracing::debug!("providers: {}", registry.types().join(", "));
    registry
}

pub fn build_storage(config: &StorageConfig) -> Arc<dyn Storage> {
    match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::Fs => Arc::new(FsStorage::new(&config.path)),
    }
}

pub fn build_manager(config: &TesseraConfig) -> ResourceManager {
    ResourceManager::new(
        build_registry(&config.providers),
        build_storage(&config.storage),
    )
}

pub fn build_engine(config: &TesseraConfig) -> Engine {
    Engine::new(Arc::new(build_manager(config)), config.engine.clone())
}

/// Parse `key=value`. The value is read as JSON when it parses as JSON,
/// otherwise it is taken as a plain string.
pub fn parse_assignment(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

pub fn assignments_to_fields(pairs: impl IntoIterator<Item = (String, Value)>) -> Fields {
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assignment_values_are_typed_when_json() {
        assert_eq!(parse_assignment("port=8080").unwrap(), ("port".into(), json!(8080)));
        assert_eq!(parse_assignment("on=true").unwrap().1, json!(true));
        assert_eq!(parse_assignment("tags=[\"a\"]").unwrap().1, json!(["a"]));
    }

    #[test]
    fn assignment_falls_back_to_string() {
        assert_eq!(
            parse_assignment("name=orders=v2").unwrap(),
            ("name".into(), json!("orders=v2"))
        );
        assert_eq!(parse_assignment("empty=").unwrap().1, json!(""));
    }

    #[test]
    fn assignment_needs_key() {
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn registry_serves_configured_types() {
        let config = ProvidersConfig {
            memory: vec!["memory".into(), "queue".into()],
            ..Default::default()
        };
        let registry = build_registry(&config);
        assert_eq!(registry.types(), vec!["local_file", "memory", "queue"]);
    }
}
