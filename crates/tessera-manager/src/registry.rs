//! Provider registry
//!
//! Maps resource type strings to providers. Built once before any planning
//! or execution and handed to the [`ResourceManager`](crate::ResourceManager);
//! it is read-only for the duration of a run.

use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{Error, Provider, Result};

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own resource type. Replaces any existing provider for that type.
    pub fn register(&mut self, provider: impl Provider + 'static) {
        let resource_type = provider.resource_type().to_string();
        self.providers.insert(resource_type, Arc::new(provider));
    }

    /// Register a shared provider under an explicit type (one provider may serve several types).
    pub fn register_as(&mut self, resource_type: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(resource_type.into(), provider);
    }

    pub fn with(mut self, provider: impl Provider + 'static) -> Self {
        self.register(provider);
        self
    }

    /// Remove a provider by type.
    pub fn remove(&mut self, resource_type: &str) -> bool {
        self.providers.remove(resource_type).is_some()
    }

    pub fn get(&self, resource_type: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(resource_type).cloned()
    }

    /// Like [`get`](Self::get), failing with [`Error::UnknownProviderType`].
    pub fn require(&self, resource_type: &str) -> Result<Arc<dyn Provider>> {
        self.get(resource_type)
            .ok_or_else(|| Error::UnknownProviderType(resource_type.to_string()))
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.providers.contains_key(resource_type)
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("types", &self.types())
            .finish()
    }
}
