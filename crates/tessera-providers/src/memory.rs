//! In-process provider: backend state lives in a concurrent map.
//!
//! Useful for dry runs and for exercising plans without touching real
//! infrastructure. An optional simulated latency makes concurrency visible.

use dashmap::DashMap;
use serde_json::{json, Value};
use std::time::Duration;
use tessera_core::{CancellationToken, Fields, Provider, ProviderError, ProviderResult};

pub struct MemoryProvider {
    resource_type: String,
    resources: DashMap<String, Fields>,
    latency: Option<Duration>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryProvider {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resources: DashMap::new(),
            latency: None,
        }
    }

    /// Delay every call by `latency`, abandoning the call if the run is cancelled meanwhile.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of live backend resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, backend_id: &str) -> bool {
        self.resources.contains_key(backend_id)
    }

    async fn wait(&self, cancel: &CancellationToken) -> ProviderResult<()> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        if let Some(latency) = self.latency {
            tokio::select! {
                _ = tokio::time::sleep(latency) => {}
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            }
        }
        Ok(())
    }

    fn lookup(&self, backend_id: &str) -> ProviderResult<Fields> {
        self.resources
            .get(backend_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ProviderError::NotFound(backend_id.to_string()))
    }
}

#[async_trait::async_trait]
impl Provider for MemoryProvider {
    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    async fn create(&self, args: &Fields, cancel: &CancellationToken) -> ProviderResult<String> {
        self.wait(cancel).await?;
        let backend_id = format!("{}-{}", self.resource_type, uuid::Uuid::new_v4());
        self.resources.insert(backend_id.clone(), args.clone());
        tracing::debug!(backend_id = %backend_id, "memory resource created");
        Ok(backend_id)
    }

    async fn read(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<Fields> {
        self.wait(cancel).await?;
        let mut fields = self.lookup(backend_id)?;
        fields.insert("id".into(), json!(backend_id));
        Ok(fields)
    }

    async fn update(
        &self,
        backend_id: &str,
        args: &Fields,
        cancel: &CancellationToken,
    ) -> ProviderResult<()> {
        self.wait(cancel).await?;
        match self.resources.get_mut(backend_id) {
            Some(mut entry) => {
                *entry = args.clone();
                Ok(())
            }
            None => Err(ProviderError::NotFound(backend_id.to_string())),
        }
    }

    async fn delete(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<()> {
        self.wait(cancel).await?;
        self.resources
            .remove(backend_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(backend_id.to_string()))
    }

    /// The backend id plus every argument the resource was created with.
    async fn outputs(&self, backend_id: &str, cancel: &CancellationToken) -> ProviderResult<Fields> {
        self.wait(cancel).await?;
        let mut outputs = self.lookup(backend_id)?;
        outputs.insert("id".into(), Value::String(backend_id.to_string()));
        Ok(outputs)
    }
}
