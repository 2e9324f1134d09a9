use dashmap::DashMap;
use tessera_core::{CancellationToken, ResourceRecord, Storage, StorageError, StorageResult};

/// Records held in a concurrent map keyed by `(type, id)`. Lost on drop.
#[derive(Default)]
pub struct MemoryStorage {
    records: DashMap<(String, String), ResourceRecord>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn check(cancel: &CancellationToken) -> StorageResult<()> {
    if cancel.is_cancelled() {
        Err(StorageError::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, record: &ResourceRecord, cancel: &CancellationToken) -> StorageResult<()> {
        check(cancel)?;
        self.records.insert(
            (record.resource_type.clone(), record.id.clone()),
            record.clone(),
        );
        Ok(())
    }

    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<ResourceRecord> {
        check(cancel)?;
        self.records
            .get(&(resource_type.to_string(), id.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| StorageError::not_found(resource_type, id))
    }

    async fn delete(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        check(cancel)?;
        self.records
            .remove(&(resource_type.to_string(), id.to_string()));
        Ok(())
    }

    async fn list(
        &self,
        resource_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>> {
        check(cancel)?;
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == resource_type)
            .map(|entry| entry.key().1.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
