//! Resource manager: the single integration point between declarative
//! resources and concrete backends.
//!
//! Ordering rules keep the stored record authoritative about whether a backend
//! resource exists:
//! - create/update: provider first, then storage
//! - delete: provider first, then storage; a provider failure keeps the record

use crate::registry::ProviderRegistry;
use std::sync::Arc;
use tessera_core::{
    CancellationToken, Error, Fields, Provider, ResourceRecord, Result, Storage, StorageError,
};
use tracing::{debug, info, warn};

pub struct ResourceManager {
    providers: ProviderRegistry,
    storage: Arc<dyn Storage>,
}

impl ResourceManager {
    pub fn new(providers: ProviderRegistry, storage: Arc<dyn Storage>) -> Self {
        Self { providers, storage }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn provider(&self, resource_type: &str) -> Result<Arc<dyn Provider>> {
        self.providers.require(resource_type)
    }

    /// Create a backend resource and persist its record.
    ///
    /// If the provider succeeds but the record cannot be saved, the backend
    /// resource exists untracked and [`Error::OrphanedResource`] is returned
    /// carrying its backend id.
    pub async fn create_resource(
        &self,
        resource_type: &str,
        args: &Fields,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<ResourceRecord> {
        let provider = self.provider(resource_type)?;

        let backend_id = provider
            .create(args, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))?;
        debug!(resource_type, backend_id = %backend_id, "provider created resource");

        let record = ResourceRecord::new(resource_type, &backend_id, args, custom_fields.clone());
        if let Err(source) = self.storage.save(&record, cancel).await {
            warn!(resource_type, backend_id = %backend_id, error = %source, "record save failed after create");
            return Err(Error::OrphanedResource {
                resource_type: resource_type.to_string(),
                backend_id,
                source,
            });
        }

        info!(resource_type, id = %record.id, backend_id = %record.backend_id, "resource created");
        Ok(record)
    }

    /// Load the stored record. Storage is the source of truth; the provider is not queried.
    pub async fn read_resource(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceRecord> {
        self.storage
            .load(resource_type, id, cancel)
            .await
            .map_err(Error::storage)
    }

    /// Live attributes from the provider for a stored resource.
    pub async fn describe_resource(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Fields> {
        let provider = self.provider(resource_type)?;
        let record = self.read_resource(resource_type, id, cancel).await?;
        provider
            .read(&record.backend_id, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))
    }

    /// Provider outputs for a backend resource.
    pub async fn resource_outputs(
        &self,
        resource_type: &str,
        backend_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Fields> {
        let provider = self.provider(resource_type)?;
        provider
            .outputs(backend_id, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))
    }

    /// Update the backend resource, then the record. The stored record is
    /// only rewritten once the provider update has succeeded.
    pub async fn update_resource(
        &self,
        resource_type: &str,
        id: &str,
        args: &Fields,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<ResourceRecord> {
        let provider = self.provider(resource_type)?;
        let mut record = self.read_resource(resource_type, id, cancel).await?;

        provider
            .update(&record.backend_id, args, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))?;

        record.apply_update(args, custom_fields.clone());
        self.storage
            .save(&record, cancel)
            .await
            .map_err(Error::storage)?;

        info!(resource_type, id, "resource updated");
        Ok(record)
    }

    /// Delete the backend resource, then its record. Deleting a resource
    /// that has no record is a no-op.
    pub async fn delete_resource(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let record = match self.storage.load(resource_type, id, cancel).await {
            Ok(record) => record,
            Err(StorageError::NotFound { .. }) => {
                debug!(resource_type, id, "delete of absent record");
                return Ok(());
            }
            Err(e) => return Err(Error::storage(e)),
        };

        let provider = self.provider(resource_type)?;
        provider
            .delete(&record.backend_id, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))?;

        self.storage
            .delete(resource_type, id, cancel)
            .await
            .map_err(Error::storage)?;

        info!(resource_type, id, backend_id = %record.backend_id, "resource deleted");
        Ok(())
    }

    /// Delete a backend resource that has no record (an orphan from a failed save).
    pub async fn discard_backend(
        &self,
        resource_type: &str,
        backend_id: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let provider = self.provider(resource_type)?;
        provider
            .delete(backend_id, cancel)
            .await
            .map_err(|e| Error::provider(resource_type, e))?;
        info!(resource_type, backend_id, "orphaned backend resource discarded");
        Ok(())
    }

    pub async fn list_resources(
        &self,
        resource_type: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        self.storage
            .list(resource_type, cancel)
            .await
            .map_err(Error::storage)
    }
}
