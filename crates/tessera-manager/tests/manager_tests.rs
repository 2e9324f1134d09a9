//! Tests for tessera-manager: ProviderRegistry, ResourceManager, and both storage backends

use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::*;
use tessera_manager::*;
use tokio::sync::Mutex;

// ===========================================================================
// Fixtures
// ===========================================================================

/// Provider that records every call and fails on demand.
#[derive(Default)]
struct RecordingProvider {
    calls: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
    fail_delete: AtomicBool,
}

impl RecordingProvider {
    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Provider for RecordingProvider {
    fn resource_type(&self) -> &str {
        "test_topic"
    }

    async fn create(&self, args: &Fields, _cancel: &CancellationToken) -> ProviderResult<String> {
        let name = args.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        self.calls.lock().await.push(format!("create:{}", name));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("backend down".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("arn:test:{}", n))
    }

    async fn read(&self, backend_id: &str, _cancel: &CancellationToken) -> ProviderResult<Fields> {
        self.calls.lock().await.push(format!("read:{}", backend_id));
        let mut fields = Fields::new();
        fields.insert("arn".into(), json!(backend_id));
        Ok(fields)
    }

    async fn update(
        &self,
        backend_id: &str,
        _args: &Fields,
        _cancel: &CancellationToken,
    ) -> ProviderResult<()> {
        self.calls.lock().await.push(format!("update:{}", backend_id));
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(ProviderError::Conflict("locked".into()));
        }
        Ok(())
    }

    async fn delete(&self, backend_id: &str, _cancel: &CancellationToken) -> ProviderResult<()> {
        self.calls.lock().await.push(format!("delete:{}", backend_id));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("backend down".into()));
        }
        Ok(())
    }

    async fn outputs(&self, backend_id: &str, _cancel: &CancellationToken) -> ProviderResult<Fields> {
        let mut fields = Fields::new();
        fields.insert("arn".into(), json!(backend_id));
        Ok(fields)
    }
}

/// Storage whose saves can be switched off.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_save: AtomicBool,
}

#[async_trait::async_trait]
impl Storage for FlakyStorage {
    async fn save(&self, record: &ResourceRecord, cancel: &CancellationToken) -> StorageResult<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        self.inner.save(record, cancel).await
    }
    async fn load(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<ResourceRecord> {
        self.inner.load(resource_type, id, cancel).await
    }
    async fn delete(
        &self,
        resource_type: &str,
        id: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        self.inner.delete(resource_type, id, cancel).await
    }
    async fn list(
        &self,
        resource_type: &str,
        cancel: &CancellationToken,
    ) -> StorageResult<Vec<String>> {
        self.inner.list(resource_type, cancel).await
    }
}

struct Harness {
    provider: Arc<RecordingProvider>,
    storage: Arc<FlakyStorage>,
    manager: ResourceManager,
}

fn harness() -> Harness {
    let provider = Arc::new(RecordingProvider::default());
    let storage = Arc::new(FlakyStorage::default());
    let mut registry = ProviderRegistry::new();
    registry.register_as("test_topic", provider.clone());
    let manager = ResourceManager::new(registry, storage.clone());
    Harness {
        provider,
        storage,
        manager,
    }
}

fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn token() -> CancellationToken {
    CancellationToken::new()
}

// ===========================================================================
// ProviderRegistry
// ===========================================================================

#[test]
fn registry_default_is_empty() {
    let reg = ProviderRegistry::new();
    assert!(reg.is_empty());
    assert!(reg.get("anything").is_none());
}

#[test]
fn registry_require_unknown_type() {
    let reg = ProviderRegistry::new();
    match reg.require("aws_sns_topic") {
        Err(Error::UnknownProviderType(t)) => assert_eq!(t, "aws_sns_topic"),
        _ => panic!("expected UnknownProviderType"),
    }
}

#[test]
fn registry_register_as_aliases() {
    let provider: Arc<dyn Provider> = Arc::new(RecordingProvider::default());
    let mut reg = ProviderRegistry::new();
    reg.register_as("queue", provider.clone());
    reg.register_as("topic", provider);
    assert_eq!(reg.types(), vec!["queue", "topic"]);
    assert!(reg.remove("queue"));
    assert!(!reg.contains("queue"));
    assert_eq!(reg.len(), 1);
}

// ===========================================================================
// create / read
// ===========================================================================

#[tokio::test]
async fn create_persists_record() {
    let h = harness();
    let custom = fields(json!({"team": "infra"}));
    let rec = h
        .manager
        .create_resource(
            "test_topic",
            &fields(json!({"name": "orders", "label": "Orders"})),
            &custom,
            &token(),
        )
        .await
        .unwrap();

    assert_eq!(rec.backend_id, "arn:test:0");
    assert_eq!(rec.name, "orders");
    assert_eq!(rec.label, "Orders");
    assert_eq!(rec.custom_fields, custom);

    let loaded = h
        .manager
        .read_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert_eq!(loaded, rec);
}

#[tokio::test]
async fn create_unknown_type_touches_nothing() {
    let h = harness();
    let err = h
        .manager
        .create_resource("nope", &Fields::new(), &Fields::new(), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownProviderType(_)));
    assert!(h.provider.calls().await.is_empty());
    assert!(h.storage.inner.is_empty());
}

#[tokio::test]
async fn create_provider_failure_persists_nothing() {
    let h = harness();
    h.provider.fail_create.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));
    assert!(h.storage.inner.is_empty());
}

#[tokio::test]
async fn create_save_failure_is_orphaned_resource() {
    let h = harness();
    h.storage.fail_save.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap_err();
    match err {
        Error::OrphanedResource {
            resource_type,
            backend_id,
            ..
        } => {
            assert_eq!(resource_type, "test_topic");
            assert_eq!(backend_id, "arn:test:0");
        }
        other => panic!("expected OrphanedResource, got {:?}", other),
    }
}

#[tokio::test]
async fn read_missing_is_not_found() {
    let h = harness();
    let err = h
        .manager
        .read_resource("test_topic", "missing", &token())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::NotFound { .. })));
}

#[tokio::test]
async fn describe_reads_through_provider() {
    let h = harness();
    let rec = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap();
    let live = h
        .manager
        .describe_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert_eq!(live["arn"], json!(rec.backend_id));
    assert!(h
        .provider
        .calls()
        .await
        .contains(&format!("read:{}", rec.backend_id)));
}

// ===========================================================================
// update
// ===========================================================================

#[tokio::test]
async fn update_rewrites_mutable_fields() {
    let h = harness();
    let rec = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "v1"})), &Fields::new(), &token())
        .await
        .unwrap();

    let updated = h
        .manager
        .update_resource(
            "test_topic",
            &rec.id,
            &fields(json!({"name": "v2", "label": "L"})),
            &fields(json!({"rev": 2})),
            &token(),
        )
        .await
        .unwrap();

    assert_eq!(updated.id, rec.id);
    assert_eq!(updated.backend_id, rec.backend_id);
    assert_eq!(updated.created_at, rec.created_at);
    assert!(updated.updated_at >= rec.updated_at);
    assert_eq!(updated.name, "v2");

    let loaded = h
        .manager
        .read_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert_eq!(loaded, updated);
    assert!(h
        .provider
        .calls()
        .await
        .contains(&format!("update:{}", rec.backend_id)));
}

#[tokio::test]
async fn update_provider_failure_leaves_record_untouched() {
    let h = harness();
    let rec = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "v1"})), &Fields::new(), &token())
        .await
        .unwrap();
    h.provider.fail_update.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .update_resource(
            "test_topic",
            &rec.id,
            &fields(json!({"name": "v2"})),
            &Fields::new(),
            &token(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider { .. }));

    let loaded = h
        .manager
        .read_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert_eq!(loaded, rec);
}

// ===========================================================================
// delete
// ===========================================================================

#[tokio::test]
async fn delete_removes_backend_then_record() {
    let h = harness();
    let rec = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap();
    h.manager
        .delete_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();

    assert!(h
        .provider
        .calls()
        .await
        .contains(&format!("delete:{}", rec.backend_id)));
    assert!(h
        .manager
        .list_resources("test_topic", &token())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn delete_absent_is_noop() {
    let h = harness();
    h.manager
        .delete_resource("test_topic", "never-created", &token())
        .await
        .unwrap();
    assert!(h.provider.calls().await.is_empty());
}

#[tokio::test]
async fn delete_provider_failure_keeps_record() {
    let h = harness();
    let rec = h
        .manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap();
    h.provider.fail_delete.store(true, Ordering::SeqCst);

    assert!(h
        .manager
        .delete_resource("test_topic", &rec.id, &token())
        .await
        .is_err());
    let still_there = h
        .manager
        .read_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert_eq!(still_there.backend_id, rec.backend_id);
}

#[tokio::test]
async fn discard_backend_calls_provider_only() {
    let h = harness();
    h.manager
        .discard_backend("test_topic", "arn:orphan", &token())
        .await
        .unwrap();
    assert_eq!(h.provider.calls().await, vec!["delete:arn:orphan"]);
}

// ===========================================================================
// Storage backends
// ===========================================================================

fn sample_record(resource_type: &str) -> ResourceRecord {
    ResourceRecord::new(
        resource_type,
        "backend-1",
        &fields(json!({"name": "n", "label": "l"})),
        fields(json!({"nested": {"k": [1, 2, 3]}})),
    )
}

#[tokio::test]
async fn memory_storage_roundtrip_and_list() {
    let storage = MemoryStorage::new();
    let a = sample_record("alpha");
    let b = sample_record("beta");
    storage.save(&a, &token()).await.unwrap();
    storage.save(&b, &token()).await.unwrap();

    assert_eq!(storage.load("alpha", &a.id, &token()).await.unwrap(), a);
    assert_eq!(storage.list("alpha", &token()).await.unwrap(), vec![a.id.clone()]);
    assert!(storage.list("gamma", &token()).await.unwrap().is_empty());

    storage.delete("alpha", &a.id, &token()).await.unwrap();
    storage.delete("alpha", &a.id, &token()).await.unwrap();
    assert!(storage
        .load("alpha", &a.id, &token())
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn memory_storage_respects_cancellation() {
    let storage = MemoryStorage::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = storage.save(&sample_record("alpha"), &cancel).await.unwrap_err();
    assert!(matches!(err, StorageError::Cancelled));
    assert!(storage.is_empty());
}

#[tokio::test]
async fn fs_storage_roundtrip() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(tmp.path());
    let rec = sample_record("alpha");

    storage.save(&rec, &token()).await.unwrap();
    assert!(tmp
        .path()
        .join("alpha")
        .join(format!("{}.json", rec.id))
        .exists());

    let loaded = storage.load("alpha", &rec.id, &token()).await.unwrap();
    assert_eq!(loaded, rec);
    assert_eq!(loaded.created_at, rec.created_at);
    assert_eq!(loaded.updated_at, rec.updated_at);
}

#[tokio::test]
async fn fs_storage_list_and_delete() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(tmp.path());
    let mut ids = Vec::new();
    for _ in 0..3 {
        let rec = sample_record("alpha");
        storage.save(&rec, &token()).await.unwrap();
        ids.push(rec.id);
    }
    ids.sort();
    assert_eq!(storage.list("alpha", &token()).await.unwrap(), ids);
    assert!(storage.list("unknown", &token()).await.unwrap().is_empty());

    storage.delete("alpha", &ids[0], &token()).await.unwrap();
    storage.delete("alpha", &ids[0], &token()).await.unwrap();
    assert_eq!(storage.list("alpha", &token()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn fs_storage_missing_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(tmp.path());
    let err = storage.load("alpha", "nope", &token()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn manager_over_fs_storage() {
    let tmp = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::default());
    let mut registry = ProviderRegistry::new();
    registry.register_as("test_topic", provider.clone());
    let manager = ResourceManager::new(registry, Arc::new(FsStorage::new(tmp.path())));
    let rec = manager
        .create_resource("test_topic", &fields(json!({"name": "x"})), &Fields::new(), &token())
        .await
        .unwrap();
    assert_eq!(
        manager.list_resources("test_topic", &token()).await.unwrap(),
        vec![rec.id.clone()]
    );
    manager
        .delete_resource("test_topic", &rec.id, &token())
        .await
        .unwrap();
    assert!(manager
        .list_resources("test_topic", &token())
        .await
        .unwrap()
        .is_empty());
}
