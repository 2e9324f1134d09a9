//! Execution engine: drives a resolved plan through the resource manager.
//!
//! Sequential mode walks the creation order. Concurrent mode runs a ready-set
//! scheduler: a resource is admitted once every dependency has been created,
//! one spawned task per admitted resource, capped by `max_concurrency`.
//!
//! Either way the first failure (or cancellation) stops the run and everything
//! it created is removed in reverse creation order, dependents first.

use crate::config::{EngineConfig, ExecutionMode};
use crate::error::ExecuteError;
use crate::report::{CreatedResource, RollbackFailure, RollbackReport, RunReport, RunState};
use crate::substitute;
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tessera_core::{CancellationToken, Error, Fields, Resource};
use tessera_graph::{Plan, PlannedNode};
use tessera_manager::ResourceManager;
use tracing::{debug, error, info, warn};

/// Outputs of completed resources, keyed by declarative id. Written by the
/// task that created the resource, read by dependents during substitution.
type Results = Arc<DashMap<String, Fields>>;

/// Something a rollback has to remove.
#[derive(Clone, Debug)]
enum Cleanup {
    /// A created resource with a stored record.
    Record {
        resource_id: String,
        resource_type: String,
        record_id: String,
    },
    /// A backend resource whose record was never saved.
    Orphan {
        resource_id: String,
        resource_type: String,
        backend_id: String,
    },
}

impl Cleanup {
    fn resource_id(&self) -> &str {
        match self {
            Self::Record { resource_id, .. } | Self::Orphan { resource_id, .. } => resource_id,
        }
    }
}

struct NodeFailure {
    error: Error,
    cleanup: Option<Cleanup>,
}

impl From<Error> for NodeFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            cleanup: None,
        }
    }
}

pub struct Engine {
    manager: Arc<ResourceManager>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(manager: Arc<ResourceManager>, config: EngineConfig) -> Self {
        Self { manager, config }
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve `resources` into a plan. No backend is touched.
    pub fn plan(&self, resources: impl IntoIterator<Item = Resource>) -> tessera_core::Result<Plan> {
        let plan = tessera_graph::plan(resources)?;
        for node in plan.nodes() {
            for reference in substitute::undeclared_references(&node.resource, &node.dependencies) {
                warn!(
                    resource = node.id(),
                    %reference,
                    "argument references a resource that is not a declared dependency"
                );
            }
        }
        Ok(plan)
    }

    /// Plan and execute in the configured mode.
    pub async fn apply(
        &self,
        resources: impl IntoIterator<Item = Resource>,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ExecuteError> {
        let plan = self.plan(resources).map_err(ExecuteError::Planning)?;
        self.execute(&plan, self.config.mode, custom_fields, cancel)
            .await
    }

    /// Create every resource in `plan`. On success all of them exist and are
    /// recorded; on failure the run has attempted to remove everything it created.
    pub async fn execute(
        &self,
        plan: &Plan,
        mode: ExecutionMode,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ExecuteError> {
        let mut report = RunReport::new(mode);
        report.start();
        info!(run_id = %report.run_id, %mode, resources = plan.len(), "run started");

        let outcome = match mode {
            ExecutionMode::Sequential => {
                self.execute_sequential(plan, custom_fields, cancel).await
            }
            ExecutionMode::Concurrent => {
                self.execute_concurrent(plan, custom_fields, cancel).await
            }
        };

        match outcome {
            Ok(resources) => {
                report.resources = resources;
                report.finalize(RunState::Succeeded);
                info!("{}", report.summary_line());
                Ok(report)
            }
            Err(e) => {
                report.finalize(RunState::Failed);
                error!(run_id = %report.run_id, error = %e, "run failed");
                Err(e)
            }
        }
    }

    async fn execute_sequential(
        &self,
        plan: &Plan,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<Vec<CreatedResource>, ExecuteError> {
        let results: Results = Arc::new(DashMap::new());
        let mut created = Vec::with_capacity(plan.len());
        let mut cleanups = Vec::with_capacity(plan.len());

        for node in plan.nodes() {
            if cancel.is_cancelled() {
                info!(next = %node.id(), "run cancelled, stopping before next resource");
                let rollback = self.rollback(plan, cleanups).await;
                return Err(ExecuteError::Cancelled { rollback });
            }

            match realize_node(&self.manager, node, &results, custom_fields, cancel).await {
                Ok(resource) => {
                    cleanups.push(record_cleanup(&resource));
                    created.push(resource);
                }
                Err(failure) => {
                    cleanups.extend(failure.cleanup);
                    let rollback = self.rollback(plan, cleanups).await;
                    return Err(classify(node.id(), failure.error, rollback, Vec::new()));
                }
            }
        }

        Ok(created)
    }

    async fn execute_concurrent(
        &self,
        plan: &Plan,
        custom_fields: &Fields,
        cancel: &CancellationToken,
    ) -> Result<Vec<CreatedResource>, ExecuteError> {
        let results: Results = Arc::new(DashMap::new());
        let limit = self.config.admission_limit();

        let mut remaining: HashMap<&str, usize> = plan
            .nodes()
            .iter()
            .map(|n| (n.id(), n.dependencies.len()))
            .collect();
        let mut ready: VecDeque<&PlannedNode> = plan
            .nodes()
            .iter()
            .filter(|n| n.dependencies.is_empty())
            .collect();

        let mut in_flight = FuturesUnordered::new();
        let mut created: Vec<CreatedResource> = Vec::with_capacity(plan.len());
        let mut cleanups: Vec<Cleanup> = Vec::new();
        let mut first_failure: Option<(String, Error)> = None;
        let mut additional_failures: Vec<(String, Error)> = Vec::new();
        let mut cancelled = false;

        loop {
            // Admission stops for good once anything has gone wrong.
            while first_failure.is_none() && !cancelled && in_flight.len() < limit {
                if cancel.is_cancelled() {
                    info!("run cancelled, no further resources admitted");
                    cancelled = true;
                    break;
                }
                let Some(node) = ready.pop_front() else {
                    break;
                };
                debug!(id = %node.id(), in_flight = in_flight.len() + 1, "admitting resource");

                let manager = self.manager.clone();
                let task_node = node.clone();
                let task_results = results.clone();
                let custom = custom_fields.clone();
                let token = cancel.clone();
                let handle = tokio::spawn(async move {
                    realize_node(&manager, &task_node, &task_results, &custom, &token).await
                });
                let id = node.id().to_string();
                in_flight.push(async move { (id, handle.await) });
            }

            let Some((id, joined)) = in_flight.next().await else {
                break;
            };

            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => Err(NodeFailure::from(Error::Internal(format!(
                    "task for '{}' did not complete: {}",
                    id, e
                )))),
            };

            match outcome {
                Ok(resource) => {
                    cleanups.push(record_cleanup(&resource));
                    created.push(resource);
                    if let Some(node) = plan.get(&id) {
                        for dependent in &node.dependents {
                            if let Some(count) = remaining.get_mut(dependent.as_str()) {
                                *count -= 1;
                                if *count == 0 {
                                    if let Some(next) = plan.get(dependent) {
                                        ready.push_back(next);
                                    }
                                }
                            }
                        }
                    }
                }
                Err(failure) => {
                    cleanups.extend(failure.cleanup);
                    if failure.error.is_cancelled() {
                        debug!(%id, "resource creation cancelled");
                        cancelled = true;
                    } else if first_failure.is_none() {
                        warn!(%id, error = %failure.error, "resource creation failed, draining in-flight tasks");
                        first_failure = Some((id, failure.error));
                    } else {
                        warn!(%id, error = %failure.error, "additional failure while draining");
                        additional_failures.push((id, failure.error));
                    }
                }
            }
        }

        if let Some((resource_id, source)) = first_failure {
            let rollback = self.rollback(plan, cleanups).await;
            return Err(ExecuteError::CreationFailed {
                resource_id,
                source,
                rollback,
                additional_failures,
            });
        }
        if cancelled {
            let rollback = self.rollback(plan, cleanups).await;
            return Err(ExecuteError::Cancelled { rollback });
        }
        if created.len() != plan.len() {
            // A resolved plan is acyclic, so every node becomes ready eventually.
            let stuck = plan
                .nodes()
                .iter()
                .find(|n| !created.iter().any(|c| c.id == n.id()))
                .map(|n| n.id().to_string())
                .unwrap_or_default();
            let rollback = self.rollback(plan, cleanups).await;
            return Err(ExecuteError::CreationFailed {
                resource_id: stuck.clone(),
                source: Error::Internal(format!("'{}' never became ready", stuck)),
                rollback,
                additional_failures,
            });
        }

        created.sort_by_key(|c| plan.position(&c.id).unwrap_or(usize::MAX));
        Ok(created)
    }

    /// Remove everything in `cleanups`, later plan positions first so a
    /// dependent always goes before what it depends on.
    ///
    /// Runs under a fresh token: a cancelled run still gets cleaned up.
    /// Failures are collected, never fatal.
    async fn rollback(&self, plan: &Plan, mut cleanups: Vec<Cleanup>) -> RollbackReport {
        cleanups.sort_by_key(|c| std::cmp::Reverse(plan.position(c.resource_id())));
        let cancel = CancellationToken::new();
        let mut report = RollbackReport::default();

        if !cleanups.is_empty() {
            info!(count = cleanups.len(), "rolling back created resources");
        }

        for cleanup in cleanups {
            let result = match &cleanup {
                Cleanup::Record {
                    resource_type,
                    record_id,
                    ..
                } => {
                    self.manager
                        .delete_resource(resource_type, record_id, &cancel)
                        .await
                }
                Cleanup::Orphan {
                    resource_type,
                    backend_id,
                    ..
                } => {
                    self.manager
                        .discard_backend(resource_type, backend_id, &cancel)
                        .await
                }
            };

            match (result, cleanup) {
                (Ok(()), cleanup) => {
                    debug!(id = %cleanup.resource_id(), "rolled back");
                    report.deleted.push(cleanup.resource_id().to_string());
                }
                (Err(e), cleanup) => {
                    error!(id = %cleanup.resource_id(), error = %e, "rollback step failed");
                    let (resource_id, resource_type, backend_id) = match cleanup {
                        Cleanup::Record {
                            resource_id,
                            resource_type,
                            ..
                        } => (resource_id, resource_type, None),
                        Cleanup::Orphan {
                            resource_id,
                            resource_type,
                            backend_id,
                        } => (resource_id, resource_type, Some(backend_id)),
                    };
                    report.failures.push(RollbackFailure {
                        resource_id,
                        resource_type,
                        backend_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

fn record_cleanup(resource: &CreatedResource) -> Cleanup {
    Cleanup::Record {
        resource_id: resource.id.clone(),
        resource_type: resource.record.resource_type.clone(),
        record_id: resource.record.id.clone(),
    }
}

fn classify(
    resource_id: &str,
    error: Error,
    rollback: RollbackReport,
    additional_failures: Vec<(String, Error)>,
) -> ExecuteError {
    if error.is_cancelled() {
        ExecuteError::Cancelled { rollback }
    } else {
        ExecuteError::CreationFailed {
            resource_id: resource_id.to_string(),
            source: error,
            rollback,
            additional_failures,
        }
    }
}

/// Create one resource: resolve its arguments, create it, then fetch its
/// outputs into the shared results table.
///
/// On failure the returned cleanup names whatever already exists on the
/// backend for this node.
async fn realize_node(
    manager: &ResourceManager,
    node: &PlannedNode,
    results: &DashMap<String, Fields>,
    custom_fields: &Fields,
    cancel: &CancellationToken,
) -> Result<CreatedResource, NodeFailure> {
    let resource = &node.resource;
    let args = substitute::resolve_args(resource, &node.dependencies, results)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled.into());
    }

    debug!(id = %resource.id, resource_type = %resource.resource_type, "creating resource");
    let record = match manager
        .create_resource(&resource.resource_type, &args, custom_fields, cancel)
        .await
    {
        Ok(record) => record,
        Err(Error::OrphanedResource {
            resource_type,
            backend_id,
            source,
        }) => {
            let cleanup = Cleanup::Orphan {
                resource_id: resource.id.clone(),
                resource_type: resource_type.clone(),
                backend_id: backend_id.clone(),
            };
            return Err(NodeFailure {
                error: Error::OrphanedResource {
                    resource_type,
                    backend_id,
                    source,
                },
                cleanup: Some(cleanup),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let cleanup = Cleanup::Record {
        resource_id: resource.id.clone(),
        resource_type: record.resource_type.clone(),
        record_id: record.id.clone(),
    };
    let outputs = match manager
        .resource_outputs(&resource.resource_type, &record.backend_id, cancel)
        .await
    {
        Ok(outputs) => outputs,
        Err(error) => {
            return Err(NodeFailure {
                error,
                cleanup: Some(cleanup),
            })
        }
    };

    results.insert(resource.id.clone(), outputs.clone());
    info!(id = %resource.id, backend_id = %record.backend_id, "resource ready");
    Ok(CreatedResource {
        id: resource.id.clone(),
        record,
        outputs,
    })
}
