//! Cached view of the runtime's workload list.
//!
//! The snapshot is refreshed on demand only. A refresh holds the write lock
//! across the runtime call, so no reader ever sees a half-replaced list and
//! refresh-then-resolve is one exclusive step.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{DockhandError, Result};
use crate::runtime::ContainerRuntime;
use crate::types::Workload;

pub struct Registry {
    runtime: Arc<dyn ContainerRuntime>,
    snapshot: RwLock<Vec<Workload>>,
}

impl Registry {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            snapshot: RwLock::new(Vec::new()),
        }
    }

    /// Replace the snapshot with a fresh listing and return it.
    ///
    /// On failure the previous snapshot is left in place, but callers must
    /// not treat it as current.
    pub async fn refresh(&self) -> Result<Vec<Workload>> {
        let mut snapshot = self.snapshot.write().await;
        match self.runtime.list_workloads().await {
            Ok(list) => {
                tracing::debug!(count = list.len(), "refreshed workload snapshot");
                *snapshot = list.clone();
                Ok(list)
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to refresh workload snapshot");
                Err(e)
            }
        }
    }

    /// Look up a workload by exact display name in the current snapshot.
    pub async fn resolve(&self, name: &str) -> Option<Workload> {
        self.snapshot
            .read()
            .await
            .iter()
            .find(|w| w.has_name(name))
            .cloned()
    }

    pub async fn find_by_id(&self, id: &str) -> Option<Workload> {
        self.snapshot
            .read()
            .await
            .iter()
            .find(|w| w.id == id)
            .cloned()
    }

    /// Refresh, then resolve `name` against the fresh listing.
    pub async fn refresh_and_resolve(&self, name: &str) -> Result<Workload> {
        self.refresh()
            .await?
            .into_iter()
            .find(|w| w.has_name(name))
            .ok_or_else(|| DockhandError::TargetNotFound(name.to_string()))
    }

    pub async fn count(&self) -> usize {
        self.snapshot.read().await.len()
    }
}
