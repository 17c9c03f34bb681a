//! Issues single lifecycle calls against a resolved workload.
//!
//! The executor reports what the runtime said about the call itself. Whether
//! the workload actually reached the intended state is the poller's job.

use std::sync::Arc;

use crate::error::Result;
use crate::registry::Registry;
use crate::runtime::ContainerRuntime;
use crate::types::Workload;

/// Commands run through `bash -c` so pipes and quoting behave as typed.
const EXEC_SHELL: [&str; 2] = ["bash", "-c"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Nothing was sent to the runtime.
    AlreadyRunning,
    /// Start was issued; `running` is the state seen right after the call,
    /// which may not have settled yet.
    Issued { running: bool },
}

pub struct Executor {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<Registry>,
}

impl Executor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, registry: Arc<Registry>) -> Self {
        Self { runtime, registry }
    }

    pub async fn start(&self, workload: &Workload) -> Result<StartOutcome> {
        let name = workload.display_name();
        if workload.is_running() {
            tracing::info!(workload = %name, "already running, start skipped");
            return Ok(StartOutcome::AlreadyRunning);
        }

        tracing::info!(workload = %name, state = %workload.state, "starting");
        self.runtime.start(&workload.id).await.inspect_err(|e| {
            tracing::warn!(workload = %name, error = %e, "start failed");
        })?;

        let running = self
            .rewarm(&workload.id)
            .await
            .is_some_and(|w| w.is_running());
        Ok(StartOutcome::Issued { running })
    }

    pub async fn stop(&self, workload: &Workload) -> Result<()> {
        let name = workload.display_name();
        tracing::info!(workload = %name, "stopping");
        self.runtime.stop(&workload.id).await.inspect_err(|e| {
            tracing::warn!(workload = %name, error = %e, "stop failed");
        })?;
        self.rewarm(&workload.id).await;
        Ok(())
    }

    pub async fn restart(&self, workload: &Workload) -> Result<()> {
        let name = workload.display_name();
        tracing::info!(workload = %name, "restarting");
        self.runtime.restart(&workload.id).await.inspect_err(|e| {
            tracing::warn!(workload = %name, error = %e, "restart failed");
        })?;
        self.rewarm(&workload.id).await;
        Ok(())
    }

    /// Run `command` in the workload and return its combined output.
    ///
    /// Never fails: a missing workload or a failed exec session comes back
    /// as an `Error: ...` text so the caller always has something to show.
    pub async fn exec(&self, workload: &Workload, command: &str) -> String {
        let argv: Vec<String> = EXEC_SHELL
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(command.to_string()))
            .collect();

        tracing::info!(workload = %workload.display_name(), "executing command");
        match self.runtime.exec(&workload.id, &argv).await {
            Ok(output) => output.render(),
            Err(e) => {
                tracing::warn!(
                    workload = %workload.display_name(),
                    error = %e,
                    "exec failed"
                );
                format!("Error: {e}")
            }
        }
    }

    /// The one post-command refresh that keeps the snapshot warm. A failed
    /// refresh does not turn a successful call into a failure.
    async fn rewarm(&self, id: &str) -> Option<Workload> {
        match self.registry.refresh().await {
            Ok(list) => list.into_iter().find(|w| w.id == id),
            Err(_) => None,
        }
    }
}
