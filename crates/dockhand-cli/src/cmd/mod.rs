pub mod admin;
pub mod check_health;
pub mod docker;
pub mod grant;
pub mod list;
pub mod permission;
pub mod ping;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use dockhand_core::docker::DockerRuntime;
use dockhand_core::orchestrator::Orchestrator;
use dockhand_core::settings::{FileSettingsStore, SettingsStore};

/// Load settings under `root` and build an orchestrator on the Docker
/// runtime. No engine request is made until a command needs one.
pub fn open(root: &Path) -> anyhow::Result<Orchestrator> {
    let store = FileSettingsStore::new(root);
    let settings = store
        .load()
        .with_context(|| format!("loading {}", store.path().display()))?;
    let runtime = DockerRuntime::new(settings.docker_settings.socket_path.as_deref());
    Ok(Orchestrator::new(Arc::new(runtime), Arc::new(store))?)
}

pub fn block_on<F: std::future::Future>(future: F) -> anyhow::Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(future))
}
