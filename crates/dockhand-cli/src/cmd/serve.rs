use std::path::Path;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    let orch = super::open(root)?;
    let registry = orch.registry().clone();

    super::block_on(async move {
        // Warm the snapshot; a dead engine shows up as degraded health.
        match registry.refresh().await {
            Ok(list) => tracing::info!(count = list.len(), "initial workload snapshot"),
            Err(e) => tracing::warn!(error = %e, "runtime not reachable at startup"),
        }
        dockhand_server::serve(registry, port).await
    })?
}
