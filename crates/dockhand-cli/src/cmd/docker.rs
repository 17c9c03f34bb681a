use crate::output::print_json;
use dockhand_core::types::{Actor, Operation};
use std::path::Path;

pub fn run(
    root: &Path,
    actor: &Actor,
    operation: Operation,
    target: Option<&str>,
    command: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let orch = super::open(root)?;
    orch.authorize_request(actor, operation, target, command)?;

    if !json {
        match operation {
            Operation::Remediate => eprintln!(
                "Starting {} process. This may take several minutes...",
                orch.plan().group.name
            ),
            Operation::Start | Operation::Stop | Operation::Restart => eprintln!(
                "Command sent. Confirming for up to {} seconds...",
                orch.policy().budget().as_secs()
            ),
            Operation::Exec => {}
        }
    }

    let outcome = super::block_on(orch.run_operation(actor, operation, target, command))??;

    if json {
        print_json(&outcome)?;
    } else {
        println!("{outcome}");
    }
    Ok(())
}
