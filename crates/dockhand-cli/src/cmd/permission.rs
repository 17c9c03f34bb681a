use crate::output::{print_json, print_section};
use dockhand_core::types::Actor;
use std::path::Path;

pub fn run(root: &Path, actor: &Actor, json: bool) -> anyhow::Result<()> {
    let orch = super::open(root)?;
    let grants = super::block_on(orch.permissions(actor))??;

    if json {
        return print_json(&grants);
    }

    if grants.is_admin {
        println!("You are an admin and have full access to all containers.");
        print_section("Available containers", &grants.start);
    } else if grants.start.is_empty() && grants.stop.is_empty() {
        println!("You do not have any permissions set.");
    } else {
        print_section("Start", &grants.start);
        print_section("Stop/Restart", &grants.stop);
    }
    Ok(())
}
