use crate::output::{print_json, print_section};
use clap::Subcommand;
use dockhand_core::types::{Actor, GrantScope, PermissionClass};
use std::path::Path;

#[derive(Subcommand)]
pub enum GrantSubcommand {
    /// Grant a permission on a container (the container must exist)
    Add {
        subject: String,
        container: String,
        /// start, or stop (also covers restart and exec)
        #[arg(long, short)]
        permission: PermissionClass,
    },
    /// Revoke a permission on a container
    Remove {
        subject: String,
        container: String,
        #[arg(long, short)]
        permission: PermissionClass,
    },
    /// List the grants held by one user or role
    List { subject: String },
}

pub fn run(
    root: &Path,
    actor: &Actor,
    scope: GrantScope,
    subcommand: GrantSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let orch = super::open(root)?;

    match subcommand {
        GrantSubcommand::Add {
            subject,
            container,
            permission,
        } => {
            let added =
                super::block_on(orch.grant(actor, &subject, &container, permission, scope))??;
            if json {
                print_json(&serde_json::json!({
                    "subject": subject,
                    "container": container,
                    "permission": permission,
                    "changed": added,
                }))?;
            } else if added {
                println!("Added {permission} permission for {subject} on container {container}.");
            } else {
                println!("{subject} already has {permission} permission on container {container}.");
            }
        }
        GrantSubcommand::Remove {
            subject,
            container,
            permission,
        } => {
            let removed = orch.revoke(actor, &subject, &container, permission, scope)?;
            if json {
                print_json(&serde_json::json!({
                    "subject": subject,
                    "container": container,
                    "permission": permission,
                    "changed": removed,
                }))?;
            } else if removed {
                println!("Removed {permission} permission for {subject} on container {container}.");
            } else {
                println!("{subject} has no {permission} permission on container {container}.");
            }
        }
        GrantSubcommand::List { subject } => {
            let grants = orch.grants_for(&subject, scope)?;
            if json {
                return print_json(&grants);
            }
            println!("Permissions for {subject}:");
            if grants.is_empty() {
                println!("No permissions configured.");
            }
            print_section("Start", &grants.start);
            print_section("Stop/Restart", &grants.stop);
        }
    }
    Ok(())
}

