use crate::output::print_json;
use clap::Subcommand;
use dockhand_core::types::Actor;
use std::path::Path;

#[derive(Subcommand)]
pub enum AdminSubcommand {
    /// Make a user an admin
    Add { user: String },
    /// Remove a user from the admins
    Remove { user: String },
    /// List admins
    List,
}

pub fn run(root: &Path, actor: &Actor, subcommand: AdminSubcommand, json: bool) -> anyhow::Result<()> {
    let orch = super::open(root)?;

    match subcommand {
        AdminSubcommand::Add { user } => {
            let added = orch.add_admin(actor, &user)?;
            if json {
                print_json(&serde_json::json!({ "user": user, "changed": added }))?;
            } else if added {
                println!("Added {user} to admin list successfully.");
            } else {
                println!("User {user} is already an admin.");
            }
        }
        AdminSubcommand::Remove { user } => {
            let removed = orch.remove_admin(actor, &user)?;
            if json {
                print_json(&serde_json::json!({ "user": user, "changed": removed }))?;
            } else if removed {
                println!("Removed {user} from admin list successfully.");
            } else {
                println!("User {user} is not an admin.");
            }
        }
        AdminSubcommand::List => {
            let admins = orch.admins()?;
            if json {
                print_json(&admins)?;
            } else if admins.is_empty() {
                println!("No admins are configured.");
            } else {
                println!("Admin users:");
                for id in admins {
                    println!("  {id}");
                }
            }
        }
    }
    Ok(())
}
