mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{admin::AdminSubcommand, grant::GrantSubcommand};
use dockhand_core::listing::ListFilter;
use dockhand_core::types::{Actor, GrantScope, Operation};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dockhand",
    about = "Permission-gated start/stop/restart/exec for Docker containers",
    version,
    propagate_version = true
)]
struct Cli {
    /// Settings root holding settings/settings.json (default: auto-detect, then cwd)
    #[arg(long, global = true, env = "DOCKHAND_SETTINGS")]
    settings: Option<PathBuf>,

    /// Id of the acting user
    #[arg(long, global = true, env = "DOCKHAND_ACTOR")]
    actor: Option<String>,

    /// Role held by the acting user (repeatable)
    #[arg(long = "role", global = true, env = "DOCKHAND_ROLES", value_delimiter = ',')]
    roles: Vec<String>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a lifecycle operation: start, stop, restart, exec, or remediate
    Docker {
        operation: Operation,
        /// Container name (not used by remediate)
        target: Option<String>,
        /// Shell command for exec
        #[arg(long)]
        cli: Option<String>,
    },

    /// List containers
    List {
        /// running, stopped, or all
        #[arg(long, default_value = "all")]
        filter: ListFilter,
    },

    /// Manage per-user grants
    User {
        #[command(subcommand)]
        subcommand: GrantSubcommand,
    },

    /// Manage per-role grants
    Role {
        #[command(subcommand)]
        subcommand: GrantSubcommand,
    },

    /// Manage admins
    Admin {
        #[command(subcommand)]
        subcommand: AdminSubcommand,
    },

    /// Show what the acting user may do
    Permission,

    /// Check the binary is responsive
    Ping,

    /// Serve the health endpoint
    Serve {
        #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3021")]
        port: u16,
    },

    /// Query a running health endpoint; exits 1 unless it reports healthy
    CheckHealth {
        #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3021")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.settings.as_deref());
    let actor = Actor::new(cli.actor.unwrap_or_default()).with_roles(cli.roles);

    let result = match cli.command {
        Commands::Docker {
            operation,
            target,
            cli: command,
        } => cmd::docker::run(
            &root,
            &actor,
            operation,
            target.as_deref(),
            command.as_deref(),
            cli.json,
        ),
        Commands::List { filter } => cmd::list::run(&root, filter, cli.json),
        Commands::User { subcommand } => {
            cmd::grant::run(&root, &actor, GrantScope::User, subcommand, cli.json)
        }
        Commands::Role { subcommand } => {
            cmd::grant::run(&root, &actor, GrantScope::Role, subcommand, cli.json)
        }
        Commands::Admin { subcommand } => cmd::admin::run(&root, &actor, subcommand, cli.json),
        Commands::Permission => cmd::permission::run(&root, &actor, cli.json),
        Commands::Ping => cmd::ping::run(cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
        Commands::CheckHealth { port } => cmd::check_health::run(port, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
