pub mod docker;
pub mod error;
pub mod executor;
pub mod io;
pub mod listing;
pub mod locks;
pub mod orchestrator;
pub mod permissions;
pub mod poller;
pub mod registry;
pub mod runtime;
pub mod saga;
pub mod settings;
pub mod types;

#[cfg(test)]
mod testing;

pub use error::{DockhandError, Result};
