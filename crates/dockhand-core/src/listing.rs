use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::DockhandError;
use crate::types::Workload;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    Running,
    /// Everything not running, including created and paused.
    Stopped,
    #[default]
    All,
}

impl ListFilter {
    pub fn matches(self, workload: &Workload) -> bool {
        match self {
            Self::Running => workload.is_running(),
            Self::Stopped => !workload.is_running(),
            Self::All => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::All => "all",
        }
    }

    pub fn empty_message(self) -> String {
        match self {
            Self::All => "No containers found.".to_string(),
            other => format!("No {other} containers found."),
        }
    }
}

impl fmt::Display for ListFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListFilter {
    type Err = DockhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "all" => Ok(Self::All),
            _ => Err(DockhandError::InvalidFilter(s.to_string())),
        }
    }
}

/// Render workloads as aligned `name  ✅ running` lines, split into chunks
/// of at most `per_chunk` lines. Names are padded to the longest name in
/// the whole listing so every chunk lines up the same way.
pub fn render_chunks(workloads: &[Workload], per_chunk: usize) -> Vec<String> {
    let width = workloads
        .iter()
        .map(|w| w.display_name().chars().count())
        .max()
        .unwrap_or(0)
        + 2;

    workloads
        .chunks(per_chunk.max(1))
        .map(|chunk| {
            chunk
                .iter()
                .map(|w| {
                    let marker = if w.is_running() { "✅" } else { "❌" };
                    format!("{:<width$} {marker} {}", w.display_name(), w.state)
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}
