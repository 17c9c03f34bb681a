use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::DockhandError;

// ---------------------------------------------------------------------------
// WorkloadState
// ---------------------------------------------------------------------------

/// Lifecycle state as reported by the container runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadState {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    /// Any state string the runtime reports that is not listed above.
    Unknown,
}

impl WorkloadState {
    /// Map a runtime state string. Never fails: unrecognised values become
    /// `Unknown`, which counts as not running.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WorkloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Workload
// ---------------------------------------------------------------------------

/// One runtime-managed container as seen in the latest snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub names: Vec<String>,
    pub state: WorkloadState,
    pub status: String,
    pub image: String,
}

/// Strip the runtime's leading `/` from a container name.
pub fn display_name(raw: &str) -> &str {
    raw.strip_prefix('/').unwrap_or(raw)
}

impl Workload {
    /// The first name with its leading separator stripped, or the short id
    /// when the runtime reported no names.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|n| display_name(n))
            .unwrap_or_else(|| self.short_id())
    }

    /// True if any of the workload's display names equals `name` exactly.
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| display_name(n) == name)
    }

    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }

    pub fn is_running(&self) -> bool {
        self.state == WorkloadState::Running
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Start,
    Stop,
    Restart,
    Exec,
    Remediate,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Exec => "exec",
            Self::Remediate => "remediate",
        }
    }

    /// Grant class that authorizes this operation. Only `start` needs a start
    /// grant; everything that can take a workload down needs a stop grant.
    pub fn permission_class(self) -> PermissionClass {
        match self {
            Self::Start => PermissionClass::Start,
            Self::Stop | Self::Restart | Self::Exec | Self::Remediate => PermissionClass::Stop,
        }
    }

    /// Past participle used in status replies ("has been restarted").
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Restart => "restarted",
            Self::Exec => "executed",
            Self::Remediate => "remediated",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = DockhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "exec" => Ok(Self::Exec),
            // "jfFix" is the name the remediation workflow has always been invoked by.
            "remediate" | "fix" | "jfFix" => Ok(Self::Remediate),
            _ => Err(DockhandError::InvalidOperation(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PermissionClass / GrantScope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionClass {
    Start,
    /// Also covers restart, exec and remediation.
    Stop,
}

impl PermissionClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionClass {
    type Err = DockhandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            _ => Err(DockhandError::InvalidPermissionClass(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantScope {
    User,
    Role,
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The requesting identity, supplied fresh with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }
}
