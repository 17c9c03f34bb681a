use thiserror::Error;

#[derive(Debug, Error)]
pub enum DockhandError {
    #[error("You are not allowed to use this command")]
    AuthorizationDenied,

    #[error("container '{0}' doesn't exist")]
    TargetNotFound(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("a target container is required for '{0}'")]
    MissingTarget(String),

    #[error("a shell command is required for the exec operation")]
    MissingPayload,

    #[error("invalid operation '{0}': expected start, stop, restart, exec or remediate")]
    InvalidOperation(String),

    #[error("invalid permission class '{0}': expected start or stop")]
    InvalidPermissionClass(String),

    #[error("invalid filter '{0}': expected running, stopped or all")]
    InvalidFilter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DockhandError>;
