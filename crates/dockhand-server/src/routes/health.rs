use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Some dependency is failing but the process should keep running.
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DockerHealth {
    Connected { containers: usize },
    Error { error: String },
}

#[derive(Debug, Serialize)]
pub struct Services {
    pub docker: DockerHealth,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub platform: &'static str,
    pub arch: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime: u64,
    pub version: &'static str,
    pub system: SystemInfo,
    pub services: Services,
}

/// `GET /health`: refresh the workload snapshot and report whether the
/// runtime answered. A failing runtime is `degraded`, still with 200.
pub async fn get_health(State(app): State<AppState>) -> Json<HealthReport> {
    let docker = match app.registry.refresh().await {
        Ok(_) => DockerHealth::Connected {
            containers: app.registry.count().await,
        },
        Err(e) => DockerHealth::Error {
            error: e.to_string(),
        },
    };
    let status = match docker {
        DockerHealth::Connected { .. } => HealthStatus::Healthy,
        DockerHealth::Error { .. } => HealthStatus::Degraded,
    };

    Json(HealthReport {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: app.uptime_secs(),
        version: env!("CARGO_PKG_VERSION"),
        system: SystemInfo {
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        },
        services: Services { docker },
    })
}

pub async fn not_found() -> AppError {
    AppError::not_found("Not found")
}
