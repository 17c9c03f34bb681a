//! `ContainerRuntime` backed by the Docker Engine API.

use async_trait::async_trait;
use bollard::container::{
    ListContainersOptions, LogOutput, RestartContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::ContainerSummary;
use bollard::Docker;
use futures::StreamExt;
use std::sync::OnceLock;

use crate::error::{DockhandError, Result};
use crate::runtime::{ContainerRuntime, ExecOutput};
use crate::types::{Workload, WorkloadState};

/// Seconds bollard waits on a single engine request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct DockerRuntime {
    socket_path: Option<String>,
    docker: OnceLock<Docker>,
}

impl DockerRuntime {
    /// Client for `socket_path`, or for the platform's local defaults
    /// (`DOCKER_HOST`, then `/var/run/docker.sock`) when `None`.
    ///
    /// Nothing is opened here. The client is built on first use, so a host
    /// without an engine only fails the calls that need one.
    pub fn new(socket_path: Option<&str>) -> Self {
        Self {
            socket_path: socket_path.map(str::to_string),
            docker: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&Docker> {
        if let Some(docker) = self.docker.get() {
            return Ok(docker);
        }
        let docker = match self.socket_path.as_deref() {
            Some(path) => {
                Docker::connect_with_socket(path, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| DockhandError::RuntimeUnavailable(e.to_string()))?;
        Ok(self.docker.get_or_init(|| docker))
    }
}

fn runtime_error(id: &str, e: BollardError) -> DockhandError {
    match e {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => DockhandError::TargetNotFound(id.to_string()),
        other => DockhandError::RuntimeUnavailable(other.to_string()),
    }
}

fn to_workload(summary: ContainerSummary) -> Workload {
    Workload {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        state: summary
            .state
            .as_deref()
            .map(WorkloadState::parse)
            .unwrap_or(WorkloadState::Unknown),
        status: summary.status.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_workloads(&self) -> Result<Vec<Workload>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .client()?
            .list_containers(Some(options))
            .await
            .map_err(|e| DockhandError::RuntimeUnavailable(e.to_string()))?;
        Ok(summaries.into_iter().map(to_workload).collect())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.client()?
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| runtime_error(id, e))
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.client()?
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .map_err(|e| runtime_error(id, e))
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.client()?
            .restart_container(id, None::<RestartContainerOptions>)
            .await
            .map_err(|e| runtime_error(id, e))
    }

    async fn exec(&self, id: &str, argv: &[String]) -> Result<ExecOutput> {
        let docker = self.client()?;
        let exec = docker
            .create_exec(
                id,
                CreateExecOptions {
                    cmd: Some(argv.to_vec()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| runtime_error(id, e))?;

        let mut out = ExecOutput::default();
        match docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| runtime_error(id, e))?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(frame) = output.next().await {
                    match frame.map_err(|e| runtime_error(id, e))? {
                        LogOutput::StdErr { message } => {
                            out.stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        LogOutput::StdOut { message } | LogOutput::Console { message } => {
                            out.stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        LogOutput::StdIn { .. } => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_maps_to_workload() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/web".to_string()]),
            image: Some("nginx".to_string()),
            state: Some("exited".to_string()),
            status: Some("Exited (0) 3 minutes ago".to_string()),
            ..Default::default()
        };
        let w = to_workload(summary);
        assert_eq!(w.display_name(), "web");
        assert_eq!(w.state, WorkloadState::Exited);
        assert_eq!(w.image, "nginx");
    }

    #[tokio::test]
    async fn missing_socket_fails_on_first_use() {
        let runtime = DockerRuntime::new(Some("/nonexistent/dockhand-test.sock"));
        let err = runtime.list_workloads().await.unwrap_err();
        assert!(matches!(err, DockhandError::RuntimeUnavailable(_)));
    }

    #[test]
    fn engine_404_maps_to_not_found() {
        let e = BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        };
        assert!(matches!(
            runtime_error("web", e),
            DockhandError::TargetNotFound(name) if name == "web"
        ));
    }

    #[test]
    fn other_engine_errors_are_runtime_unavailable() {
        let e = BollardError::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(
            runtime_error("web", e),
            DockhandError::RuntimeUnavailable(_)
        ));
    }
}
