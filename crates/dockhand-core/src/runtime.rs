use async_trait::async_trait;

use crate::error::Result;
use crate::types::Workload;

/// Captured output of a command run inside a workload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Stdout alone when nothing was written to stderr, otherwise both
    /// streams in labelled sections.
    pub fn render(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("STDOUT:\n{}\nSTDERR:\n{}", self.stdout, self.stderr)
        }
    }
}

/// The container runtime the orchestrator drives.
///
/// Every call may fail with `RuntimeUnavailable`; calls naming an id may also
/// fail with `TargetNotFound`.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// All workloads, including ones that are not running.
    async fn list_workloads(&self) -> Result<Vec<Workload>>;

    async fn start(&self, id: &str) -> Result<()>;

    async fn stop(&self, id: &str) -> Result<()>;

    async fn restart(&self, id: &str) -> Result<()>;

    async fn exec(&self, id: &str, argv: &[String]) -> Result<ExecOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_keeps_stdout_alone_without_stderr() {
        let out = ExecOutput {
            stdout: "hello\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.render(), "hello\n");
    }

    #[test]
    fn render_labels_both_streams_when_stderr_present() {
        let out = ExecOutput {
            stdout: "partial".to_string(),
            stderr: "boom".to_string(),
        };
        assert_eq!(out.render(), "STDOUT:\npartial\nSTDERR:\nboom");
    }
}
