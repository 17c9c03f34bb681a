//! Bounded convergence polling against the registry.
//!
//! Every wait is attempt-counted: at most `max_attempts` sleeps of
//! `interval`, each followed by one refresh, then one last check with no
//! sleep before it. The first refresh always comes after a sleep, even when
//! the runtime already reports the expected state.

use std::future::Future;

use serde::Serialize;

use crate::registry::Registry;
use crate::settings::RetryPolicy;
use crate::types::{Operation, Workload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedState {
    Running,
    /// Anything other than running.
    NotRunning,
}

impl ExpectedState {
    /// `None` for operations that have no state to converge on.
    pub fn for_operation(op: Operation) -> Option<Self> {
        match op {
            Operation::Start | Operation::Restart => Some(Self::Running),
            Operation::Stop => Some(Self::NotRunning),
            Operation::Exec | Operation::Remediate => None,
        }
    }

    pub fn satisfied_by(self, workload: &Workload) -> bool {
        match self {
            Self::Running => workload.is_running(),
            Self::NotRunning => !workload.is_running(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub reached: bool,
    /// The workload as last observed; `None` if it had vanished.
    pub workload: Option<Workload>,
    /// Number of refresh-and-check rounds performed.
    pub checks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupConvergence {
    pub reached: bool,
    /// Members still not in the expected state at the last check.
    pub pending: Vec<String>,
    pub checks: u32,
}

/// Drive `check` under `policy`. `check` does one refresh and returns
/// `Some(done, value)`, or `None` if the refresh itself failed, which counts
/// as an unsatisfied check.
async fn poll<T, F, Fut>(policy: RetryPolicy, mut check: F) -> (bool, Option<T>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<(bool, T)>>,
{
    let mut last = None;
    let mut checks = 0;

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        checks += 1;
        match check().await {
            Some((true, value)) => return (true, Some(value), checks),
            Some((false, value)) => {
                tracing::debug!(attempt, max = policy.max_attempts, "not converged yet");
                last = Some(value);
            }
            None => tracing::debug!(attempt, "refresh failed during poll"),
        }
    }

    // Last-chance check so a transition landing on the final tick is seen.
    checks += 1;
    match check().await {
        Some((done, value)) => (done, Some(value), checks),
        None => (false, last, checks),
    }
}

/// Wait for the workload with `id` to reach `expected`.
///
/// A vanished workload is logged and polling continues; it may be the
/// runtime recreating it.
pub async fn await_state(
    registry: &Registry,
    id: &str,
    expected: ExpectedState,
    policy: RetryPolicy,
) -> Convergence {
    let (reached, workload, checks) = poll(policy, move || async move {
        let list = registry.refresh().await.ok()?;
        match list.into_iter().find(|w| w.id == id) {
            Some(w) => Some((expected.satisfied_by(&w), Some(w))),
            None => {
                tracing::warn!(id, "workload vanished while polling");
                Some((false, None))
            }
        }
    })
    .await;

    let workload = workload.flatten();
    if reached {
        tracing::info!(id, ?expected, checks, "converged");
    } else {
        tracing::warn!(id, ?expected, checks, "did not converge within retry budget");
    }
    Convergence {
        reached,
        workload,
        checks,
    }
}

/// Wait for every workload in `names` to reach `expected`.
///
/// A member missing from the listing counts as not running: it satisfies
/// `NotRunning` and blocks `Running`.
pub async fn await_group(
    registry: &Registry,
    names: &[String],
    expected: ExpectedState,
    policy: RetryPolicy,
) -> GroupConvergence {
    let (reached, pending, checks) = poll(policy, move || async move {
        let list = registry.refresh().await.ok()?;
        let pending: Vec<String> = names
            .iter()
            .filter(|name| {
                match list.iter().find(|w| w.has_name(name)) {
                    Some(w) => !expected.satisfied_by(w),
                    None => expected == ExpectedState::Running,
                }
            })
            .cloned()
            .collect();
        Some((pending.is_empty(), pending))
    })
    .await;

    GroupConvergence {
        reached,
        pending: pending.unwrap_or_else(|| names.to_vec()),
        checks,
    }
}
