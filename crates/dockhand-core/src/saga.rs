//! The remediation workflow: restart a primary workload and the dependents
//! that connect to it, in dependency order.
//!
//! A workflow is a [`SagaPlan`], an ordered list of [`SagaStep`]s, and
//! [`Saga::run`] is the single driver loop that interprets it. Every step
//! appends to the report's transcript; only the primary failing to come up
//! stops the loop early.

use std::time::Duration;

use serde::Serialize;

use crate::executor::{Executor, StartOutcome};
use crate::poller::{await_group, await_state, ExpectedState};
use crate::registry::Registry;
use crate::settings::{RemediationSettings, RetryPolicy};
use crate::types::Workload;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationGroup {
    /// Workflow name used in the transcript.
    pub name: String,
    pub primary: String,
    /// Started in this order after the primary.
    pub dependents: Vec<String>,
}

impl RemediationGroup {
    /// Primary first, then dependents, without repeats.
    pub fn members(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(1 + self.dependents.len());
        for name in std::iter::once(&self.primary).chain(&self.dependents) {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        out
    }
}

impl From<&RemediationSettings> for RemediationGroup {
    fn from(s: &RemediationSettings) -> Self {
        Self {
            name: s.name.clone(),
            primary: s.primary.clone(),
            dependents: s.dependents.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    StopAll,
    ConfirmStopped,
    StartPrimary,
    ConfirmPrimary,
    WarmupDelay,
    StartDependents,
    FinalVerify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    StopAll,
    ConfirmStopped,
    StartPrimary,
    ConfirmPrimary,
    /// Fixed pause, independent of the retry policy.
    WarmupDelay(Duration),
    StartDependents,
    /// Wait `settle`, refresh once, and check every member is running.
    FinalVerify { settle: Duration },
}

impl SagaStep {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::StopAll => StepKind::StopAll,
            Self::ConfirmStopped => StepKind::ConfirmStopped,
            Self::StartPrimary => StepKind::StartPrimary,
            Self::ConfirmPrimary => StepKind::ConfirmPrimary,
            Self::WarmupDelay(_) => StepKind::WarmupDelay,
            Self::StartDependents => StepKind::StartDependents,
            Self::FinalVerify { .. } => StepKind::FinalVerify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaPlan {
    pub group: RemediationGroup,
    pub steps: Vec<SagaStep>,
}

impl SagaPlan {
    /// Stop everything, bring the primary up, give it `warmup`, then start
    /// the dependents and verify after `settle`.
    pub fn restart_group(group: RemediationGroup, warmup: Duration, settle: Duration) -> Self {
        Self {
            group,
            steps: vec![
                SagaStep::StopAll,
                SagaStep::ConfirmStopped,
                SagaStep::StartPrimary,
                SagaStep::ConfirmPrimary,
                SagaStep::WarmupDelay(warmup),
                SagaStep::StartDependents,
                SagaStep::FinalVerify { settle },
            ],
        }
    }

    pub fn from_settings(s: &RemediationSettings) -> Self {
        Self::restart_group(
            s.into(),
            Duration::from_secs(s.warmup_seconds),
            Duration::from_secs(s.verify_delay_seconds),
        )
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaStepResult {
    pub step: StepKind,
    pub succeeded: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    PrimaryMissing,
    PrimaryFailedToStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SagaOutcome {
    Succeeded,
    /// Ran to the end but these members were not running at verification.
    Partial { not_running: Vec<String> },
    Aborted { reason: AbortReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaReport {
    pub workflow: String,
    pub results: Vec<SagaStepResult>,
    pub outcome: SagaOutcome,
}

impl SagaReport {
    fn new(workflow: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            results: Vec::new(),
            outcome: SagaOutcome::Succeeded,
        }
    }

    fn push(&mut self, step: StepKind, succeeded: bool, message: impl Into<String>) {
        let message = message.into();
        if succeeded {
            tracing::info!(workflow = %self.workflow, ?step, "{message}");
        } else {
            tracing::warn!(workflow = %self.workflow, ?step, "{message}");
        }
        self.results.push(SagaStepResult {
            step,
            succeeded,
            message,
        });
    }

    /// Step messages in order, one per line.
    pub fn transcript(&self) -> String {
        self.results
            .iter()
            .map(|r| r.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any result was recorded for `kind`.
    pub fn ran(&self, kind: StepKind) -> bool {
        self.results.iter().any(|r| r.step == kind)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == SagaOutcome::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Flow {
    Continue,
    Abort(AbortReason),
}

/// Runs plans against one executor and registry. Callers hold the per-id
/// locks of the group members for the whole run.
pub struct Saga<'a> {
    executor: &'a Executor,
    registry: &'a Registry,
    policy: RetryPolicy,
}

impl<'a> Saga<'a> {
    pub fn new(executor: &'a Executor, registry: &'a Registry, policy: RetryPolicy) -> Self {
        Self {
            executor,
            registry,
            policy,
        }
    }

    pub async fn run(&self, plan: &SagaPlan) -> SagaReport {
        let mut report = SagaReport::new(&plan.group.name);
        tracing::info!(workflow = %plan.group.name, steps = plan.steps.len(), "running remediation");

        // Carried from StartPrimary to ConfirmPrimary.
        let mut primary: Option<Workload> = None;

        for step in &plan.steps {
            let flow = match *step {
                SagaStep::StopAll => self.stop_all(&plan.group, &mut report).await,
                SagaStep::ConfirmStopped => self.confirm_stopped(&plan.group, &mut report).await,
                SagaStep::StartPrimary => {
                    self.start_primary(&plan.group, &mut primary, &mut report)
                        .await
                }
                SagaStep::ConfirmPrimary => {
                    self.confirm_primary(&plan.group, primary.as_ref(), &mut report)
                        .await
                }
                SagaStep::WarmupDelay(pause) => {
                    report.push(
                        StepKind::WarmupDelay,
                        true,
                        format!("Waiting for {} to initialize...", plan.group.primary),
                    );
                    tokio::time::sleep(pause).await;
                    Flow::Continue
                }
                SagaStep::StartDependents => {
                    self.start_dependents(&plan.group, &mut report).await
                }
                SagaStep::FinalVerify { settle } => {
                    self.final_verify(&plan.group, settle, &mut report).await
                }
            };

            if let Flow::Abort(reason) = flow {
                tracing::warn!(workflow = %plan.group.name, ?reason, "remediation aborted");
                report.outcome = SagaOutcome::Aborted { reason };
                return report;
            }
        }
        report
    }

    async fn stop_all(&self, group: &RemediationGroup, report: &mut SagaReport) -> Flow {
        report.push(StepKind::StopAll, true, "Stopping containers...");
        let list = match self.registry.refresh().await {
            Ok(list) => list,
            Err(e) => {
                report.push(
                    StepKind::StopAll,
                    false,
                    format!("Could not list containers: {e}"),
                );
                return Flow::Continue;
            }
        };

        for name in group.members() {
            let Some(workload) = list.iter().find(|w| w.has_name(&name)) else {
                continue;
            };
            if !workload.is_running() {
                continue;
            }
            // A failed stop is recorded; convergence decides the rest.
            if let Err(e) = self.executor.stop(workload).await {
                report.push(
                    StepKind::StopAll,
                    false,
                    format!("Failed to stop {name}: {e}"),
                );
            }
        }
        Flow::Continue
    }

    async fn confirm_stopped(&self, group: &RemediationGroup, report: &mut SagaReport) -> Flow {
        let conv = await_group(
            self.registry,
            &group.members(),
            ExpectedState::NotRunning,
            self.policy,
        )
        .await;
        if conv.reached {
            report.push(
                StepKind::ConfirmStopped,
                true,
                "All containers stopped successfully.",
            );
        } else {
            report.push(
                StepKind::ConfirmStopped,
                false,
                format!("Still running: {}.", conv.pending.join(", ")),
            );
        }
        Flow::Continue
    }

    async fn start_primary(
        &self,
        group: &RemediationGroup,
        primary: &mut Option<Workload>,
        report: &mut SagaReport,
    ) -> Flow {
        let name = &group.primary;
        report.push(StepKind::StartPrimary, true, format!("Starting {name}..."));

        let Some(workload) = self.registry.resolve(name).await else {
            report.push(
                StepKind::StartPrimary,
                false,
                format!("{name} container not found."),
            );
            return Flow::Abort(AbortReason::PrimaryMissing);
        };

        // A failed call still goes through ConfirmPrimary, which decides.
        match self.executor.start(&workload).await {
            Ok(StartOutcome::AlreadyRunning) | Ok(StartOutcome::Issued { .. }) => {}
            Err(e) => report.push(
                StepKind::StartPrimary,
                false,
                format!("Failed to issue start for {name}: {e}"),
            ),
        }
        *primary = Some(workload);
        Flow::Continue
    }

    async fn confirm_primary(
        &self,
        group: &RemediationGroup,
        primary: Option<&Workload>,
        report: &mut SagaReport,
    ) -> Flow {
        let name = &group.primary;
        let Some(workload) = primary else {
            report.push(
                StepKind::ConfirmPrimary,
                false,
                format!("{name} container not found."),
            );
            return Flow::Abort(AbortReason::PrimaryMissing);
        };

        let conv = await_state(
            self.registry,
            &workload.id,
            ExpectedState::Running,
            self.policy,
        )
        .await;
        if conv.reached {
            report.push(
                StepKind::ConfirmPrimary,
                true,
                format!("{name} started successfully."),
            );
            Flow::Continue
        } else {
            report.push(
                StepKind::ConfirmPrimary,
                false,
                format!("Failed to start {name}."),
            );
            Flow::Abort(AbortReason::PrimaryFailedToStart)
        }
    }

    async fn start_dependents(&self, group: &RemediationGroup, report: &mut SagaReport) -> Flow {
        report.push(
            StepKind::StartDependents,
            true,
            "Starting remaining containers...",
        );
        for name in &group.dependents {
            if name == &group.primary {
                continue;
            }
            // Each start refreshes the snapshot, so resolve against it as we go.
            let Some(workload) = self.registry.resolve(name).await else {
                report.push(
                    StepKind::StartDependents,
                    false,
                    format!("{name} container not found."),
                );
                continue;
            };
            if let Err(e) = self.executor.start(&workload).await {
                report.push(
                    StepKind::StartDependents,
                    false,
                    format!("Failed to start {name}: {e}"),
                );
            }
        }
        Flow::Continue
    }

    async fn final_verify(
        &self,
        group: &RemediationGroup,
        settle: Duration,
        report: &mut SagaReport,
    ) -> Flow {
        tokio::time::sleep(settle).await;
        let members = group.members();

        let not_running: Vec<String> = match self.registry.refresh().await {
            Ok(list) => members
                .into_iter()
                .filter(|name| {
                    !list
                        .iter()
                        .any(|w| w.has_name(name) && w.is_running())
                })
                .collect(),
            Err(e) => {
                report.push(
                    StepKind::FinalVerify,
                    false,
                    format!("Could not list containers: {e}"),
                );
                members
            }
        };

        if not_running.is_empty() {
            report.push(
                StepKind::FinalVerify,
                true,
                "All containers are running successfully.",
            );
            report.outcome = SagaOutcome::Succeeded;
        } else {
            for name in &not_running {
                report.push(StepKind::FinalVerify, false, format!("{name} is not running."));
            }
            report.push(
                StepKind::FinalVerify,
                false,
                format!(
                    "Not all containers are running. {} may not have succeeded completely.",
                    group.name
                ),
            );
            report.outcome = SagaOutcome::Partial { not_running };
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::testing::{workload, Behavior, Call, FakeRuntime};
    use crate::types::WorkloadState;

    const POLICY: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        interval: Duration::from_secs(1),
    };

    fn group() -> RemediationGroup {
        RemediationGroup {
            name: "dbFix".to_string(),
            primary: "db".to_string(),
            dependents: vec!["cache".to_string(), "api".to_string()],
        }
    }

    fn plan() -> SagaPlan {
        SagaPlan::restart_group(group(), Duration::from_secs(10), Duration::from_secs(5))
    }

    fn all_running() -> Arc<FakeRuntime> {
        Arc::new(FakeRuntime::new([
            workload("db", WorkloadState::Running),
            workload("cache", WorkloadState::Running),
            workload("api", WorkloadState::Running),
        ]))
    }

    async fn run(fake: &Arc<FakeRuntime>) -> SagaReport {
        let registry = Arc::new(Registry::new(fake.clone()));
        let executor = Executor::new(fake.clone(), registry.clone());
        Saga::new(&executor, &registry, POLICY).run(&plan()).await
    }

    fn id(name: &str) -> String {
        format!("id-{name}")
    }

    #[test]
    fn members_put_primary_first_without_repeats() {
        let mut g = group();
        g.dependents.push("db".to_string());
        assert_eq!(g.members(), vec!["db", "cache", "api"]);
    }

    #[test]
    fn plan_from_settings_uses_configured_delays() {
        let plan = SagaPlan::from_settings(&RemediationSettings::default());
        assert_eq!(plan.group.primary, "jellyfin");
        assert_eq!(plan.steps[4], SagaStep::WarmupDelay(Duration::from_secs(10)));
        assert_eq!(
            plan.steps[6],
            SagaStep::FinalVerify {
                settle: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_restart_in_dependency_order() {
        let fake = all_running();
        let report = run(&fake).await;

        assert_eq!(report.outcome, SagaOutcome::Succeeded);
        assert_eq!(
            fake.mutations(),
            vec![
                Call::Stop(id("db")),
                Call::Stop(id("cache")),
                Call::Stop(id("api")),
                Call::Start(id("db")),
                Call::Start(id("cache")),
                Call::Start(id("api")),
            ]
        );
        assert_eq!(
            report.transcript(),
            "Stopping containers...\n\
             All containers stopped successfully.\n\
             Starting db...\n\
             db started successfully.\n\
             Waiting for db to initialize...\n\
             Starting remaining containers...\n\
             All containers are running successfully."
        );
        for name in ["db", "cache", "api"] {
            assert_eq!(fake.state_of(name), Some(WorkloadState::Running));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_members_are_not_stopped_again() {
        let fake = all_running();
        fake.set_state("cache", WorkloadState::Exited);
        run(&fake).await;
        assert!(!fake.mutations().contains(&Call::Stop(id("cache"))));
    }

    #[tokio::test(start_paused = true)]
    async fn primary_missing_after_stop_aborts() {
        let fake = all_running();
        fake.behave("db", Behavior::Vanish);
        let report = run(&fake).await;

        assert_eq!(
            report.outcome,
            SagaOutcome::Aborted {
                reason: AbortReason::PrimaryMissing
            }
        );
        assert!(report.transcript().ends_with("db container not found."));
        assert!(!report.ran(StepKind::WarmupDelay));
        assert!(!report.ran(StepKind::StartDependents));
        assert!(!report.ran(StepKind::FinalVerify));
        assert!(!fake
            .mutations()
            .iter()
            .any(|c| matches!(c, Call::Start(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn primary_never_running_aborts_before_dependents() {
        let fake = all_running();
        fake.set_state("db", WorkloadState::Exited);
        fake.behave("db", Behavior::Stuck);
        let report = run(&fake).await;

        assert_eq!(
            report.outcome,
            SagaOutcome::Aborted {
                reason: AbortReason::PrimaryFailedToStart
            }
        );
        assert!(report.transcript().ends_with("Failed to start db."));
        assert!(!report.ran(StepKind::StartDependents));
        assert!(!report.ran(StepKind::FinalVerify));
        assert!(!fake.mutations().contains(&Call::Start(id("cache"))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_primary_within_budget_still_proceeds() {
        let fake = all_running();
        fake.set_state("db", WorkloadState::Exited);
        // Start lands after the executor's refresh and two poll checks.
        fake.behave("db", Behavior::Lag(2));
        let report = run(&fake).await;
        assert!(report.ran(StepKind::StartDependents));
        assert_eq!(report.outcome, SagaOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn dependent_that_stays_down_is_reported() {
        let fake = all_running();
        fake.behave("api", Behavior::Stuck);
        fake.set_state("api", WorkloadState::Exited);
        let report = run(&fake).await;

        assert_eq!(
            report.outcome,
            SagaOutcome::Partial {
                not_running: vec!["api".to_string()]
            }
        );
        let transcript = report.transcript();
        assert!(transcript.contains("api is not running."));
        assert!(transcript
            .ends_with("Not all containers are running. dbFix may not have succeeded completely."));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_failures_do_not_abort() {
        let fake = all_running();
        fake.behave("cache", Behavior::Fail);
        let report = run(&fake).await;

        assert!(report
            .results
            .iter()
            .any(|r| r.step == StepKind::StopAll && !r.succeeded));
        let confirm = report
            .results
            .iter()
            .find(|r| r.step == StepKind::ConfirmStopped)
            .unwrap();
        assert_eq!(confirm.message, "Still running: cache.");
        assert!(report.ran(StepKind::StartPrimary));
    }
}
