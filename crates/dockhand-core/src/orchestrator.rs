//! Request entry point: authorize, resolve, serialize per workload, execute,
//! then confirm.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::error::{DockhandError, Result};
use crate::executor::{Executor, StartOutcome};
use crate::listing::ListFilter;
use crate::locks::WorkloadLocks;
use crate::permissions::{EffectiveGrants, PermissionMatrix, SubjectGrants};
use crate::poller::{await_state, ExpectedState};
use crate::registry::Registry;
use crate::runtime::ContainerRuntime;
use crate::saga::{Saga, SagaPlan, SagaReport};
use crate::settings::{RetryPolicy, SettingsStore};
use crate::types::{Actor, GrantScope, Operation, PermissionClass, Workload};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LifecycleStatus {
    AlreadyRunning,
    AlreadyStopped,
    Confirmed,
    /// The call was accepted but the state was not observed within the
    /// retry budget. It may still land.
    Unconfirmed { budget_secs: u64 },
    /// The workload disappeared from the listing after the call.
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub workload: String,
    pub operation: Operation,
    #[serde(flatten)]
    pub status: LifecycleStatus,
    /// Convergence checks performed; zero when nothing was issued.
    pub checks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Lifecycle(LifecycleReport),
    Exec { workload: String, output: String },
    Remediation(SagaReport),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lifecycle(r) => {
                let (name, past) = (&r.workload, r.operation.past_tense());
                match &r.status {
                    LifecycleStatus::AlreadyRunning => write!(f, "{name} is already running"),
                    LifecycleStatus::AlreadyStopped => write!(f, "{name} is already stopped"),
                    LifecycleStatus::Confirmed => write!(f, "{name} has been {past}"),
                    LifecycleStatus::Unconfirmed { budget_secs } => write!(
                        f,
                        "{name} could not be {past} (not confirmed within {budget_secs} seconds)"
                    ),
                    LifecycleStatus::Vanished => {
                        write!(f, "{name} could not be found after command execution")
                    }
                }
            }
            Self::Exec { workload, output } => {
                write!(f, "Response from {workload}:\n{output}")
            }
            Self::Remediation(report) => {
                write!(f, "{} completed:\n{}", report.workflow, report.transcript())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    settings: Arc<dyn SettingsStore>,
    registry: Arc<Registry>,
    executor: Executor,
    locks: WorkloadLocks,
    policy: RetryPolicy,
    plan: SagaPlan,
    containers_per_message: usize,
    /// Serializes load-modify-save of the permission matrix.
    settings_guard: Mutex<()>,
}

impl Orchestrator {
    /// Build from the stored settings. The retry policy and remediation plan
    /// are read once here and fixed for the orchestrator's lifetime.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: Arc<dyn SettingsStore>) -> Result<Self> {
        let loaded = settings.load()?;
        for warning in loaded.validate() {
            tracing::warn!("{}", warning.message);
        }
        let policy = loaded.docker_settings.retry_policy();
        let plan = SagaPlan::from_settings(&loaded.remediation_settings);
        let mut orch = Self::with_config(runtime, settings, policy, plan);
        orch.containers_per_message = loaded.docker_settings.containers_per_message;
        Ok(orch)
    }

    pub fn with_config(
        runtime: Arc<dyn ContainerRuntime>,
        settings: Arc<dyn SettingsStore>,
        policy: RetryPolicy,
        plan: SagaPlan,
    ) -> Self {
        let registry = Arc::new(Registry::new(runtime.clone()));
        Self {
            settings,
            executor: Executor::new(runtime, registry.clone()),
            registry,
            locks: WorkloadLocks::new(),
            policy,
            plan,
            containers_per_message: 30,
            settings_guard: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn plan(&self) -> &SagaPlan {
        &self.plan
    }

    pub fn containers_per_message(&self) -> usize {
        self.containers_per_message
    }

    /// Cached workload count, as of the last refresh.
    pub async fn snapshot_count(&self) -> usize {
        self.registry.count().await
    }

    /// Check the request shape and `actor`'s grant without touching the
    /// runtime. `run_operation` performs the same check first.
    pub fn authorize_request(
        &self,
        actor: &Actor,
        op: Operation,
        target: Option<&str>,
        payload: Option<&str>,
    ) -> Result<()> {
        self.admit(actor, op, target, payload).map(|_| ())
    }

    /// Run one lifecycle operation for `actor`.
    ///
    /// `target` is ignored for `Remediate`, which always acts on the
    /// configured group and is authorized against its primary. `payload` is
    /// the shell command for `Exec`.
    pub async fn run_operation(
        &self,
        actor: &Actor,
        op: Operation,
        target: Option<&str>,
        payload: Option<&str>,
    ) -> Result<Outcome> {
        let (target, command) = self.admit(actor, op, target, payload)?;

        if op == Operation::Remediate {
            return Ok(Outcome::Remediation(self.remediate().await?));
        }

        let resolved = self.registry.refresh_and_resolve(&target).await?;
        let _guard = self.locks.acquire(&resolved.id).await;
        // Someone else may have held the lock; take the latest view.
        let workload = self
            .registry
            .find_by_id(&resolved.id)
            .await
            .ok_or_else(|| DockhandError::TargetNotFound(target.clone()))?;
        let name = workload.display_name().to_string();

        if let Some(command) = command {
            let output = self.executor.exec(&workload, command).await;
            return Ok(Outcome::Exec {
                workload: name,
                output,
            });
        }

        let report = |status, checks| {
            Outcome::Lifecycle(LifecycleReport {
                workload: name.clone(),
                operation: op,
                status,
                checks,
            })
        };

        match op {
            Operation::Start => {
                if self.executor.start(&workload).await? == StartOutcome::AlreadyRunning {
                    return Ok(report(LifecycleStatus::AlreadyRunning, 0));
                }
            }
            Operation::Stop | Operation::Restart if !workload.is_running() => {
                return Ok(report(LifecycleStatus::AlreadyStopped, 0));
            }
            Operation::Stop => self.executor.stop(&workload).await?,
            Operation::Restart => self.executor.restart(&workload).await?,
            Operation::Exec | Operation::Remediate => {}
        }

        let Some(expected) = ExpectedState::for_operation(op) else {
            return Ok(report(LifecycleStatus::Confirmed, 0));
        };
        let conv = await_state(&self.registry, &workload.id, expected, self.policy).await;
        let status = if conv.reached {
            LifecycleStatus::Confirmed
        } else if conv.workload.is_none() {
            LifecycleStatus::Vanished
        } else {
            LifecycleStatus::Unconfirmed {
                budget_secs: self.policy.budget().as_secs(),
            }
        };
        Ok(report(status, conv.checks))
    }

    /// Shape checks, then authorization. Returns the name to authorize and
    /// act on, and the exec command if any.
    fn admit<'p>(
        &self,
        actor: &Actor,
        op: Operation,
        target: Option<&str>,
        payload: Option<&'p str>,
    ) -> Result<(String, Option<&'p str>)> {
        let target = match op {
            Operation::Remediate => self.plan.group.primary.clone(),
            _ => target
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| DockhandError::MissingTarget(op.to_string()))?
                .to_string(),
        };
        let command = match op {
            Operation::Exec => Some(
                payload
                    .filter(|p| !p.trim().is_empty())
                    .ok_or(DockhandError::MissingPayload)?,
            ),
            _ => None,
        };

        let matrix = self.settings.load_permission_matrix()?;
        if !matrix.authorize(actor, op, &target) {
            tracing::warn!(actor = %actor.id, operation = %op, workload = %target, "denied");
            return Err(DockhandError::AuthorizationDenied);
        }
        tracing::info!(actor = %actor.id, operation = %op, workload = %target, "authorized");
        Ok((target, command))
    }

    /// Run the remediation saga holding the lock of every group member
    /// present in the listing. A failed listing aborts before any step runs.
    async fn remediate(&self) -> Result<SagaReport> {
        let members = self.plan.group.members();
        let list = self.registry.refresh().await?;
        let ids: Vec<String> = members
            .iter()
            .filter_map(|name| list.iter().find(|w| w.has_name(name)))
            .map(|w| w.id.clone())
            .collect();
        let _guards = self.locks.acquire_all(ids.iter().map(String::as_str)).await;
        Ok(Saga::new(&self.executor, &self.registry, self.policy)
            .run(&self.plan)
            .await)
    }

    /// Refresh and return the workloads matching `filter`.
    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Workload>> {
        Ok(self
            .registry
            .refresh()
            .await?
            .into_iter()
            .filter(|w| filter.matches(w))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Permission management
    // -----------------------------------------------------------------------

    /// Add a grant after checking the workload exists. Returns `false` if
    /// the grant was already present.
    pub async fn grant(
        &self,
        actor: &Actor,
        subject: &str,
        workload: &str,
        class: PermissionClass,
        scope: GrantScope,
    ) -> Result<bool> {
        self.ensure_manager(actor)?;
        self.registry.refresh_and_resolve(workload).await?;
        let added = self.update_matrix(|m| m.grant(subject, workload, class, scope))?;
        tracing::info!(actor = %actor.id, subject, workload, %class, ?scope, added, "grant");
        Ok(added)
    }

    /// Remove a grant. Returns `false` if there was nothing to remove.
    pub fn revoke(
        &self,
        actor: &Actor,
        subject: &str,
        workload: &str,
        class: PermissionClass,
        scope: GrantScope,
    ) -> Result<bool> {
        self.ensure_manager(actor)?;
        let removed = self.update_matrix(|m| m.revoke(subject, workload, class, scope))?;
        tracing::info!(actor = %actor.id, subject, workload, %class, ?scope, removed, "revoke");
        Ok(removed)
    }

    pub fn add_admin(&self, actor: &Actor, admin_id: &str) -> Result<bool> {
        self.ensure_manager(actor)?;
        self.update_matrix(|m| m.add_admin(admin_id))
    }

    pub fn remove_admin(&self, actor: &Actor, admin_id: &str) -> Result<bool> {
        self.ensure_manager(actor)?;
        self.update_matrix(|m| m.remove_admin(admin_id))
    }

    pub fn admins(&self) -> Result<Vec<String>> {
        Ok(self
            .settings
            .load_permission_matrix()?
            .admin_ids
            .into_iter()
            .collect())
    }

    pub fn grants_for(&self, subject: &str, scope: GrantScope) -> Result<SubjectGrants> {
        Ok(self.settings.load_permission_matrix()?.grants_for(subject, scope))
    }

    /// What `actor` may do. Admins get every workload name in a fresh
    /// listing.
    pub async fn permissions(&self, actor: &Actor) -> Result<EffectiveGrants> {
        let matrix = self.settings.load_permission_matrix()?;
        if !matrix.is_admin(&actor.id) {
            return Ok(matrix.effective(actor));
        }
        let names: std::collections::BTreeSet<String> = self
            .registry
            .refresh()
            .await?
            .iter()
            .map(|w| w.display_name().to_string())
            .collect();
        Ok(EffectiveGrants {
            is_admin: true,
            start: names.clone(),
            stop: names,
        })
    }

    /// Admins manage grants. With no admins configured anyone may, so the
    /// first admin can be added.
    fn ensure_manager(&self, actor: &Actor) -> Result<()> {
        let matrix = self.settings.load_permission_matrix()?;
        if matrix.admin_ids.is_empty() || matrix.is_admin(&actor.id) {
            Ok(())
        } else {
            tracing::warn!(actor = %actor.id, "permission management denied");
            Err(DockhandError::AuthorizationDenied)
        }
    }

    /// Load, apply `change`, and save only if it reported a change.
    fn update_matrix(&self, change: impl FnOnce(&mut PermissionMatrix) -> bool) -> Result<bool> {
        let _guard = self
            .settings_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut matrix = self.settings.load_permission_matrix()?;
        let changed = change(&mut matrix);
        if changed {
            self.settings.save_permission_matrix(&matrix)?;
        }
        Ok(changed)
    }
}
