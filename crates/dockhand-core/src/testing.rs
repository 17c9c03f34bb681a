//! Scripted in-memory runtime and settings store for unit tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::{DockhandError, Result};
use crate::runtime::{ContainerRuntime, ExecOutput};
use crate::settings::{Settings, SettingsStore};
use crate::types::{Workload, WorkloadState};

pub fn workload(name: &str, state: WorkloadState) -> Workload {
    Workload {
        id: format!("id-{name}"),
        names: vec![format!("/{name}")],
        state,
        status: state.to_string(),
        image: format!("{name}:latest"),
    }
}

/// How the fake reacts to a mutating call on one workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// The new state is visible on the next listing.
    Immediate,
    /// The new state appears only after this many further listings.
    Lag(u32),
    /// The call succeeds but the state never changes.
    Stuck,
    /// The call fails with `RuntimeUnavailable`.
    Fail,
    /// The call succeeds and the workload disappears.
    Vanish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Start(String),
    Stop(String),
    Restart(String),
    Exec(String, Vec<String>),
}

struct Pending {
    id: String,
    state: WorkloadState,
    due_at_list: u32,
}

#[derive(Default)]
struct FakeState {
    workloads: Vec<Workload>,
    behaviors: HashMap<String, Behavior>,
    pending: Vec<Pending>,
    calls: Vec<Call>,
    lists: u32,
    fail_lists: bool,
    exec_output: ExecOutput,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new(workloads: impl IntoIterator<Item = Workload>) -> Self {
        let fake = Self::default();
        fake.lock().workloads = workloads.into_iter().collect();
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Behavior for mutating calls on the workload named `name`.
    pub fn behave(&self, name: &str, behavior: Behavior) {
        self.lock().behaviors.insert(format!("id-{name}"), behavior);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.lock().fail_lists = fail;
    }

    pub fn set_exec_output(&self, stdout: &str, stderr: &str) {
        self.lock().exec_output = ExecOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        };
    }

    pub fn set_state(&self, name: &str, state: WorkloadState) {
        let id = format!("id-{name}");
        if let Some(w) = self.lock().workloads.iter_mut().find(|w| w.id == id) {
            w.state = state;
        }
    }

    pub fn remove(&self, name: &str) {
        let id = format!("id-{name}");
        self.lock().workloads.retain(|w| w.id != id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Every call except listings.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::List)
            .collect()
    }

    pub fn list_count(&self) -> u32 {
        self.lock().lists
    }

    pub fn state_of(&self, name: &str) -> Option<WorkloadState> {
        let id = format!("id-{name}");
        self.lock()
            .workloads
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.state)
    }

    fn transition(&self, call: Call, id: &str, target: WorkloadState) -> Result<()> {
        let mut st = self.lock();
        st.calls.push(call);
        if !st.workloads.iter().any(|w| w.id == id) {
            return Err(DockhandError::TargetNotFound(id.to_string()));
        }
        let behavior = st
            .behaviors
            .get(id)
            .copied()
            .unwrap_or(Behavior::Immediate);
        match behavior {
            Behavior::Immediate => {
                let due_at_list = st.lists + 1;
                st.pending.push(Pending {
                    id: id.to_string(),
                    state: target,
                    due_at_list,
                });
            }
            Behavior::Lag(n) => {
                let due_at_list = st.lists + 1 + n;
                st.pending.push(Pending {
                    id: id.to_string(),
                    state: target,
                    due_at_list,
                });
            }
            Behavior::Stuck => {}
            Behavior::Fail => {
                return Err(DockhandError::RuntimeUnavailable(
                    "connect ENOENT /var/run/docker.sock".to_string(),
                ))
            }
            Behavior::Vanish => st.workloads.retain(|w| w.id != id),
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_workloads(&self) -> Result<Vec<Workload>> {
        let mut guard = self.lock();
        let st = &mut *guard;
        st.calls.push(Call::List);
        if st.fail_lists {
            return Err(DockhandError::RuntimeUnavailable(
                "connect ENOENT /var/run/docker.sock".to_string(),
            ));
        }
        st.lists += 1;
        let now = st.lists;
        let workloads = &mut st.workloads;
        st.pending.retain(|p| {
            if p.due_at_list > now {
                return true;
            }
            if let Some(w) = workloads.iter_mut().find(|w| w.id == p.id) {
                w.state = p.state;
                w.status = p.state.to_string();
            }
            false
        });
        Ok(st.workloads.clone())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.transition(Call::Start(id.to_string()), id, WorkloadState::Running)
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.transition(Call::Stop(id.to_string()), id, WorkloadState::Exited)
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.transition(Call::Restart(id.to_string()), id, WorkloadState::Running)
    }

    async fn exec(&self, id: &str, argv: &[String]) -> Result<ExecOutput> {
        let mut st = self.lock();
        st.calls.push(Call::Exec(id.to_string(), argv.to_vec()));
        if !st.workloads.iter().any(|w| w.id == id) {
            return Err(DockhandError::TargetNotFound(id.to_string()));
        }
        Ok(st.exec_output.clone())
    }
}

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }
}
