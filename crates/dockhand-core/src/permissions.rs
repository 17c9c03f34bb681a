//! Layered permission model: admin override, then per-actor grants, then
//! per-role grants.
//!
//! Everything here is pure over names. Whether a workload name actually
//! exists is the caller's concern (see `Orchestrator::grant`).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Actor, GrantScope, Operation, PermissionClass};

/// subject id → workload names. A key is present only while its set is
/// non-empty.
pub type GrantMap = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PermissionMatrix {
    #[serde(rename = "AdminIDs", default)]
    pub admin_ids: BTreeSet<String>,
    #[serde(default)]
    pub user_start_permissions: GrantMap,
    #[serde(default)]
    pub user_stop_permissions: GrantMap,
    #[serde(default)]
    pub role_start_permissions: GrantMap,
    #[serde(default)]
    pub role_stop_permissions: GrantMap,
    /// Keys of the enclosing settings block this crate does not interpret
    /// (bot token, whitelist flags). Carried through load and save untouched.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// Start and stop grants held directly by one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectGrants {
    pub start: Vec<String>,
    pub stop: Vec<String>,
}

impl SubjectGrants {
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.stop.is_empty()
    }
}

/// What an actor can do once user and role grants are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveGrants {
    pub is_admin: bool,
    pub start: BTreeSet<String>,
    pub stop: BTreeSet<String>,
}

impl PermissionMatrix {
    pub fn is_admin(&self, actor_id: &str) -> bool {
        self.admin_ids.contains(actor_id)
    }

    /// Decide whether `actor` may perform `operation` on `workload`.
    ///
    /// First match wins: admin, then the actor's own grants, then any of the
    /// actor's roles.
    pub fn authorize(&self, actor: &Actor, operation: Operation, workload: &str) -> bool {
        if self.is_admin(&actor.id) {
            return true;
        }

        let class = operation.permission_class();
        if holds(self.map(GrantScope::User, class), &actor.id, workload) {
            return true;
        }

        let roles = self.map(GrantScope::Role, class);
        actor
            .roles
            .iter()
            .any(|role| holds(roles, role, workload))
    }

    /// Add a grant. Returns `false` if it was already present.
    pub fn grant(
        &mut self,
        subject: &str,
        workload: &str,
        class: PermissionClass,
        scope: GrantScope,
    ) -> bool {
        self.map_mut(scope, class)
            .entry(subject.to_string())
            .or_default()
            .insert(workload.to_string())
    }

    /// Remove a grant. Returns `false` if there was nothing to remove.
    ///
    /// Removing the last workload of a subject drops the subject's key.
    pub fn revoke(
        &mut self,
        subject: &str,
        workload: &str,
        class: PermissionClass,
        scope: GrantScope,
    ) -> bool {
        let map = self.map_mut(scope, class);
        let Some(set) = map.get_mut(subject) else {
            return false;
        };
        let removed = set.remove(workload);
        if set.is_empty() {
            map.remove(subject);
        }
        removed
    }

    /// Returns `false` if `actor_id` was already an admin.
    pub fn add_admin(&mut self, actor_id: &str) -> bool {
        self.admin_ids.insert(actor_id.to_string())
    }

    /// Returns `false` if `actor_id` was not an admin.
    pub fn remove_admin(&mut self, actor_id: &str) -> bool {
        self.admin_ids.remove(actor_id)
    }

    pub fn grants_for(&self, subject: &str, scope: GrantScope) -> SubjectGrants {
        let collect = |class: PermissionClass| -> Vec<String> {
            self.map(scope, class)
                .get(subject)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        };
        SubjectGrants {
            start: collect(PermissionClass::Start),
            stop: collect(PermissionClass::Stop),
        }
    }

    /// Union of the actor's user grants and those of every role it holds.
    pub fn effective(&self, actor: &Actor) -> EffectiveGrants {
        let mut out = EffectiveGrants {
            is_admin: self.is_admin(&actor.id),
            ..Default::default()
        };
        for (class, target) in [
            (PermissionClass::Start, &mut out.start),
            (PermissionClass::Stop, &mut out.stop),
        ] {
            if let Some(names) = self.map(GrantScope::User, class).get(&actor.id) {
                target.extend(names.iter().cloned());
            }
            let roles = self.map(GrantScope::Role, class);
            for role in &actor.roles {
                if let Some(names) = roles.get(role) {
                    target.extend(names.iter().cloned());
                }
            }
        }
        out
    }

    /// Drop empty grant lists, e.g. ones hand-edited into the settings file.
    pub fn prune_empty(&mut self) {
        for map in [
            &mut self.user_start_permissions,
            &mut self.user_stop_permissions,
            &mut self.role_start_permissions,
            &mut self.role_stop_permissions,
        ] {
            map.retain(|_, names| !names.is_empty());
        }
    }

    fn map(&self, scope: GrantScope, class: PermissionClass) -> &GrantMap {
        match (scope, class) {
            (GrantScope::User, PermissionClass::Start) => &self.user_start_permissions,
            (GrantScope::User, PermissionClass::Stop) => &self.user_stop_permissions,
            (GrantScope::Role, PermissionClass::Start) => &self.role_start_permissions,
            (GrantScope::Role, PermissionClass::Stop) => &self.role_stop_permissions,
        }
    }

    fn map_mut(&mut self, scope: GrantScope, class: PermissionClass) -> &mut GrantMap {
        match (scope, class) {
            (GrantScope::User, PermissionClass::Start) => &mut self.user_start_permissions,
            (GrantScope::User, PermissionClass::Stop) => &mut self.user_stop_permissions,
            (GrantScope::Role, PermissionClass::Start) => &mut self.role_start_permissions,
            (GrantScope::Role, PermissionClass::Stop) => &mut self.role_stop_permissions,
        }
    }
}

fn holds(map: &GrantMap, subject: &str, workload: &str) -> bool {
    map.get(subject).is_some_and(|names| names.contains(workload))
}
