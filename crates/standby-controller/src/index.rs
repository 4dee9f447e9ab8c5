//! Watch events and the worker → fleet owner index.

use serde::{Deserialize, Serialize};

use standby_state::{FleetId, FleetState, WorkerRecord};

/// Identity of the fleet resource kind.
///
/// Floor records point at their fleet with an owner reference of this
/// kind, and workers are mapped to fleets through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetKind {
    pub api_version: String,
    pub kind: String,
}

impl Default for FleetKind {
    fn default() -> Self {
        Self {
            api_version: "standby.io/v1alpha1".to_string(),
            kind: "Fleet".to_string(),
        }
    }
}

impl FleetKind {
    /// Fleets a worker belongs to: its managing owner, if that owner is a
    /// fleet of this kind.
    pub fn fleets_for(&self, worker: &WorkerRecord) -> Vec<FleetId> {
        let Some(owner) = &worker.owner else {
            return Vec::new();
        };
        if !owner.controller || owner.api_version != self.api_version || owner.kind != self.kind {
            return Vec::new();
        }
        vec![format!("{}/{}", worker.namespace, owner.name)]
    }
}

/// Something the watch channel observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A fleet was created or changed.
    Fleet(FleetState),
    /// A worker was created or changed.
    Worker(WorkerRecord),
    /// A fleet was deleted.
    Deleted { fleet_id: FleetId },
}

impl WatchEvent {
    /// Fleets that need a pass because of this event.
    pub fn fleet_ids(&self, kind: &FleetKind) -> Vec<FleetId> {
        match self {
            WatchEvent::Fleet(fleet) => vec![fleet.table_key()],
            WatchEvent::Worker(worker) => kind.fleets_for(worker),
            WatchEvent::Deleted { fleet_id } => vec![fleet_id.clone()],
        }
    }
}
