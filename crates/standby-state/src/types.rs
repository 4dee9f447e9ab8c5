//! Domain types for the standby state store.
//!
//! These types represent the persisted state of fleets, the floor records
//! owned by them, and the workers that report to them. All types are
//! serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a fleet (`{namespace}/{name}`).
pub type FleetId = String;

// ── Fleet ─────────────────────────────────────────────────────────

/// Observed and desired state of a fleet of workers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FleetState {
    pub namespace: String,
    pub name: String,
    /// Identity of this incarnation of the fleet; owner references point here.
    pub uid: String,
    /// Opaque build identifier, immutable.
    pub build_id: String,
    /// Workers currently serving traffic.
    pub active_count: u32,
    /// Workers currently idle and ready.
    pub standby_count: u32,
    /// Requested standby count.
    pub target_standby: u32,
    /// Bumped by the store on every successful write.
    #[serde(default)]
    pub resource_version: u64,
}

impl FleetState {
    /// Build the composite key for the fleets table.
    pub fn table_key(&self) -> FleetId {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Owner reference a dependent record should carry to bind its
    /// lifetime to this fleet.
    pub fn owner_reference(&self, api_version: &str, kind: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            controller: true,
        }
    }
}

// ── Ownership ─────────────────────────────────────────────────────

/// Weak back-reference from a dependent record to the object that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    /// Whether the owner is the managing controller of the dependent.
    pub controller: bool,
}

// ── Floor ─────────────────────────────────────────────────────────

/// Field names persisted in a floor record's data map.
pub mod floor_fields {
    pub const BUILD_ID: &str = "buildID";
    pub const FLOOR: &str = "floor";
    pub const ACTIVE: &str = "active";
    pub const STANDBY: &str = "standby";
    pub const TARGET: &str = "target";
}

/// Per-fleet record holding the minimum standby target.
///
/// Values are decimal text, so `42` is stored as `"42"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FloorRecord {
    pub namespace: String,
    pub name: String,
    pub owner: OwnerReference,
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_version: u64,
}

impl FloorRecord {
    /// Snapshot a fleet into a new floor record. The floor is the fleet's
    /// current target; `active`/`standby`/`target` are kept for observability.
    pub fn from_fleet(fleet: &FleetState, owner: OwnerReference) -> Self {
        let mut data = BTreeMap::new();
        data.insert(floor_fields::BUILD_ID.to_string(), fleet.build_id.clone());
        data.insert(
            floor_fields::FLOOR.to_string(),
            fleet.target_standby.to_string(),
        );
        data.insert(
            floor_fields::ACTIVE.to_string(),
            fleet.active_count.to_string(),
        );
        data.insert(
            floor_fields::STANDBY.to_string(),
            fleet.standby_count.to_string(),
        );
        data.insert(
            floor_fields::TARGET.to_string(),
            fleet.target_standby.to_string(),
        );
        Self {
            namespace: fleet.namespace.clone(),
            name: fleet.name.clone(),
            owner,
            data,
            resource_version: 0,
        }
    }

    /// Build the composite key for the floors table.
    pub fn table_key(&self) -> FleetId {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Raw field lookup.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(String::as_str)
    }
}

// ── Worker ────────────────────────────────────────────────────────

/// A single worker as seen by the watch channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerRecord {
    pub namespace: String,
    pub name: String,
    /// Carried as delivered by the watch; owner lookup does not depend on it.
    pub phase: WorkerPhase,
    /// Managing owner, if any.
    pub owner: Option<OwnerReference>,
}

/// Lifecycle phase of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPhase {
    Initializing,
    StandingBy,
    Active,
    Terminating,
}
