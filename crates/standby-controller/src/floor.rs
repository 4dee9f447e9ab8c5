//! Floor records — the per-fleet minimum standby target.
//!
//! A record is created the first time a fleet is reconciled, taking the
//! fleet's target at that moment as its floor, and is never modified by
//! the controller afterwards. Its owner reference ties it to the fleet so
//! the store removes it together with the fleet.

use tracing::{debug, info};

use standby_state::{floor_fields, FleetState, FloorRecord, StateError};

use crate::error::{ReconcileError, ReconcileResult};
use crate::index::FleetKind;
use crate::store::ControlStore;

/// Create-if-absent access to floor records.
#[derive(Debug, Clone)]
pub struct FloorStore<S> {
    store: S,
    kind: FleetKind,
}

impl<S: ControlStore> FloorStore<S> {
    pub fn new(store: S, kind: FleetKind) -> Self {
        Self { store, kind }
    }

    /// Return the fleet's floor record, creating it from the fleet's
    /// current target if it does not exist yet.
    ///
    /// Losing a creation race to another writer is not an error: the
    /// winner's record is read back and returned. A record owned by
    /// another uid is reported as [`ReconcileError::StaleFloor`].
    pub fn ensure(&self, fleet: &FleetState) -> ReconcileResult<FloorRecord> {
        let key = fleet.table_key();
        if let Some(record) = self.store.get_floor(&key)? {
            return owned_by(record, fleet);
        }

        let owner = fleet.owner_reference(&self.kind.api_version, &self.kind.kind);
        let record = FloorRecord::from_fleet(fleet, owner);
        match self.store.create_floor(&record) {
            Ok(created) => {
                info!(
                    fleet = %key,
                    floor = fleet.target_standby,
                    build_id = %fleet.build_id,
                    "floor record created"
                );
                Ok(created)
            }
            Err(e) if e.is_already_exists() => {
                debug!(fleet = %key, "floor record created concurrently, reading it back");
                let record = self
                    .store
                    .get_floor(&key)?
                    .ok_or_else(|| ReconcileError::Store(StateError::NotFound(key)))?;
                owned_by(record, fleet)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn owned_by(record: FloorRecord, fleet: &FleetState) -> ReconcileResult<FloorRecord> {
    if record.owner.uid != fleet.uid {
        return Err(ReconcileError::StaleFloor {
            fleet: fleet.table_key(),
            owner_uid: record.owner.uid,
            fleet_uid: fleet.uid.clone(),
        });
    }
    Ok(record)
}

/// Read the floor out of a record.
///
/// A missing or non-numeric value is a data-integrity problem; no default
/// is substituted.
pub fn parse_floor(record: &FloorRecord) -> ReconcileResult<u32> {
    let fleet = record.table_key();
    let raw = record
        .field(floor_fields::FLOOR)
        .ok_or_else(|| ReconcileError::MalformedFloor {
            fleet: fleet.clone(),
            reason: format!("missing `{}` field", floor_fields::FLOOR),
        })?;
    raw.trim()
        .parse::<u32>()
        .map_err(|e| ReconcileError::MalformedFloor {
            fleet,
            reason: format!("{raw:?}: {e}"),
        })
}
