//! The store operations a reconciliation pass needs.

use standby_state::{FleetState, FloorRecord, StateResult, StateStore};

/// Object store as seen by the controller.
///
/// `update_fleet` must reject stale writes with `StateError::Conflict` and
/// `create_floor` must report an existing record with
/// `StateError::AlreadyExists`.
pub trait ControlStore: Send + Sync {
    fn get_fleet(&self, key: &str) -> StateResult<Option<FleetState>>;
    fn list_fleets(&self) -> StateResult<Vec<FleetState>>;
    fn update_fleet(&self, fleet: &FleetState) -> StateResult<FleetState>;
    fn get_floor(&self, key: &str) -> StateResult<Option<FloorRecord>>;
    fn create_floor(&self, record: &FloorRecord) -> StateResult<FloorRecord>;
}

impl ControlStore for StateStore {
    fn get_fleet(&self, key: &str) -> StateResult<Option<FleetState>> {
        StateStore::get_fleet(self, key)
    }

    fn list_fleets(&self) -> StateResult<Vec<FleetState>> {
        StateStore::list_fleets(self)
    }

    fn update_fleet(&self, fleet: &FleetState) -> StateResult<FleetState> {
        StateStore::update_fleet(self, fleet)
    }

    fn get_floor(&self, key: &str) -> StateResult<Option<FloorRecord>> {
        StateStore::get_floor(self, key)
    }

    fn create_floor(&self, record: &FloorRecord) -> StateResult<FloorRecord> {
        StateStore::create_floor(self, record)
    }
}
