//! StateStore — redb-backed persistence for fleets and floor records.
//!
//! Provides typed operations with the semantics an orchestration platform's
//! object store gives a controller: optimistic-concurrency updates on
//! fleets, create-if-absent on floor records, and cascading deletion of
//! records whose owner reference points at a deleted fleet. Every mutation
//! runs in a single redb write transaction, so it either commits fully or
//! not at all.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, WriteTransaction};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(FLEETS).map_err(map_err!(Table))?;
        txn.open_table(FLOORS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Fleets ─────────────────────────────────────────────────────

    /// Insert or replace a fleet unconditionally.
    ///
    /// This is the platform-side write (the fleet's owner publishing new
    /// counts). The stored `resource_version` is bumped past whatever was
    /// there before; the returned value carries it. Replacing a fleet with
    /// one of a different uid is a delete plus a create: floor records
    /// owned by the old uid go with it.
    pub fn put_fleet(&self, fleet: &FleetState) -> StateResult<FleetState> {
        let key = fleet.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        let previous: Option<FleetState>;
        {
            let mut table = txn.open_table(FLEETS).map_err(map_err!(Table))?;
            previous = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            let mut next = fleet.clone();
            next.resource_version = previous.as_ref().map_or(0, |p| p.resource_version) + 1;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored = next;
        }
        let mut cascaded = 0;
        if let Some(prev) = &previous
            && prev.uid != fleet.uid
        {
            cascaded = remove_owned_floors(&txn, &prev.uid)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version = stored.resource_version, cascaded, "fleet stored");
        Ok(stored)
    }

    /// Get a fleet by namespace/name key.
    pub fn get_fleet(&self, key: &str) -> StateResult<Option<FleetState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FLEETS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let fleet: FleetState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(fleet))
            }
            None => Ok(None),
        }
    }

    /// List all fleets.
    pub fn list_fleets(&self) -> StateResult<Vec<FleetState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FLEETS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let fleet: FleetState =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(fleet);
        }
        Ok(results)
    }

    /// Replace a fleet if nobody wrote it since it was read.
    ///
    /// `fleet.resource_version` must equal the stored version, otherwise
    /// the write is rejected with [`StateError::Conflict`]. A missing fleet
    /// yields [`StateError::NotFound`].
    pub fn update_fleet(&self, fleet: &FleetState) -> StateResult<FleetState> {
        let key = fleet.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(FLEETS).map_err(map_err!(Table))?;
            let current: FleetState = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(key)),
            };
            if current.resource_version != fleet.resource_version {
                return Err(StateError::Conflict {
                    key,
                    expected: fleet.resource_version,
                    found: current.resource_version,
                });
            }
            let mut next = fleet.clone();
            next.resource_version = current.resource_version + 1;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored = next;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, version = stored.resource_version, "fleet updated");
        Ok(stored)
    }

    /// Delete a fleet by key. Returns true if it existed.
    ///
    /// Floor records whose owner reference carries the deleted fleet's uid
    /// are removed in the same transaction.
    pub fn delete_fleet(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed: Option<FleetState>;
        let mut cascaded = 0;
        {
            let mut fleets = txn.open_table(FLEETS).map_err(map_err!(Table))?;
            removed = match fleets.remove(key).map_err(map_err!(Write))? {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };
        }
        if let Some(fleet) = &removed {
            cascaded = remove_owned_floors(&txn, &fleet.uid)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed = removed.is_some(), cascaded, "fleet deleted");
        Ok(removed.is_some())
    }

    // ── Floors ─────────────────────────────────────────────────────

    /// Create a floor record if none exists under its key.
    ///
    /// Returns [`StateError::AlreadyExists`] when another writer got there
    /// first; the existing record is left untouched. The owner must be
    /// alive: if no fleet with the owner's uid is stored under the key the
    /// write is rejected with [`StateError::NotFound`], so a record can
    /// never outlive the cascade that should have removed it.
    pub fn create_floor(&self, record: &FloorRecord) -> StateResult<FloorRecord> {
        let key = record.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let fleets = txn.open_table(FLEETS).map_err(map_err!(Table))?;
            let owner_alive = match fleets.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    let fleet: FleetState =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    fleet.uid == record.owner.uid
                }
                None => false,
            };
            if !owner_alive {
                return Err(StateError::NotFound(key));
            }
        }
        {
            let mut table = txn.open_table(FLOORS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(key));
            }
            let mut next = record.clone();
            next.resource_version = 1;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            stored = next;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "floor record created");
        Ok(stored)
    }

    /// Get a floor record by its fleet's namespace/name key.
    pub fn get_floor(&self, key: &str) -> StateResult<Option<FloorRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FLOORS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: FloorRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all floor records.
    pub fn list_floors(&self) -> StateResult<Vec<FloorRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(FLOORS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: FloorRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }
}

/// Remove every floor record owned by `uid`. Returns how many went.
fn remove_owned_floors(txn: &WriteTransaction, uid: &str) -> StateResult<u32> {
    let mut floors = txn.open_table(FLOORS).map_err(map_err!(Table))?;
    let mut owned = Vec::new();
    for entry in floors.iter().map_err(map_err!(Read))? {
        let (k, value) = entry.map_err(map_err!(Read))?;
        let record: FloorRecord =
            serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if record.owner.uid == uid {
            owned.push(k.value().to_string());
        }
    }
    for k in &owned {
        floors.remove(k.as_str()).map_err(map_err!(Write))?;
    }
    Ok(owned.len() as u32)
}
