//! standby-controller — keeps each fleet's warm pool sized to demand.
//!
//! One reconciliation pass loads a fleet, makes sure its floor record
//! exists, asks the sizer for a verdict and writes the new standby target
//! back with optimistic concurrency. Passes keep no state of their own, so
//! re-running one after a crash or a missed event is always safe.
//!
//! # Components
//!
//! - **`floor`** — lazily created, immutable per-fleet floor records
//! - **`reconciler`** — a single pass for one fleet
//! - **`index`** — typed watch events and the worker → fleet owner index
//! - **`controller`** — in-process driver: resync ticker, event channel,
//!   per-fleet mutual exclusion, bounded concurrency
//! - **`store`** — the store seam the passes run against

pub mod config;
pub mod controller;
pub mod error;
pub mod floor;
pub mod index;
pub mod reconciler;
pub mod store;

pub use config::ControllerConfig;
pub use controller::StandbyController;
pub use error::{ReconcileError, ReconcileResult};
pub use floor::{parse_floor, FloorStore};
pub use index::{FleetKind, WatchEvent};
pub use reconciler::{PassContext, PassOutcome, Reconciler};
pub use store::ControlStore;
