//! standby-state — embedded store for fleets and their floor records.
//!
//! Backed by [redb](https://docs.rs/redb), it plays the part of the
//! orchestration platform's object store: fleets are read and updated with
//! optimistic concurrency, floor records are created with create-if-absent
//! semantics, and deleting a fleet cascades to the records it owns.
//!
//! # Architecture
//!
//! Both record kinds are JSON-serialized into redb's `&[u8]` value columns
//! under the composite key `{namespace}/{name}`. A floor record shares its
//! key with the fleet that owns it.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
