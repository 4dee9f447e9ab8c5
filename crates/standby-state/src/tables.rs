//! redb table definitions for the standby state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Keys follow the pattern `{namespace}/{name}`.

use redb::TableDefinition;

/// Fleet state keyed by `{namespace}/{name}`.
pub const FLEETS: TableDefinition<&str, &[u8]> = TableDefinition::new("fleets");

/// Floor records keyed by the owning fleet's `{namespace}/{name}`.
pub const FLOORS: TableDefinition<&str, &[u8]> = TableDefinition::new("floors");
