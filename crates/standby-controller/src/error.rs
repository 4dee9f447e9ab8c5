//! Reconciliation error types.

use thiserror::Error;

use standby_state::StateError;

/// Errors that end a reconciliation pass without a decision.
///
/// Benign store outcomes (fleet gone, create race, update conflict) are
/// not errors; they surface as [`crate::PassOutcome`] variants.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("state store error: {0}")]
    Store(#[from] StateError),

    #[error("malformed floor for fleet {fleet}: {reason}")]
    MalformedFloor { fleet: String, reason: String },

    /// The record under the fleet's key belongs to an earlier fleet with
    /// the same name. Its removal is pending; it is never used as a floor.
    #[error("floor record for fleet {fleet} is owned by {owner_uid}, not {fleet_uid}")]
    StaleFloor {
        fleet: String,
        owner_uid: String,
        fleet_uid: String,
    },
}

impl ReconcileError {
    /// Whether re-running the pass later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Store(_) | ReconcileError::StaleFloor { .. } => true,
            ReconcileError::MalformedFloor { .. } => false,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
