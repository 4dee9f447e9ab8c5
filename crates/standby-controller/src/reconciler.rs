//! Reconciler — one sizing pass for one fleet.
//!
//! A pass is a pure function of what the store holds right now: load the
//! fleet, ensure its floor record, decide, and write back only if the
//! target actually moves. Not-found, creation races and update conflicts
//! all end the pass cleanly; the next trigger re-derives everything from
//! fresh data.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

use standby_sizer::{StandbyDecision, StandbySizer};

use crate::error::{ReconcileError, ReconcileResult};
use crate::floor::{parse_floor, FloorStore};
use crate::index::FleetKind;
use crate::store::ControlStore;

/// Cancellation for a single pass.
///
/// Checked before every store round trip and right before the write. The
/// write itself is one transaction, so a cancelled pass never leaves a
/// half-applied update behind.
#[derive(Debug, Clone, Default)]
pub struct PassContext {
    deadline: Option<Instant>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl PassContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return true;
        }
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The fleet no longer exists.
    FleetGone,
    /// The target is already where the sizer wants it.
    Unchanged,
    /// Demand pressure raised the target.
    Escalated { from: u32, to: u32 },
    /// The target moved toward the floor.
    Converged { from: u32, to: u32 },
    /// Someone else wrote the fleet since it was read.
    Conflict,
    /// The pass was cancelled before it could write.
    Cancelled,
    /// Another pass for the same fleet was already running.
    Deferred,
}

impl PassOutcome {
    /// Whether the pass wrote a new target.
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            PassOutcome::Escalated { .. } | PassOutcome::Converged { .. }
        )
    }
}

/// Runs sizing passes against a store.
pub struct Reconciler<S> {
    store: S,
    floors: FloorStore<S>,
    sizer: StandbySizer,
}

impl<S: ControlStore + Clone> Reconciler<S> {
    pub fn new(store: S, kind: FleetKind, sizer: StandbySizer) -> Self {
        Self {
            floors: FloorStore::new(store.clone(), kind),
            store,
            sizer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile one fleet.
    ///
    /// Errors are either retryable store failures or a malformed floor
    /// record; every other store outcome maps to a [`PassOutcome`].
    pub fn reconcile(&self, fleet_id: &str, ctx: &PassContext) -> ReconcileResult<PassOutcome> {
        if ctx.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        let Some(fleet) = self.store.get_fleet(fleet_id)? else {
            info!(fleet = %fleet_id, "fleet not found, skipping");
            return Ok(PassOutcome::FleetGone);
        };

        if ctx.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        let record = match self.floors.ensure(&fleet) {
            Ok(record) => record,
            Err(ReconcileError::Store(e)) if e.is_not_found() => {
                info!(fleet = %fleet_id, "fleet went away while ensuring floor");
                return Ok(PassOutcome::FleetGone);
            }
            Err(e) => return Err(e),
        };
        let floor = parse_floor(&record)?;

        let current = fleet.target_standby;
        let decision = self
            .sizer
            .decide(fleet.active_count, fleet.standby_count, current, floor);
        let proposed = decision.new_target(current);
        if proposed == current {
            debug!(
                fleet = %fleet_id,
                active = fleet.active_count,
                standby = fleet.standby_count,
                target = current,
                floor,
                "standby target unchanged"
            );
            return Ok(PassOutcome::Unchanged);
        }

        if ctx.is_cancelled() {
            return Ok(PassOutcome::Cancelled);
        }

        let mut desired = fleet;
        desired.target_standby = proposed;
        match self.store.update_fleet(&desired) {
            Ok(_) => {
                let outcome = match decision {
                    StandbyDecision::Escalate { .. } => PassOutcome::Escalated {
                        from: current,
                        to: proposed,
                    },
                    _ => PassOutcome::Converged {
                        from: current,
                        to: proposed,
                    },
                };
                info!(
                    fleet = %fleet_id,
                    from = current,
                    to = proposed,
                    floor,
                    escalated = decision.changed(),
                    "standby target updated"
                );
                Ok(outcome)
            }
            Err(e) if e.is_conflict() => {
                info!(
                    fleet = %fleet_id,
                    error = %e,
                    "fleet changed concurrently, leaving it to the next pass"
                );
                Ok(PassOutcome::Conflict)
            }
            Err(e) if e.is_not_found() => {
                info!(fleet = %fleet_id, "fleet deleted before update");
                Ok(PassOutcome::FleetGone)
            }
            Err(e) => Err(e.into()),
        }
    }
}
