//! StandbyController — drives reconciliation passes.
//!
//! Passes are triggered by watch events and by a periodic resync over all
//! fleets. Each pass runs on the blocking pool (store calls are
//! synchronous) under a semaphore, with its own deadline. A fleet is never
//! reconciled by two passes at once: a trigger that arrives while one is
//! running is deferred and picked up by the next event or resync.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use standby_sizer::StandbySizer;
use standby_state::{FleetId, StateError};

use crate::config::ControllerConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::index::{FleetKind, WatchEvent};
use crate::reconciler::{PassContext, PassOutcome, Reconciler};
use crate::store::ControlStore;

/// Result of one pass, tagged with its fleet.
pub type PassReport = (FleetId, ReconcileResult<PassOutcome>);

/// Fleets with a pass currently running.
#[derive(Default)]
struct InFlight {
    fleets: Mutex<HashSet<FleetId>>,
}

/// Holds a fleet's slot in [`InFlight`] until dropped.
struct InFlightGuard {
    set: Arc<InFlight>,
    fleet: FleetId,
}

impl InFlight {
    fn acquire(set: &Arc<InFlight>, fleet: &str) -> Option<InFlightGuard> {
        let mut fleets = set.fleets.lock().unwrap_or_else(PoisonError::into_inner);
        if !fleets.insert(fleet.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(set),
            fleet: fleet.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .fleets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.fleet);
    }
}

/// Reconciles fleets on events and on a resync ticker.
pub struct StandbyController<S> {
    reconciler: Arc<Reconciler<S>>,
    kind: FleetKind,
    config: ControllerConfig,
    in_flight: Arc<InFlight>,
    permits: Arc<Semaphore>,
}

impl<S: ControlStore + Clone + 'static> StandbyController<S> {
    pub fn new(store: S, sizer: StandbySizer, config: ControllerConfig) -> Self {
        let kind = config.fleet_kind();
        Self {
            reconciler: Arc::new(Reconciler::new(store, kind.clone(), sizer)),
            kind,
            permits: Arc::new(Semaphore::new(config.concurrency())),
            in_flight: Arc::new(InFlight::default()),
            config,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    /// Reconcile every fleet an event touches.
    pub async fn handle_event(&self, event: &WatchEvent) -> Vec<PassReport> {
        self.dispatch(event, None).await
    }

    /// Reconcile every fleet in the store.
    pub async fn resync_all(&self) -> ReconcileResult<Vec<PassReport>> {
        self.resync(None).await
    }

    async fn dispatch(
        &self,
        event: &WatchEvent,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> Vec<PassReport> {
        let ids = event.fleet_ids(&self.kind);
        if ids.is_empty() {
            debug!(?event, "event maps to no fleet");
            return Vec::new();
        }
        self.reconcile_many(ids, shutdown).await
    }

    async fn resync(
        &self,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> ReconcileResult<Vec<PassReport>> {
        let store = self.reconciler.store().clone();
        let fleets = tokio::task::spawn_blocking(move || store.list_fleets())
            .await
            .map_err(|e| ReconcileError::Store(StateError::Read(e.to_string())))??;
        let ids: Vec<FleetId> = fleets.iter().map(|f| f.table_key()).collect();
        debug!(fleets = ids.len(), "resyncing");
        Ok(self.reconcile_many(ids, shutdown).await)
    }

    /// Run one pass per distinct fleet, at most `max_concurrent_passes`
    /// at a time.
    async fn reconcile_many(
        &self,
        ids: Vec<FleetId>,
        shutdown: Option<watch::Receiver<bool>>,
    ) -> Vec<PassReport> {
        let ids: BTreeSet<FleetId> = ids.into_iter().collect();
        let mut reports = Vec::with_capacity(ids.len());
        let mut passes = JoinSet::new();

        for id in ids {
            let Some(guard) = InFlight::acquire(&self.in_flight, &id) else {
                debug!(fleet = %id, "pass already running, deferring");
                reports.push((id, Ok(PassOutcome::Deferred)));
                continue;
            };
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };

            let mut ctx = PassContext::new().with_timeout(self.config.pass_timeout());
            if let Some(rx) = &shutdown {
                ctx = ctx.with_shutdown(rx.clone());
            }
            let reconciler = Arc::clone(&self.reconciler);
            passes.spawn_blocking(move || {
                let _permit = permit;
                let _guard = guard;
                let result = reconciler.reconcile(&id, &ctx);
                (id, result)
            });
        }

        while let Some(joined) = passes.join_next().await {
            match joined {
                Ok((id, result)) => {
                    log_failure(&id, &result);
                    reports.push((id, result));
                }
                Err(e) => error!(error = %e, "reconcile task failed"),
            }
        }
        reports
    }

    /// Run the controller until shutdown.
    ///
    /// Resyncs every `resync_interval_secs` and reconciles the fleets named
    /// by incoming events in between. A closed event channel leaves the
    /// resync ticker running.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            resync_secs = self.config.resync_interval().as_secs(),
            max_concurrent = self.config.concurrency(),
            "standby controller started"
        );

        let passes_shutdown = shutdown.clone();
        let mut ticker = resync_ticker(&self.config);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.resync(Some(passes_shutdown.clone())).await {
                        error!(error = %e, "resync failed");
                    }
                }
                Some(event) = events.recv() => {
                    self.dispatch(&event, Some(passes_shutdown.clone())).await;
                }
                _ = shutdown.changed() => {
                    info!("standby controller shutting down");
                    break;
                }
            }
        }
    }
}

/// A resync that overruns the interval pushes the next one back instead of
/// triggering a burst of catch-up resyncs.
fn resync_ticker(config: &ControllerConfig) -> Interval {
    let mut ticker = tokio::time::interval(config.resync_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn log_failure(fleet: &str, result: &ReconcileResult<PassOutcome>) {
    match result {
        Err(e) if e.is_retryable() => {
            warn!(fleet = %fleet, error = %e, "reconcile failed, will retry");
        }
        Err(e) => {
            error!(fleet = %fleet, error = %e, "reconcile aborted, fleet left untouched");
        }
        Ok(PassOutcome::Cancelled) => debug!(fleet = %fleet, "pass cancelled"),
        Ok(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use standby_state::{FleetState, StateStore};

    fn fleet(name: &str, active: u32, standby: u32, target: u32) -> FleetState {
        FleetState {
            namespace: "games".to_string(),
            name: name.to_string(),
            uid: format!("uid-{name}"),
            build_id: "build-42".to_string(),
            active_count: active,
            standby_count: standby,
            target_standby: target,
            resource_version: 0,
        }
    }

    fn controller(store: &StateStore) -> StandbyController<StateStore> {
        StandbyController::new(
            store.clone(),
            StandbySizer::default(),
            ControllerConfig::default(),
        )
    }

    #[test]
    fn in_flight_guard_excludes_and_releases() {
        let set = Arc::new(InFlight::default());
        let guard = InFlight::acquire(&set, "games/arena").unwrap();
        assert!(InFlight::acquire(&set, "games/arena").is_none());
        assert!(InFlight::acquire(&set, "games/other").is_some());
        drop(guard);
        assert!(InFlight::acquire(&set, "games/arena").is_some());
    }

    #[tokio::test]
    async fn resync_visits_every_fleet() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_fleet(&fleet("a", 1, 0, 5)).unwrap();
        store.put_fleet(&fleet("b", 1, 0, 5)).unwrap();

        let mut reports = controller(&store).resync_all().await.unwrap();
        reports.sort_by(|x, y| x.0.cmp(&y.0));

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, "games/a");
        assert!(matches!(reports[0].1, Ok(PassOutcome::Unchanged)));
        assert_eq!(store.list_floors().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn zero_pass_timeout_still_reconciles() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_fleet(&fleet("arena", 1, 0, 5)).unwrap();
        let controller = StandbyController::new(
            store.clone(),
            StandbySizer::default(),
            ControllerConfig {
                pass_timeout_ms: 0,
                ..ControllerConfig::default()
            },
        );

        let reports = controller.resync_all().await.unwrap();

        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].1, Ok(PassOutcome::Unchanged)));
        assert!(store.get_floor("games/arena").unwrap().is_some());
    }

    #[tokio::test]
    async fn overrun_resyncs_are_delayed_not_burst() {
        let ticker = resync_ticker(&ControllerConfig::default());
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert_eq!(ticker.period(), std::time::Duration::from_secs(30));
    }

    #[tokio::test]
    async fn duplicate_ids_run_once() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_fleet(&fleet("a", 1, 0, 5)).unwrap();

        let reports = controller(&store)
            .reconcile_many(vec!["games/a".to_string(), "games/a".to_string()], None)
            .await;
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn busy_fleet_is_deferred() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_fleet(&fleet("a", 1, 0, 5)).unwrap();
        let controller = controller(&store);

        let _held = InFlight::acquire(&controller.in_flight, "games/a").unwrap();
        let reports = controller
            .handle_event(&WatchEvent::Fleet(fleet("a", 1, 0, 5)))
            .await;

        assert!(matches!(reports[0].1, Ok(PassOutcome::Deferred)));
        assert!(store.get_floor("games/a").unwrap().is_none());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_fleet(&fleet("a", 1, 0, 5)).unwrap();
        let controller = Arc::new(controller(&store));

        let (events_tx, events_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.run(events_rx, shutdown_rx).await })
        };

        events_tx
            .send(WatchEvent::Fleet(fleet("a", 1, 0, 5)))
            .await
            .unwrap();
        // The first tick resyncs immediately; wait until the floor exists.
        for _ in 0..100 {
            if store.get_floor("games/a").unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(store.get_floor("games/a").unwrap().is_some());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
