//! Standby sizer — decides a fleet's next standby target.
//!
//! A pure function of the fleet's observed counts, its current target and
//! its floor. Nothing here touches a store; the reconciler applies the
//! decision.

use tracing::debug;

use crate::policy::SizerPolicy;

/// How hard demand is pressing on the warm pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Pressure {
    Mild,
    Severe,
    Critical,
}

/// The sizer's verdict for one fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandbyDecision {
    /// Demand outran the pool: raise the target.
    Escalate { to: u32, pressure: Pressure },
    /// No pressure: halve the distance to the floor.
    Converge { to: u32 },
    /// Keep the current target.
    NoChange,
}

impl StandbyDecision {
    /// True only when demand pressure raised the target.
    pub fn changed(&self) -> bool {
        matches!(self, StandbyDecision::Escalate { .. })
    }

    /// The target to request, given the one currently requested.
    pub fn new_target(&self, current: u32) -> u32 {
        match *self {
            StandbyDecision::Escalate { to, .. } | StandbyDecision::Converge { to } => to,
            StandbyDecision::NoChange => current,
        }
    }
}

/// Applies a [`SizerPolicy`] to fleet observations.
#[derive(Debug, Clone, Default)]
pub struct StandbySizer {
    policy: SizerPolicy,
}

impl StandbySizer {
    pub fn new(policy: SizerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SizerPolicy {
        &self.policy
    }

    /// Decide the next standby target.
    ///
    /// `active` and `standby` are observed worker counts, `target` the
    /// currently requested standby count and `floor` the fleet's recorded
    /// minimum.
    pub fn decide(&self, active: u32, standby: u32, target: u32, floor: u32) -> StandbyDecision {
        if active > target
            && let Some(pressure) = self.pressure(standby, floor)
        {
            let to = scale(target, self.multiplier(pressure));
            if to != target {
                debug!(
                    active,
                    standby,
                    floor,
                    from = target,
                    to,
                    ?pressure,
                    "escalating standby target"
                );
                return StandbyDecision::Escalate { to, pressure };
            }
        }

        if target > floor {
            let to = floor + (target - floor) / 2;
            debug!(floor, from = target, to, "converging standby target toward floor");
            return StandbyDecision::Converge { to };
        }

        StandbyDecision::NoChange
    }

    /// Most severe threshold the standby-to-floor ratio falls under.
    ///
    /// A zero floor leaves the ratio undefined, which counts as below every
    /// threshold.
    fn pressure(&self, standby: u32, floor: u32) -> Option<Pressure> {
        let ratio = (floor > 0).then(|| f64::from(standby) / f64::from(floor));
        let below = |threshold: f64| ratio.is_none_or(|r| r < threshold);

        let mut matched = None;
        for (threshold, pressure) in [
            (self.policy.mild_ratio, Pressure::Mild),
            (self.policy.severe_ratio, Pressure::Severe),
            (self.policy.critical_ratio, Pressure::Critical),
        ] {
            if below(threshold) {
                matched = Some(matched.map_or(pressure, |m: Pressure| m.max(pressure)));
            }
        }
        matched
    }

    fn multiplier(&self, pressure: Pressure) -> f64 {
        match pressure {
            Pressure::Mild => self.policy.mild_multiplier,
            Pressure::Severe => self.policy.severe_multiplier,
            Pressure::Critical => self.policy.critical_multiplier,
        }
    }
}

/// Decide with the default policy.
pub fn decide(active: u32, standby: u32, target: u32, floor: u32) -> StandbyDecision {
    StandbySizer::default().decide(active, standby, target, floor)
}

/// `round(target * factor)`, saturating at `u32::MAX`.
fn scale(target: u32, factor: f64) -> u32 {
    let scaled = (f64::from(target) * factor).round();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Escalation ─────────────────────────────────────────────────

    #[test]
    fn mild_pressure_raises_by_half() {
        // ratio 8/20 = 0.4
        let decision = decide(100, 8, 50, 20);
        assert_eq!(
            decision,
            StandbyDecision::Escalate {
                to: 75,
                pressure: Pressure::Mild
            }
        );
        assert!(decision.changed());
    }

    #[test]
    fn mild_multiplier_rounds() {
        // ratio 2/5 = 0.4, 1.5 * 5 = 7.5
        assert_eq!(decide(10, 2, 5, 5).new_target(5), 8);
    }

    #[test]
    fn severe_pressure_triples() {
        // ratio 4/20 = 0.2
        assert_eq!(
            decide(100, 4, 50, 20),
            StandbyDecision::Escalate {
                to: 150,
                pressure: Pressure::Severe
            }
        );
    }

    #[test]
    fn critical_pressure_quadruples() {
        assert_eq!(
            decide(100, 0, 50, 20),
            StandbyDecision::Escalate {
                to: 200,
                pressure: Pressure::Critical
            }
        );
    }

    #[test]
    fn most_severe_branch_wins_whatever_else_matches() {
        for floor in [1u32, 7, 20, 1000] {
            for target in [1u32, 3, 50, 999] {
                let decision = decide(target + 1, 0, target, floor);
                assert_eq!(decision.new_target(target), 4 * target);
            }
        }
    }

    #[test]
    fn threshold_boundary_is_strict() {
        // ratio exactly 0.25: severe does not fire, mild does.
        assert_eq!(decide(100, 5, 50, 20).new_target(50), 75);
        // ratio exactly 0.5: nothing escalates, converge instead.
        assert_eq!(
            decide(100, 10, 50, 20),
            StandbyDecision::Converge { to: 35 }
        );
    }

    #[test]
    fn checks_use_real_division() {
        // 1/3 = 0.33; integer division would give 0 and look critical.
        assert_eq!(
            decide(10, 1, 6, 3),
            StandbyDecision::Escalate {
                to: 9,
                pressure: Pressure::Mild
            }
        );
    }

    #[test]
    fn zero_floor_counts_as_critical() {
        assert_eq!(
            decide(10, 5, 2, 0),
            StandbyDecision::Escalate {
                to: 8,
                pressure: Pressure::Critical
            }
        );
    }

    #[test]
    fn zero_target_cannot_escalate() {
        assert_eq!(decide(10, 0, 0, 0), StandbyDecision::NoChange);
    }

    #[test]
    fn escalation_saturates() {
        let decision = decide(u32::MAX, 0, u32::MAX / 2, 10);
        assert_eq!(decision.new_target(0), u32::MAX);
    }

    // ── Convergence ────────────────────────────────────────────────

    #[test]
    fn active_at_or_below_target_never_escalates() {
        for active in [0u32, 10, 49, 50] {
            for standby in [0u32, 1, 10, 100] {
                let decision = decide(active, standby, 50, 20);
                assert!(!decision.changed(), "active={active} standby={standby}");
            }
        }
    }

    #[test]
    fn converges_halfway_to_floor() {
        let decision = decide(30, 0, 50, 20);
        assert_eq!(decision, StandbyDecision::Converge { to: 35 });
        assert!(!decision.changed());
    }

    #[test]
    fn at_floor_holds() {
        assert_eq!(decide(5, 0, 20, 20), StandbyDecision::NoChange);
        assert_eq!(decide(5, 0, 20, 20).new_target(20), 20);
    }

    #[test]
    fn below_floor_is_left_alone() {
        assert_eq!(decide(5, 0, 10, 20), StandbyDecision::NoChange);
    }

    #[test]
    fn convergence_is_monotone_and_terminates() {
        let floor = 3u32;
        let mut target = 100_003u32;
        let bound = (32 - (target - floor).leading_zeros()) + 1;
        let mut passes = 0;

        loop {
            let next = decide(0, 0, target, floor).new_target(target);
            assert!(next <= target);
            assert!(next >= floor);
            if next == target {
                break;
            }
            target = next;
            passes += 1;
        }

        assert_eq!(target, floor);
        assert!(passes <= bound, "took {passes} passes, bound {bound}");
    }

    #[test]
    fn escalation_beats_convergence() {
        // target above floor and under pressure: grow, don't shrink.
        assert_eq!(decide(100, 1, 40, 10).new_target(40), 120);
    }

    // ── Policy ─────────────────────────────────────────────────────

    #[test]
    fn custom_policy_changes_multiplier() {
        let sizer = StandbySizer::new(SizerPolicy {
            mild_multiplier: 2.0,
            ..SizerPolicy::default()
        });
        assert_eq!(sizer.decide(100, 8, 50, 20).new_target(50), 100);
    }
}
