//! standby-sizer — demand-driven standby target sizing.
//!
//! Maps a fleet's observed counts and its floor to a new standby target.
//! Escalation answers sustained under-provisioning; otherwise the target
//! drifts back toward the floor by halving the gap.
//!
//! # Sizing Algorithm
//!
//! ```text
//! ratio = standby / floor            // floor == 0: below every threshold
//!
//! if active > target:
//!     ratio < 0.005  => 4   * target   // critical
//!     ratio < 0.25   => 3   * target   // severe
//!     ratio < 0.5    => 1.5 * target   // mild, rounded
//!
//! otherwise, if target > floor:
//!     target = floor + (target - floor) / 2
//! ```
//!
//! Every threshold is checked against the original target and the most
//! severe match wins. Escalation always beats convergence.

pub mod policy;
pub mod sizer;

pub use policy::{PolicyError, SizerPolicy};
pub use sizer::{decide, Pressure, StandbyDecision, StandbySizer};
