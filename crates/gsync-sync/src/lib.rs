//! gsync-sync: the mobile side of grade synchronization
//!
//! Each sync attempt walks a small state machine:
//!
//! ```text
//! Idle -> CheckingReachability -> Reachable -> Fetching -> Success | Failed -> Fallback
//!                              -> Unreachable -> Fallback
//! ```
//!
//! Whatever the network does, a sync yields grades: either the live payload
//! or the built-in sample dataset, tagged as such in `SyncResult`.

pub mod client;
pub mod error;
pub mod fallback;
pub mod guard;
pub mod phase;

pub use client::{local_key, MobileSyncClient};
pub use error::SyncError;
pub use fallback::sample_grades;
pub use guard::{InFlightGuard, InFlightRegistry};
pub use phase::{SyncPhase, SyncReport};
