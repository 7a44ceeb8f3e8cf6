use gsync_core::SyncResult;
use serde::Serialize;

/// States a single sync attempt passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    CheckingReachability,
    Reachable,
    Unreachable,
    Fetching,
    Success,
    Failed,
    Fallback,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Success | SyncPhase::Fallback)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::CheckingReachability => "checking_reachability",
            SyncPhase::Reachable => "reachable",
            SyncPhase::Unreachable => "unreachable",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Success => "success",
            SyncPhase::Failed => "failed",
            SyncPhase::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// Result of `MobileSyncClient::sync` plus the phases it went through.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub result: SyncResult,
    pub phases: Vec<SyncPhase>,
    /// Whether the result was written to the local store
    pub stored_locally: bool,
}

impl SyncReport {
    pub fn final_phase(&self) -> SyncPhase {
        self.phases.last().copied().unwrap_or(SyncPhase::Idle)
    }
}
