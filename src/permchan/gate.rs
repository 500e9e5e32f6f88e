//! One-shot startup load barrier.
//!
//! The host signals once, after every mode provider has registered, that
//! the snapshot may be replayed. Replay only happens on an unlinked node:
//! creating channels with local timestamps next to converged peers would
//! desync them.

use super::store::LoadReport;
use crate::state::ServerList;
use tracing::info;

/// Phase of startup loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    /// Waiting for the host's ready signal.
    Pending,
    /// Ready signal received; never fires again.
    Complete,
}

/// What happened when the gate was signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Loaded(LoadReport),
    /// Linked to peers; nothing was loaded.
    SkippedLinked { servers: usize },
    /// The gate had already fired.
    AlreadyFired,
}

#[derive(Debug)]
pub struct InitGate {
    phase: InitPhase,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            phase: InitPhase::Pending,
        }
    }

    /// Fire the gate. `load` runs at most once per gate, and only when fewer
    /// than two servers are known.
    pub fn fire<F>(&mut self, servers: &dyn ServerList, load: F) -> GateOutcome
    where
        F: FnOnce() -> LoadReport,
    {
        if self.phase == InitPhase::Complete {
            return GateOutcome::AlreadyFired;
        }
        self.phase = InitPhase::Complete;

        let count = servers.server_count();
        if count >= 2 {
            info!(servers = count, "Linked to other servers, not loading permanent channels");
            return GateOutcome::SkippedLinked { servers: count };
        }
        GateOutcome::Loaded(load())
    }
}
