//! Server lifecycle state machine.
//!
//! `Starting -> Running -> Stopping -> Stopped`. A bind failure goes
//! straight from `Starting` to `Stopped`, an accept failure from `Running`.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
        }
    }

    fn can_become(self, next: ServerState) -> bool {
        use ServerState::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Stopped)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, observable lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    state: RwLock<ServerState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ServerState::Starting),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.read()
    }

    /// Move to `next`. Returns false, leaving the state unchanged, when the
    /// transition is not allowed.
    pub fn advance(&self, next: ServerState) -> bool {
        let mut state = self.state.write();
        if !state.can_become(next) {
            warn!(from = %*state, to = %next, "Ignoring invalid lifecycle transition");
            return false;
        }
        info!(from = %*state, to = %next, "Server state changed");
        *state = next;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graceful_path() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ServerState::Starting);
        assert!(lifecycle.advance(ServerState::Running));
        assert!(lifecycle.advance(ServerState::Stopping));
        assert!(lifecycle.advance(ServerState::Stopped));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[test]
    fn test_stopping_cannot_be_skipped_backwards() {
        let lifecycle = Lifecycle::new();
        assert!(!lifecycle.advance(ServerState::Stopping));
        assert!(lifecycle.advance(ServerState::Running));
        assert!(!lifecycle.advance(ServerState::Starting));
        assert!(lifecycle.advance(ServerState::Stopped));
        assert!(!lifecycle.advance(ServerState::Running));
        assert_eq!(lifecycle.state(), ServerState::Stopped);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ServerState::Running).unwrap(),
            "\"running\""
        );
    }
}
