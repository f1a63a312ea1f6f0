// ============================================================================
// Connection Handle State Machine
// ============================================================================
//
// ```text
//                 set_auto_commit(false)
//   AutoCommit ───────────────────────────> ManualActive ──commit──> Committed
//      ^  ^                                      │   ^                  │
//      │  │                                      │   └──next statement──┤
//      │  │                                  rollback                   │
//      │  │                                      v                      │
//      │  └──────set_auto_commit(true)────── RolledBack <───────────────┘
//      │
//   acquire
//      │
//   Released <──release── AutoCommit | Committed | RolledBack
//
//   any state ──close──> Closed
// ```
//
// ============================================================================

use crate::core::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Checked out (or freshly opened) with per-statement commit.
    AutoCommit,
    /// Auto-commit disabled; statements join one open transaction.
    ManualActive,
    /// Manual mode; the last transaction committed.
    Committed,
    /// Manual mode; the last transaction rolled back.
    RolledBack,
    /// Back in the pool with auto-commit restored.
    Released,
    /// Physically closed; terminal.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleEvent {
    Acquire,
    DisableAutoCommit,
    EnableAutoCommit,
    /// A statement runs in manual mode after the previous transaction ended.
    Begin,
    Commit,
    Rollback,
    Release,
    Close,
}

impl HandleState {
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            HandleState::ManualActive | HandleState::Committed | HandleState::RolledBack
        )
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self, HandleState::ManualActive)
    }

    /// Computes the next state or rejects the transition.
    pub fn transition(self, event: HandleEvent) -> Result<HandleState> {
        use HandleEvent as E;
        use HandleState as S;

        let next = match (self, event) {
            (S::Closed, E::Close) => S::Closed,
            (S::Closed, _) => {
                return Err(DbError::InvalidState("connection is closed".into()));
            }
            (_, E::Close) => S::Closed,

            (S::Released, E::Acquire) => S::AutoCommit,

            (S::AutoCommit, E::DisableAutoCommit) => S::ManualActive,
            (S::ManualActive, E::DisableAutoCommit) => S::ManualActive,
            (S::Committed | S::RolledBack, E::DisableAutoCommit) => self,

            (S::AutoCommit | S::Committed | S::RolledBack, E::EnableAutoCommit) => S::AutoCommit,

            (S::Committed | S::RolledBack, E::Begin) => S::ManualActive,

            (S::ManualActive, E::Commit) => S::Committed,
            (S::ManualActive, E::Rollback) => S::RolledBack,

            (S::AutoCommit | S::Committed | S::RolledBack, E::Release) => S::Released,

            (state, event) => {
                return Err(DbError::InvalidState(format!(
                    "{:?} is not allowed in state {:?}",
                    event, state
                )));
            }
        };

        Ok(next)
    }
}

impl std::fmt::Display for HandleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleState::AutoCommit => "acquired-autocommit",
            HandleState::ManualActive => "manual-mode-active",
            HandleState::Committed => "committed",
            HandleState::RolledBack => "rolled-back",
            HandleState::Released => "released",
            HandleState::Closed => "closed",
        };
        f.write_str(name)
    }
}
