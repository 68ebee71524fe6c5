//! Bridge session lifecycle state machine

use serde::{Deserialize, Serialize};

/// Lifecycle of one bridge session
///
/// State transitions:
/// ```text
/// Idle → Listening → Connected → Closing → Closed
///   │                    ↑
///   └────────────────────┘ (pre-connected stream)
///            Any live state → Failed (transport loss)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session objects exist but no endpoint is open
    #[default]
    Idle,
    /// Listening endpoint bound, waiting for the single peer
    Listening,
    /// Peer connected; requests flow in both directions
    Connected,
    /// Teardown in progress; pending requests are being failed
    Closing,
    /// Session closed cleanly
    Closed,
    /// The transport failed and the session cannot be reused
    Failed,
}

impl SessionState {
    /// Check if this state can transition to the target state
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Idle, Listening)
                | (Idle, Connected)
                | (Listening, Connected)
                | (Listening, Closing)
                | (Connected, Closing)
                | (Closing, Closed)
                | (Idle, Failed)
                | (Listening, Failed)
                | (Connected, Failed)
                | (Closing, Failed)
        )
    }

    /// Check if requests may be sent in this state
    pub fn can_send(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Check if the session is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            SessionState::Idle => 0,
            SessionState::Listening => 1,
            SessionState::Connected => 2,
            SessionState::Closing => 3,
            SessionState::Closed => 4,
            SessionState::Failed => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Idle,
            1 => SessionState::Listening,
            2 => SessionState::Connected,
            3 => SessionState::Closing,
            4 => SessionState::Closed,
            _ => SessionState::Failed,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Closing => write!(f, "Closing"),
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Atomic cell holding a [`SessionState`], validating transitions
#[derive(Debug, Default)]
pub struct StateCell {
    value: std::sync::atomic::AtomicU8,
}

impl StateCell {
    pub fn new(state: SessionState) -> Self {
        Self {
            value: std::sync::atomic::AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.value.load(std::sync::atomic::Ordering::SeqCst))
    }

    /// Set the state without validation (error recovery)
    pub fn set(&self, state: SessionState) {
        self.value
            .store(state.as_u8(), std::sync::atomic::Ordering::SeqCst);
    }

    /// Attempt a validated transition, returning the state actually observed on failure
    pub fn transition_to(&self, target: SessionState) -> Result<(), SessionState> {
        let mut current = self.get();
        loop {
            if !current.can_transition_to(target) {
                return Err(current);
            }
            match self.value.compare_exchange(
                current.as_u8(),
                target.as_u8(),
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = SessionState::from_u8(observed),
            }
        }
    }
}
