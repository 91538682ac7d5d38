use std::fmt;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Both sides finished without errors.
    PeerClosed,
    Failed(ErrorKind),
}

/// The lifecycle of a dial session. States only ever move forward, and `Closed` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Dialing,
    Relaying,
    Closed(CloseReason),
}

impl SessionState {
    const fn order(self) -> u8 {
        match self {
            Self::AwaitingHandshake => 0,
            Self::Dialing => 1,
            Self::Relaying => 2,
            Self::Closed(_) => 3,
        }
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed(_))
    }

    pub(super) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.order() < next.order(),
            "Invalid session state transition from {self} to {next}"
        );
        *self = next;
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingHandshake => write!(f, "awaiting handshake"),
            Self::Dialing => write!(f, "dialing"),
            Self::Relaying => write!(f, "relaying"),
            Self::Closed(CloseReason::PeerClosed) => write!(f, "closed"),
            Self::Closed(CloseReason::Failed(kind)) => write!(f, "closed ({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::{CloseReason, SessionState};

    #[test]
    fn states_move_forward() {
        let mut state = SessionState::AwaitingHandshake;
        state.advance(SessionState::Dialing);
        state.advance(SessionState::Relaying);
        state.advance(SessionState::Closed(CloseReason::PeerClosed));
        assert!(state.is_closed());
    }

    #[test]
    fn handshake_can_fail_straight_to_closed() {
        let mut state = SessionState::AwaitingHandshake;
        state.advance(SessionState::Closed(CloseReason::Failed(ErrorKind::ProtocolViolation)));
        assert_eq!(state.to_string(), "closed (protocol violation)");
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn closed_is_final() {
        let mut state = SessionState::Closed(CloseReason::PeerClosed);
        state.advance(SessionState::Closed(CloseReason::Failed(ErrorKind::Cancelled)));
    }
}
