//! Publisher session state machine.
//!
//! Transitions are monotonic: once a session reaches `Ready` or `Failed` it
//! never moves again except the one `Failed` escape hatch available from
//! every other state.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    Init,
    Offer,
    Answer,
    Negotiated,
    UdpConnected,
    IceConnecting,
    IceConnected,
    DtlsFinished,
    SrtpFinished,
    Ready,
    Failed,
}

impl SessionState {
    /// Ordinal in the happy-path sequence; `Failed` has no place in the
    /// sequence and is handled separately by [`SessionState::can_advance_to`].
    fn ordinal(self) -> Option<u8> {
        match self {
            SessionState::None => Some(0),
            SessionState::Init => Some(1),
            SessionState::Offer => Some(2),
            SessionState::Answer => Some(3),
            SessionState::Negotiated => Some(4),
            SessionState::UdpConnected => Some(5),
            SessionState::IceConnecting => Some(6),
            SessionState::IceConnected => Some(7),
            SessionState::DtlsFinished => Some(8),
            SessionState::SrtpFinished => Some(9),
            SessionState::Ready => Some(10),
            SessionState::Failed => None,
        }
    }

    /// Whether moving from `self` to `next` respects the monotonic ordering:
    /// strictly forward along the happy path, or into `Failed` from anywhere
    /// except `Ready` (once media is flowing, failures surface as I/O errors
    /// instead of rewinding the state machine).
    pub fn can_advance_to(self, next: SessionState) -> bool {
        if next == SessionState::Failed {
            return self != SessionState::Failed;
        }
        match (self.ordinal(), next.ordinal()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::None => "none",
            SessionState::Init => "init",
            SessionState::Offer => "offer",
            SessionState::Answer => "answer",
            SessionState::Negotiated => "negotiated",
            SessionState::UdpConnected => "udp_connected",
            SessionState::IceConnecting => "ice_connecting",
            SessionState::IceConnected => "ice_connected",
            SessionState::DtlsFinished => "dtls_finished",
            SessionState::SrtpFinished => "srtp_finished",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_only_advances_one_step_at_a_time() {
        assert!(SessionState::None.can_advance_to(SessionState::Init));
        assert!(!SessionState::None.can_advance_to(SessionState::Offer));
        assert!(SessionState::SrtpFinished.can_advance_to(SessionState::Ready));
    }

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        assert!(SessionState::Init.can_advance_to(SessionState::Failed));
        assert!(SessionState::IceConnecting.can_advance_to(SessionState::Failed));
    }

    #[test]
    fn failed_and_ready_are_terminal() {
        assert!(!SessionState::Failed.can_advance_to(SessionState::Init));
        assert!(!SessionState::Failed.can_advance_to(SessionState::Failed));
        assert!(!SessionState::Ready.can_advance_to(SessionState::Failed));
        assert!(!SessionState::Ready.can_advance_to(SessionState::Init));
    }

    #[test]
    fn cannot_skip_states() {
        assert!(!SessionState::Negotiated.can_advance_to(SessionState::IceConnected));
    }
}
