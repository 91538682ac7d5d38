use std::fmt;

use quinn::VarInt;

use crate::serialize::U8ReprEnum;

/// The status a stream is closed with, sent as the QUIC application error code when the proxy
/// resets a stream (or stops reading from it).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The session ended cleanly.
    Ok = 0,

    /// The client broke the protocol, for example by not starting with a dial request.
    ProtocolViolation = 1,

    /// The requested node or cluster doesn't exist.
    DialNotFound = 2,

    /// The node exists but couldn't be reached.
    DialUnreachable = 3,

    /// Dialing failed for a reason internal to the router.
    DialInternal = 4,

    /// Relaying failed after the node was dialed.
    RelayIo = 5,

    /// The session was cancelled or timed out.
    Cancelled = 6,
}

impl StatusCode {
    pub fn to_var_int(self) -> VarInt {
        VarInt::from_u32(self.into_u8() as u32)
    }

    /// Parses a QUIC application error code. Returns `None` for codes this protocol doesn't
    /// define.
    pub fn from_var_int(code: VarInt) -> Option<Self> {
        u8::try_from(code.into_inner()).ok().and_then(Self::from_u8)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
            Self::DialNotFound => write!(f, "dial failure (not found)"),
            Self::DialUnreachable => write!(f, "dial failure (unreachable)"),
            Self::DialInternal => write!(f, "dial failure (internal)"),
            Self::RelayIo => write!(f, "relay I/O failure"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl U8ReprEnum for StatusCode {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::ProtocolViolation),
            2 => Some(Self::DialNotFound),
            3 => Some(Self::DialUnreachable),
            4 => Some(Self::DialInternal),
            5 => Some(Self::RelayIo),
            6 => Some(Self::Cancelled),
            _ => None,
        }
    }

    fn into_u8(self) -> u8 {
        self as u8
    }
}
