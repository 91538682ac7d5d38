use std::{fmt, io, time::Duration};

use dial_proxy_proto::shared::{FrameTag, StatusCode};

use crate::dialer::DialError;

/// The broad category of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ProtocolViolation,
    DialFailure,
    RelayIoFailure,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation => write!(f, "protocol violation"),
            Self::DialFailure => write!(f, "dial failure"),
            Self::RelayIoFailure => write!(f, "relay I/O failure"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("invalid first frame: expected a dial request, got a {0:?} frame")]
    InvalidFirstFrame(FrameTag),

    #[error("stream ended before a dial request was received")]
    MissingHandshake,

    #[error("invalid dial request: missing node id")]
    MissingNodeId,

    #[error("invalid dial request: node id {0:?} doesn't name a cluster")]
    InvalidNodeId(String),

    #[error("unexpected {0:?} frame after the dial request")]
    UnexpectedFrame(FrameTag),

    #[error("malformed frame: {0}")]
    MalformedFrame(#[source] io::Error),
}

/// What the relay was doing when an I/O error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOp {
    ReadingStream,
    WritingStream,
    FinishingStream,
    ReadingNode,
    WritingNode,
    ClosingNode,
}

impl fmt::Display for RelayOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadingStream => write!(f, "receiving from the client"),
            Self::WritingStream => write!(f, "sending to the client"),
            Self::FinishingStream => write!(f, "finishing the client stream"),
            Self::ReadingNode => write!(f, "reading from the node"),
            Self::WritingNode => write!(f, "writing to the node"),
            Self::ClosingNode => write!(f, "closing the node connection"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Shutdown,
    HandshakeTimeout(Duration),
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "the proxy is shutting down"),
            Self::HandshakeTimeout(limit) => write!(f, "no dial request within {limit:?}"),
        }
    }
}

/// Errors hit while closing resources after a session already failed or finished.
#[derive(Debug, Default)]
pub struct CleanupErrors(pub Vec<io::Error>);

impl fmt::Display for CleanupErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("dialing cluster {cluster} failed: {source}")]
    Dial {
        cluster: String,
        #[source]
        source: DialError,
    },

    #[error("relay failed while {op}: {source}")]
    Relay {
        op: RelayOp,
        #[source]
        source: io::Error,
    },

    #[error("session cancelled: {0}")]
    Cancelled(CancelReason),

    #[error("{primary} (cleanup also failed: {cleanup})")]
    WithCleanup { primary: Box<SessionError>, cleanup: CleanupErrors },
}

impl SessionError {
    pub fn relay(op: RelayOp, source: io::Error) -> Self {
        Self::Relay { op, source }
    }

    /// Classifies an error from reading frames off the client's stream. Undecodable or truncated
    /// frames are the client's fault, anything else is a transport failure.
    pub fn from_stream_read(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ProtocolViolation::MalformedFrame(error).into(),
            _ => Self::relay(RelayOp::ReadingStream, error),
        }
    }

    /// Attaches errors that happened while releasing resources, keeping this error as the
    /// primary one. Does nothing if `cleanup` is empty.
    pub fn with_cleanup(self, cleanup: Vec<io::Error>) -> Self {
        if cleanup.is_empty() {
            return self;
        }

        match self {
            Self::WithCleanup { primary, cleanup: mut previous } => {
                previous.0.extend(cleanup);
                Self::WithCleanup { primary, cleanup: previous }
            }
            primary => Self::WithCleanup {
                primary: Box::new(primary),
                cleanup: CleanupErrors(cleanup),
            },
        }
    }

    /// The error that caused the session to fail, ignoring any cleanup errors.
    pub fn primary(&self) -> &SessionError {
        match self {
            Self::WithCleanup { primary, .. } => primary.primary(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.primary() {
            Self::Protocol(_) => ErrorKind::ProtocolViolation,
            Self::Dial { .. } => ErrorKind::DialFailure,
            Self::Relay { .. } => ErrorKind::RelayIoFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::WithCleanup { .. } => unreachable!(),
        }
    }

    /// The status the client's stream is reset with when a session fails with this error.
    pub fn status_code(&self) -> StatusCode {
        match self.primary() {
            Self::Protocol(_) => StatusCode::ProtocolViolation,
            Self::Dial { source, .. } => source.status_code(),
            Self::Relay { .. } => StatusCode::RelayIo,
            Self::Cancelled(_) => StatusCode::Cancelled,
            Self::WithCleanup { .. } => unreachable!(),
        }
    }
}
