use std::cell::Cell;

use dial_proxy_proto::{
    serialize::ByteWrite,
    shared::{Frame, FrameRef},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolViolation, RelayOp, SessionError};

/// The size of the buffer bytes from the node are read into. Each read becomes one data frame.
pub const RELAY_BUFFER_SIZE: usize = 0x8000;

/// How many bytes a session has relayed in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelaySummary {
    pub to_node: u64,
    pub from_node: u64,
}

#[derive(Debug, Default)]
pub struct RelayStats {
    to_node: Cell<u64>,
    from_node: Cell<u64>,
}

impl RelayStats {
    pub fn summary(&self) -> RelaySummary {
        RelaySummary {
            to_node: self.to_node.get(),
            from_node: self.from_node.get(),
        }
    }

    fn add_to_node(&self, len: usize) {
        self.to_node.set(self.to_node.get() + len as u64);
    }

    fn add_from_node(&self, len: usize) {
        self.from_node.set(self.from_node.get() + len as u64);
    }
}

/// Writes the payload of every data frame from the client's stream into the node connection, in
/// order. Once the client finishes its side of the stream, the node connection's write half is
/// shut down and this returns.
pub async fn relay_inbound<R, C>(recv: &mut R, conn: &mut C, stats: &RelayStats) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin + ?Sized,
    C: AsyncWrite + Unpin + ?Sized,
{
    loop {
        let frame = match Frame::read_next(recv).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(error) => return Err(SessionError::from_stream_read(error)),
        };

        let data = match frame {
            Frame::Data(data) => data,
            other => return Err(ProtocolViolation::UnexpectedFrame(other.tag()).into()),
        };

        if data.bytes.is_empty() {
            continue;
        }

        conn.write_all(&data.bytes).await.map_err(|e| SessionError::relay(RelayOp::WritingNode, e))?;
        conn.flush().await.map_err(|e| SessionError::relay(RelayOp::WritingNode, e))?;
        stats.add_to_node(data.bytes.len());
    }

    conn.shutdown().await.map_err(|e| SessionError::relay(RelayOp::ClosingNode, e))
}

/// Wraps everything read from the node connection into data frames on the client's stream, until
/// the node closes the connection.
pub async fn relay_outbound<C, W>(conn: &mut C, send: &mut W, stats: &RelayStats) -> Result<(), SessionError>
where
    C: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    loop {
        let len = conn.read(&mut buf).await.map_err(|e| SessionError::relay(RelayOp::ReadingNode, e))?;
        if len == 0 {
            return Ok(());
        }

        FrameRef::data(&buf[..len])
            .write(send)
            .await
            .map_err(|e| SessionError::relay(RelayOp::WritingStream, e))?;
        send.flush().await.map_err(|e| SessionError::relay(RelayOp::WritingStream, e))?;
        stats.add_from_node(len);
    }
}
