use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    serialize::{ByteRead, ByteWrite},
    shared::{NetAddr, NetAddrRef, TunnelType},
};

/// The handshake a client sends as the first frame of every stream, indicating which node it
/// wants the proxy to dial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    /// The node's identity, conventionally `"<server id>.<cluster name>"`.
    pub node_id: String,

    /// The kind of endpoint being dialed.
    pub tunnel_type: TunnelType,

    /// Where the connection originates from, as seen by the client.
    pub source: Option<NetAddr>,

    /// Where the connection is headed, as seen by the client.
    pub destination: Option<NetAddr>,
}

impl DialRequest {
    pub fn new<S: Into<String>>(node_id: S, tunnel_type: TunnelType) -> Self {
        Self {
            node_id: node_id.into(),
            tunnel_type,
            source: None,
            destination: None,
        }
    }

    pub fn as_ref(&self) -> DialRequestRef {
        DialRequestRef {
            node_id: &self.node_id,
            tunnel_type: self.tunnel_type,
            source: self.source.as_ref().map(|addr| addr.as_ref()),
            destination: self.destination.as_ref().map(|addr| addr.as_ref()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialRequestRef<'a> {
    pub node_id: &'a str,
    pub tunnel_type: TunnelType,
    pub source: Option<NetAddrRef<'a>>,
    pub destination: Option<NetAddrRef<'a>>,
}

impl<'a> DialRequestRef<'a> {
    pub const fn new(node_id: &'a str, tunnel_type: TunnelType) -> Self {
        Self {
            node_id,
            tunnel_type,
            source: None,
            destination: None,
        }
    }
}

impl<'a> ByteWrite for DialRequestRef<'a> {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        (self.node_id, self.tunnel_type, self.source, self.destination).write(writer).await
    }
}

impl ByteWrite for DialRequest {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_ref().write(writer).await
    }
}

impl ByteRead for DialRequest {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let node_id = String::read(reader).await?;
        let tunnel_type = TunnelType::read(reader).await?;
        let source = <Option<NetAddr> as ByteRead>::read(reader).await?;
        let destination = <Option<NetAddr> as ByteRead>::read(reader).await?;

        Ok(Self {
            node_id,
            tunnel_type,
            source,
            destination,
        })
    }
}
