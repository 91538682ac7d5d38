use std::{fmt, io};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::serialize::{ByteRead, ByteWrite, SmallReadString, SmallWriteString};

/// A network address as reported by the client, such as `("10.0.0.4:3022", "tcp")`. The proxy
/// doesn't parse it, it's handed to the dialer as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetAddr {
    pub addr: String,
    pub network: String,
}

impl NetAddr {
    pub fn new<A: Into<String>, N: Into<String>>(addr: A, network: N) -> Self {
        Self {
            addr: addr.into(),
            network: network.into(),
        }
    }

    pub fn as_ref(&self) -> NetAddrRef {
        NetAddrRef::new(&self.addr, &self.network)
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_ref(), f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddrRef<'a> {
    pub addr: &'a str,
    pub network: &'a str,
}

impl<'a> NetAddrRef<'a> {
    pub const fn new(addr: &'a str, network: &'a str) -> Self {
        Self { addr, network }
    }
}

impl<'a> fmt::Display for NetAddrRef<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.network.is_empty() {
            true => f.write_str(self.addr),
            false => write!(f, "{}://{}", self.network, self.addr),
        }
    }
}

impl<'a> ByteWrite for NetAddrRef<'a> {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        (self.addr, SmallWriteString(self.network)).write(writer).await
    }
}

impl ByteWrite for NetAddr {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_ref().write(writer).await
    }
}

impl ByteRead for NetAddr {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let addr = String::read(reader).await?;
        let SmallReadString(network) = SmallReadString::read(reader).await?;

        Ok(Self { addr, network })
    }
}
