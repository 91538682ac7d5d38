use std::{fmt, io, str::FromStr};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::serialize::{read_u8_repr, ByteRead, ByteWrite, U8ReprEnum};

/// The class of endpoint a dial request is trying to reach. Its meaning is owned by whatever
/// routes the dial, the proxy only forwards it.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TunnelType {
    Node = 0,
    Proxy = 1,
    App = 2,
    Kube = 3,
    Database = 4,
    WindowsDesktop = 5,
}

impl TunnelType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Proxy => "proxy",
            Self::App => "app",
            Self::Kube => "kube",
            Self::Database => "db",
            Self::WindowsDesktop => "windows_desktop",
        }
    }
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned when parsing a string that doesn't name any [`TunnelType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTunnelType(pub String);

impl fmt::Display for UnknownTunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown tunnel type: {}", self.0)
    }
}

impl FromStr for TunnelType {
    type Err = UnknownTunnelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Self::Node),
            "proxy" => Ok(Self::Proxy),
            "app" => Ok(Self::App),
            "kube" => Ok(Self::Kube),
            "db" => Ok(Self::Database),
            "windows_desktop" => Ok(Self::WindowsDesktop),
            other => Err(UnknownTunnelType(other.to_string())),
        }
    }
}

impl U8ReprEnum for TunnelType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Node),
            1 => Some(Self::Proxy),
            2 => Some(Self::App),
            3 => Some(Self::Kube),
            4 => Some(Self::Database),
            5 => Some(Self::WindowsDesktop),
            _ => None,
        }
    }

    fn into_u8(self) -> u8 {
        self as u8
    }
}

impl ByteWrite for TunnelType {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.into_u8().write(writer).await
    }
}

impl ByteRead for TunnelType {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        read_u8_repr(reader).await
    }
}
