use std::io::{self, Error, ErrorKind};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::serialize::{ByteRead, ByteWrite, ReadBytes, WriteBytes};

/// The maximum amount of bytes a single [`Data`] frame may carry.
pub const MAX_DATA_LEN: usize = 4 * 1024 * 1024;

/// A chunk of relayed bytes. One `Data` frame is one write on the receiving side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Data {
    pub bytes: Vec<u8>,
}

impl Data {
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn as_ref(&self) -> DataRef {
        DataRef::new(&self.bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRef<'a> {
    pub bytes: &'a [u8],
}

impl<'a> DataRef<'a> {
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl<'a> ByteWrite for DataRef<'a> {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        if self.bytes.len() > MAX_DATA_LEN {
            return Err(Error::new(ErrorKind::InvalidData, "Data frame is too long (> 4MB)"));
        }

        WriteBytes(self.bytes).write(writer).await
    }
}

impl ByteWrite for Data {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_ref().write(writer).await
    }
}

impl ByteRead for Data {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let ReadBytes(bytes) = ReadBytes::<MAX_DATA_LEN>::read(reader).await?;
        Ok(Self { bytes })
    }
}
