use std::io::{self, Error, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{ByteRead, ByteWrite};

/// A type that wraps a `&[u8]` and implements [`ByteWrite`] for writing it as a byte buffer with
/// an [`u32`] length prefix.
pub struct WriteBytes<'a>(pub &'a [u8]);

impl<'a> ByteWrite for WriteBytes<'a> {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        let len = self.0.len();
        if len > u32::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidData, "Byte buffer is too long (>= 4GB)"));
        }

        writer.write_u32(len as u32).await?;
        writer.write_all(self.0).await
    }
}

/// A type that wraps a [`Vec<u8>`] and implements [`ByteRead`] for reading byte buffers with an
/// [`u32`] length prefix, refusing any buffer longer than `MAX` bytes.
#[derive(Debug)]
pub struct ReadBytes<const MAX: usize>(pub Vec<u8>);

impl<const MAX: usize> ByteRead for ReadBytes<MAX> {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = reader.read_u32().await? as usize;
        if len > MAX {
            let message = format!("Byte buffer of {len} bytes exceeds the maximum of {MAX} bytes");
            return Err(Error::new(ErrorKind::InvalidData, message));
        }

        // Grow only as bytes arrive, so a declared length alone doesn't allocate.
        let mut buf = Vec::new();
        (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
        if buf.len() != len {
            return Err(Error::new(ErrorKind::UnexpectedEof, "Byte buffer ended early"));
        }

        Ok(ReadBytes(buf))
    }
}
