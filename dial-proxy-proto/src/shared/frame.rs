use std::io::{self, Error, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::{
    serialize::{ByteRead, ByteWrite, U8ReprEnum},
    shared::{Data, DataRef, DialRequest, DialRequestRef},
};

/// The type byte that starts every frame on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    /// A frame with no message set. Never valid, but distinguished from unknown tags so the error
    /// says what happened.
    Empty = 0,
    DialRequest = 1,
    Data = 2,
}

impl U8ReprEnum for FrameTag {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::DialRequest),
            2 => Some(Self::Data),
            _ => None,
        }
    }

    fn into_u8(self) -> u8 {
        self as u8
    }
}

/// One protocol message on a dial stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    DialRequest(DialRequest),
    Data(Data),
}

impl Frame {
    pub fn tag(&self) -> FrameTag {
        match self {
            Self::DialRequest(_) => FrameTag::DialRequest,
            Self::Data(_) => FrameTag::Data,
        }
    }

    pub fn as_ref(&self) -> FrameRef {
        match self {
            Self::DialRequest(request) => FrameRef::DialRequest(request.as_ref()),
            Self::Data(data) => FrameRef::Data(data.as_ref()),
        }
    }

    /// Reads the next frame, or returns `Ok(None)` if the stream ended cleanly before it.
    ///
    /// The end of the stream is only considered clean at a frame boundary. If it ends in the
    /// middle of a frame, an [`ErrorKind::UnexpectedEof`] error is returned instead.
    pub async fn read_next<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut tag = [0u8; 1];
        if reader.read(&mut tag).await? == 0 {
            return Ok(None);
        }

        Ok(Some(Self::read_body(tag[0], reader).await?))
    }

    async fn read_body<R: AsyncRead + Unpin + ?Sized>(tag: u8, reader: &mut R) -> io::Result<Self> {
        match FrameTag::from_u8(tag) {
            Some(FrameTag::DialRequest) => Ok(Self::DialRequest(DialRequest::read(reader).await?)),
            Some(FrameTag::Data) => Ok(Self::Data(Data::read(reader).await?)),
            Some(FrameTag::Empty) => Err(Error::new(ErrorKind::InvalidData, "Frame has no message set")),
            None => Err(Error::new(ErrorKind::InvalidData, format!("Invalid frame type byte, {tag}"))),
        }
    }
}

impl From<DialRequest> for Frame {
    fn from(value: DialRequest) -> Self {
        Self::DialRequest(value)
    }
}

impl From<Data> for Frame {
    fn from(value: Data) -> Self {
        Self::Data(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef<'a> {
    DialRequest(DialRequestRef<'a>),
    Data(DataRef<'a>),
}

impl<'a> FrameRef<'a> {
    pub const fn data(bytes: &'a [u8]) -> Self {
        Self::Data(DataRef::new(bytes))
    }
}

impl<'a> ByteWrite for FrameRef<'a> {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::DialRequest(request) => (FrameTag::DialRequest.into_u8(), request).write(writer).await,
            Self::Data(data) => (FrameTag::Data.into_u8(), data).write(writer).await,
        }
    }
}

impl ByteWrite for Frame {
    async fn write<W: AsyncWrite + Unpin + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        self.as_ref().write(writer).await
    }
}

impl ByteRead for Frame {
    async fn read<R: AsyncRead + Unpin + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let tag = u8::read(reader).await?;
        Self::read_body(tag, reader).await
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use crate::{
        serialize::{ByteRead, ByteWrite},
        shared::{Data, DialRequest, NetAddr, TunnelType, MAX_DATA_LEN},
    };

    use super::{Frame, FrameRef};

    async fn encode(frame: FrameRef<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        frame.write(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn data_frame_layout() {
        let buf = encode(FrameRef::data(b"ping")).await;
        assert_eq!(buf, [2, 0, 0, 0, 4, b'p', b'i', b'n', b'g']);
    }

    #[tokio::test]
    async fn dial_request_layout() {
        let mut request = DialRequest::new("a.b", TunnelType::Kube);
        request.destination = Some(NetAddr::new("x", "tcp"));

        let mut buf = Vec::new();
        Frame::from(request.clone()).write(&mut buf).await.unwrap();

        #[rustfmt::skip]
        let expected = [
            1,
            0, 3, b'a', b'.', b'b',
            3,
            0,
            1, 0, 1, b'x', 3, b't', b'c', b'p',
        ];
        assert_eq!(buf, expected);

        let decoded = Frame::read(&mut &buf[..]).await.unwrap();
        assert_eq!(decoded, Frame::DialRequest(request));
    }

    #[tokio::test]
    async fn frames_read_back_in_order() {
        let mut request = DialRequest::new("test-id.test-cluster", TunnelType::Node);
        request.source = Some(NetAddr::new("127.0.0.1:4242", "tcp"));
        request.destination = Some(NetAddr::default());

        let mut buf = Vec::new();
        Frame::from(request.clone()).write(&mut buf).await.unwrap();
        FrameRef::data(b"hello").write(&mut buf).await.unwrap();
        FrameRef::data(b"").write(&mut buf).await.unwrap();

        let mut reader = &buf[..];
        assert_eq!(Frame::read_next(&mut reader).await.unwrap(), Some(Frame::DialRequest(request)));
        assert_eq!(Frame::read_next(&mut reader).await.unwrap(), Some(Frame::Data(Data::new(*b"hello"))));
        assert_eq!(Frame::read_next(&mut reader).await.unwrap(), Some(Frame::Data(Data::default())));
        assert_eq!(Frame::read_next(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_frame_is_invalid() {
        let error = Frame::read_next(&mut &[0u8, 0, 0, 0, 0][..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn unknown_tag_is_invalid() {
        let error = Frame::read(&mut &[9u8][..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn unknown_tunnel_type_is_invalid() {
        let buf = [1u8, 0, 1, b'n', 42, 0, 0];
        let error = Frame::read(&mut &buf[..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn truncated_frame_is_unexpected_eof() {
        let mut buf = encode(FrameRef::data(b"truncated")).await;
        buf.truncate(buf.len() - 3);

        let error = Frame::read_next(&mut &buf[..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn oversized_data_is_refused_before_reading() {
        let len = (MAX_DATA_LEN as u32 + 1).to_be_bytes();
        let buf = [2u8, len[0], len[1], len[2], len[3]];
        let error = Frame::read(&mut &buf[..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);

        let big = vec![0u8; MAX_DATA_LEN + 1];
        let error = FrameRef::data(&big).write(&mut Vec::new()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn invalid_utf8_node_id_is_invalid() {
        let buf = [1u8, 0, 2, 0xff, 0xfe, 0, 0, 0];
        let error = Frame::read(&mut &buf[..]).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);
    }
}
