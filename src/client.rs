use std::io;

use dial_proxy_proto::{
    serialize::ByteWrite,
    shared::{DialRequestRef, Frame, FrameRef, StatusCode},
};
use quinn::{Connection, ConnectionError, ReadError, RecvStream, SendStream, WriteError};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    select,
};
use tracing::{debug, error, info};

use crate::{args::StartClientConfig, session::RELAY_BUFFER_SIZE};

/// Opens a stream on `connection` and asks the proxy to dial a node over it. Once this returns,
/// the stream carries data frames to and from the node.
pub async fn dial_node(connection: &Connection, request: DialRequestRef<'_>) -> io::Result<(SendStream, RecvStream)> {
    let (mut send_stream, recv_stream) = connection.open_bi().await?;
    FrameRef::DialRequest(request).write(&mut send_stream).await?;
    Ok((send_stream, recv_stream))
}

/// Gets the status a proxy closed a stream with, if `error` came from it resetting or stopping
/// the stream.
pub fn closing_status(error: &io::Error) -> Option<StatusCode> {
    let inner = error.get_ref()?;
    let code = match (inner.downcast_ref::<ReadError>(), inner.downcast_ref::<WriteError>()) {
        (Some(ReadError::Reset(code)), _) => *code,
        (_, Some(WriteError::Stopped(code))) => *code,
        _ => return None,
    };

    StatusCode::from_var_int(code)
}

/// Sends everything read from `input` as data frames, then finishes the stream.
async fn upload<R: AsyncRead + Unpin + ?Sized>(input: &mut R, send_stream: &mut SendStream) -> io::Result<u64> {
    let mut buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut total = 0;
    loop {
        let len = input.read(&mut buf).await?;
        if len == 0 {
            break;
        }

        FrameRef::data(&buf[..len]).write(send_stream).await?;
        total += len as u64;
    }

    send_stream.finish().await?;
    Ok(total)
}

/// Writes the payload of every data frame received into `output`, until the proxy finishes the
/// stream.
async fn download<W: AsyncWrite + Unpin + ?Sized>(recv_stream: &mut RecvStream, output: &mut W) -> io::Result<u64> {
    let mut total = 0;
    while let Some(frame) = Frame::read_next(recv_stream).await? {
        let data = match frame {
            Frame::Data(data) => data,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Proxy sent an unexpected {:?} frame", other.tag()),
                ))
            }
        };

        output.write_all(&data.bytes).await?;
        output.flush().await?;
        total += data.bytes.len() as u64;
    }

    Ok(total)
}

/// Relays `input` to the node through the stream, and the node's responses into `output`. Ends
/// once the proxy finishes the stream, even if `input` still has more to give.
pub async fn relay_streams<R, W>(
    input: &mut R,
    output: &mut W,
    send_stream: &mut SendStream,
    recv_stream: &mut RecvStream,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    select! {
        biased;
        result = download(recv_stream, output) => result,
        result = async {
            let sent = upload(input, send_stream).await?;
            debug!("Finished sending after {sent} bytes");
            std::future::pending::<io::Result<u64>>().await
        } => result,
    }
}

/// Dials the configured node and relays stdin and stdout to it.
pub async fn run_client(connection: Connection, config: StartClientConfig) -> io::Result<()> {
    info!(proxy = %connection.remote_address(), node = %config.node_id, "Dialing node");

    let request = DialRequestRef::new(&config.node_id, config.tunnel_type);
    let (mut send_stream, mut recv_stream) = dial_node(&connection, request).await?;

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let result = relay_streams(&mut stdin, &mut stdout, &mut send_stream, &mut recv_stream).await;

    match result {
        Ok(received) => info!("Proxy closed the stream after {received} bytes received"),
        Err(error) => match closing_status(&error) {
            Some(status) => error!(%status, "Proxy closed the stream"),
            None => return Err(error),
        },
    }

    connection.close(0u32.into(), b"Client done");
    match connection.closed().await {
        ConnectionError::LocallyClosed => {}
        ConnectionError::ApplicationClosed(_) => debug!("The proxy closed the connection"),
        error => error!(%error, "The connection closed unexpectedly"),
    }

    Ok(())
}
