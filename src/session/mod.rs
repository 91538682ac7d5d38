use std::{io, time::Duration};

use dial_proxy_proto::shared::{DialRequest, Frame};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    select,
};
use tracing::{debug, warn};

use crate::{
    dialer::{split_node_id, ClusterDialer, DialError, DialParams},
    error::{CancelReason, ProtocolViolation, SessionError},
    shutdown::ShutdownSignal,
    utils::timeout_if_some,
};

mod relay;
mod state;

pub use relay::*;
pub use state::*;

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long closing the node connection may take once relaying is over.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long the dialer may take to produce a connection. `None` waits indefinitely.
    pub dial_timeout: Option<Duration>,

    /// How long a client may take to send its dial request. `None` waits indefinitely.
    pub handshake_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Some(DEFAULT_DIAL_TIMEOUT),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

/// One client stream's trip through the proxy: receive a dial request, dial the node it names,
/// then relay bytes both ways until either side is done.
///
/// A session owns the dialed connection and always closes it before [`DialSession::run`] returns.
/// Closing the client's stream is left to the caller, who decides how based on the result.
pub struct DialSession<'a, D: ClusterDialer> {
    dialer: &'a D,
    config: &'a SessionConfig,
    shutdown: ShutdownSignal,
    state: SessionState,
    cluster_name: Option<String>,
    stats: RelayStats,
}

impl<'a, D: ClusterDialer> DialSession<'a, D> {
    pub fn new(dialer: &'a D, config: &'a SessionConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            dialer,
            config,
            shutdown,
            state: SessionState::AwaitingHandshake,
            cluster_name: None,
            stats: RelayStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The cluster named by the client's dial request, once one was received.
    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    /// Runs the session to completion over the client stream's two halves.
    pub async fn run<R, W>(&mut self, recv: &mut R, send: &mut W) -> Result<RelaySummary, SessionError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let result = self.run_phases(recv, send).await;
        let reason = match &result {
            Ok(_) => CloseReason::PeerClosed,
            Err(error) => CloseReason::Failed(error.kind()),
        };

        self.state.advance(SessionState::Closed(reason));
        result
    }

    async fn run_phases<R, W>(&mut self, recv: &mut R, send: &mut W) -> Result<RelaySummary, SessionError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let request = self.await_handshake(recv).await?;
        let cluster_name = validate_request(&request)?.to_string();
        debug!(node = %request.node_id, cluster = %cluster_name, tunnel_type = %request.tunnel_type, "Received dial request");

        self.cluster_name = Some(cluster_name.clone());
        self.state.advance(SessionState::Dialing);
        let conn = self.dial(&cluster_name, DialParams::from(request)).await?;

        self.state.advance(SessionState::Relaying);
        self.relay(conn, recv, send).await
    }

    async fn await_handshake<R>(&mut self, recv: &mut R) -> Result<DialRequest, SessionError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let read = timeout_if_some(self.config.handshake_timeout, Frame::read_next(recv));
        let result = select! {
            biased;
            _ = self.shutdown.triggered() => return Err(SessionError::Cancelled(CancelReason::Shutdown)),
            result = read => result,
        };

        let frame = match result {
            Ok(Ok(Some(frame))) => frame,
            Ok(Ok(None)) => return Err(ProtocolViolation::MissingHandshake.into()),
            Ok(Err(error)) => return Err(SessionError::from_stream_read(error)),
            Err(limit) => return Err(SessionError::Cancelled(CancelReason::HandshakeTimeout(limit))),
        };

        match frame {
            Frame::DialRequest(request) => Ok(request),
            other => Err(ProtocolViolation::InvalidFirstFrame(other.tag()).into()),
        }
    }

    async fn dial(&mut self, cluster_name: &str, params: DialParams) -> Result<D::Conn, SessionError> {
        let dialer = self.dialer;
        let dial = timeout_if_some(self.config.dial_timeout, dialer.dial(cluster_name, params));
        let result = select! {
            biased;
            _ = self.shutdown.triggered() => return Err(SessionError::Cancelled(CancelReason::Shutdown)),
            result = dial => result,
        };

        let source = match result {
            Ok(Ok(conn)) => return Ok(conn),
            Ok(Err(error)) => error,
            Err(limit) => DialError::Timeout(limit),
        };

        Err(SessionError::Dial {
            cluster: cluster_name.to_string(),
            source,
        })
    }

    async fn relay<R, W>(&mut self, conn: D::Conn, recv: &mut R, send: &mut W) -> Result<RelaySummary, SessionError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let (mut conn_read, mut conn_write) = tokio::io::split(conn);
        let stats = &self.stats;
        let shutdown = &mut self.shutdown;

        // The client finishing its side only half-closes the node connection, the session keeps
        // going until the node is done too.
        let result = select! {
            biased;
            _ = shutdown.triggered() => Err(SessionError::Cancelled(CancelReason::Shutdown)),
            result = relay_outbound(&mut conn_read, send, stats) => result,
            result = async {
                relay_inbound(recv, &mut conn_write, stats).await?;
                std::future::pending::<Result<(), SessionError>>().await
            } => result,
        };

        let mut conn = conn_read.unsplit(conn_write);
        let cleanup = match timeout_if_some(Some(CLOSE_TIMEOUT), conn.shutdown()).await {
            Ok(Ok(())) => Vec::new(),
            Ok(Err(error)) if error.kind() == io::ErrorKind::NotConnected => Vec::new(),
            Ok(Err(error)) => vec![error],
            Err(limit) => vec![io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Closing the node connection took over {limit:?}"),
            )],
        };
        drop(conn);

        match result {
            Ok(()) => {
                for error in &cleanup {
                    warn!(%error, "Failed to close node connection");
                }

                Ok(self.stats.summary())
            }
            Err(error) => Err(error.with_cleanup(cleanup)),
        }
    }
}

/// Checks a dial request names a node, returning the node's cluster name.
fn validate_request(request: &DialRequest) -> Result<&str, ProtocolViolation> {
    if request.node_id.is_empty() {
        return Err(ProtocolViolation::MissingNodeId);
    }

    match split_node_id(&request.node_id) {
        Some((_, cluster_name)) => Ok(cluster_name),
        None => Err(ProtocolViolation::InvalidNodeId(request.node_id.clone())),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dial_proxy_proto::{
        serialize::ByteWrite,
        shared::{Data, DialRequest, Frame, FrameRef, NetAddr, StatusCode, TunnelType},
    };
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::{
        error::{CancelReason, ErrorKind, SessionError},
        shutdown::{ShutdownSignal, ShutdownTrigger},
        test_utils::TestDialer,
    };

    use super::{CloseReason, DialSession, RelaySummary, SessionConfig, SessionState};

    /// Returns the proxy's receive and send ends of a stream, followed by the client's.
    fn pipes() -> (DuplexStream, DuplexStream, DuplexStream, DuplexStream) {
        let (client_send, proxy_recv) = duplex(0x10000);
        let (proxy_send, client_recv) = duplex(0x10000);
        (proxy_recv, proxy_send, client_send, client_recv)
    }

    async fn send_dial_request(stream: &mut DuplexStream, node_id: &str) {
        let mut request = DialRequest::new(node_id, TunnelType::Node);
        request.source = Some(NetAddr::new("127.0.0.1:4242", "tcp"));
        request.destination = Some(NetAddr::new("127.0.0.1:3022", "tcp"));
        Frame::from(request).write(stream).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_first_frame_never_dials() {
        let (dialer, _nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        FrameRef::data(b"hello").write(&mut client_send).await.unwrap();
        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ProtocolViolation);
        assert_eq!(error.status_code(), StatusCode::ProtocolViolation);
        assert_eq!(session.state(), SessionState::Closed(CloseReason::Failed(ErrorKind::ProtocolViolation)));
        assert!(dialer.calls().is_empty());
    }

    #[tokio::test]
    async fn stream_ending_before_dial_request_is_a_violation() {
        let (dialer, _nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        client_send.shutdown().await.unwrap();
        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ProtocolViolation);
        assert!(dialer.calls().is_empty());
    }

    #[tokio::test]
    async fn node_ids_without_cluster_are_rejected() {
        for node_id in ["", "no-cluster", "trailing."] {
            let (dialer, _nodes) = TestDialer::connecting();
            let config = SessionConfig::default();
            let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
            let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

            send_dial_request(&mut client_send, node_id).await;
            let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::ProtocolViolation, "{node_id:?}");
            assert!(dialer.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn ping_pong() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, mut client_recv) = pipes();

        let peers = async {
            send_dial_request(&mut client_send, "test-id.test-cluster").await;
            FrameRef::data(b"ping").write(&mut client_send).await.unwrap();

            let mut node = nodes.recv().await.unwrap();
            let mut buf = [0u8; 4];
            node.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");

            node.write_all(b"pong").await.unwrap();
            drop(node);

            let frame = Frame::read_next(&mut client_recv).await.unwrap();
            assert_eq!(frame, Some(Frame::Data(Data::new(*b"pong"))));
        };

        let (result, ()) = tokio::join!(session.run(&mut proxy_recv, &mut proxy_send), peers);
        assert_eq!(result.unwrap(), RelaySummary { to_node: 4, from_node: 4 });
        assert_eq!(session.state(), SessionState::Closed(CloseReason::PeerClosed));
        assert_eq!(session.cluster_name(), Some("test-cluster"));

        let calls = dialer.calls();
        assert_eq!(calls.len(), 1);
        let (cluster_name, params) = &calls[0];
        assert_eq!(cluster_name, "test-cluster");
        assert_eq!(params.server_id, "test-id.test-cluster");
        assert_eq!(params.conn_type, TunnelType::Node);
        assert_eq!(params.from, Some(NetAddr::new("127.0.0.1:4242", "tcp")));
        assert_eq!(params.to, Some(NetAddr::new("127.0.0.1:3022", "tcp")));
    }

    #[tokio::test]
    async fn client_finishing_half_closes_the_node() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, mut client_recv) = pipes();

        let peers = async {
            send_dial_request(&mut client_send, "test-id.test-cluster").await;
            FrameRef::data(b"request").write(&mut client_send).await.unwrap();
            client_send.shutdown().await.unwrap();

            let mut node = nodes.recv().await.unwrap();
            let mut received = Vec::new();
            node.read_to_end(&mut received).await.unwrap();
            assert_eq!(received, b"request");

            node.write_all(b"response").await.unwrap();
            node.shutdown().await.unwrap();

            let frame = Frame::read_next(&mut client_recv).await.unwrap();
            assert_eq!(frame, Some(Frame::Data(Data::new(*b"response"))));
        };

        let (result, ()) = tokio::join!(session.run(&mut proxy_recv, &mut proxy_send), peers);
        assert_eq!(result.unwrap(), RelaySummary { to_node: 7, from_node: 8 });
    }

    #[tokio::test]
    async fn node_closing_ends_session_while_client_stream_is_open() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        let peers = async {
            send_dial_request(&mut client_send, "test-id.test-cluster").await;
            let node = nodes.recv().await.unwrap();
            drop(node);
        };

        let (result, ()) = tokio::join!(session.run(&mut proxy_recv, &mut proxy_send), peers);
        assert_eq!(result.unwrap(), RelaySummary::default());
        assert!(session.state().is_closed());
    }

    #[tokio::test]
    async fn node_closing_ends_session_while_client_keeps_sending() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        let client = async {
            send_dial_request(&mut client_send, "test-id.test-cluster").await;
            let node = nodes.recv().await.unwrap();
            FrameRef::data(b"early").write(&mut client_send).await.unwrap();
            drop(node);

            for _ in 0..1000 {
                FrameRef::data(b"still sending").write(&mut client_send).await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };

        let result = tokio::select! {
            result = session.run(&mut proxy_recv, &mut proxy_send) => result,
            _ = client => panic!("Session outlived the client's writes"),
        };

        assert!(result.is_ok(), "{result:?}");
        assert_eq!(session.state(), SessionState::Closed(CloseReason::PeerClosed));
    }

    #[tokio::test]
    async fn second_dial_request_is_a_violation() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        send_dial_request(&mut client_send, "test-id.test-cluster").await;
        send_dial_request(&mut client_send, "test-id.test-cluster").await;

        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ProtocolViolation);

        // The session closed the dialed connection on its way out.
        let mut node = nodes.recv().await.unwrap();
        let mut received = Vec::new();
        node.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn dial_not_found() {
        let dialer = TestDialer::not_found();
        let config = SessionConfig::default();
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        send_dial_request(&mut client_send, "missing.test-cluster").await;
        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::DialFailure);
        assert_eq!(error.status_code(), StatusCode::DialNotFound);
        assert_eq!(dialer.calls().len(), 1);
    }

    #[tokio::test]
    async fn dial_timeout_is_a_dial_failure() {
        let dialer = TestDialer::hanging();
        let config = SessionConfig {
            dial_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        send_dial_request(&mut client_send, "slow.test-cluster").await;
        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DialFailure);
        assert_eq!(error.status_code(), StatusCode::DialUnreachable);
    }

    #[tokio::test]
    async fn handshake_timeout_cancels() {
        let (dialer, _nodes) = TestDialer::connecting();
        let config = SessionConfig {
            handshake_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let mut session = DialSession::new(&dialer, &config, ShutdownSignal::never());
        let (mut proxy_recv, mut proxy_send, _client_send, _client_recv) = pipes();

        let error = session.run(&mut proxy_recv, &mut proxy_send).await.unwrap_err();
        assert!(matches!(error, SessionError::Cancelled(CancelReason::HandshakeTimeout(_))), "{error:?}");
        assert_eq!(error.status_code(), StatusCode::Cancelled);
    }

    #[tokio::test]
    async fn shutdown_cancels_pending_dial() {
        let dialer = TestDialer::hanging();
        let config = SessionConfig::default();
        let trigger = ShutdownTrigger::new();
        let mut session = DialSession::new(&dialer, &config, trigger.signal());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        let cancel = async {
            send_dial_request(&mut client_send, "slow.test-cluster").await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.trigger();
        };

        let (result, ()) = tokio::join!(session.run(&mut proxy_recv, &mut proxy_send), cancel);
        let error = result.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Cancelled);
        assert_eq!(session.state(), SessionState::Closed(CloseReason::Failed(ErrorKind::Cancelled)));
    }

    #[tokio::test]
    async fn shutdown_cancels_relay_and_closes_node() {
        let (dialer, mut nodes) = TestDialer::connecting();
        let config = SessionConfig::default();
        let trigger = ShutdownTrigger::new();
        let mut session = DialSession::new(&dialer, &config, trigger.signal());
        let (mut proxy_recv, mut proxy_send, mut client_send, _client_recv) = pipes();

        let peers = async {
            send_dial_request(&mut client_send, "test-id.test-cluster").await;
            let node = nodes.recv().await.unwrap();
            trigger.trigger();
            node
        };

        let (result, mut node) = tokio::join!(session.run(&mut proxy_recv, &mut proxy_send), peers);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);

        let mut received = Vec::new();
        node.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }
}
