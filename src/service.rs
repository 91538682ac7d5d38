use std::{
    io::{self, ErrorKind},
    rc::Rc,
    time::Duration,
};

use dial_proxy_proto::shared::StatusCode;
use quinn::{Connecting, ConnectionError, Endpoint, RecvStream, SendStream, VarInt};
use tokio::select;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::{
    dialer::ClusterDialer,
    error::{RelayOp, SessionError},
    session::{DialSession, RelaySummary, SessionConfig},
    shutdown::ShutdownSignal,
    utils::timeout_if_some,
};

/// How long the client may take to acknowledge everything sent to it once a session ends.
const FINISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Serves dial sessions, one per bidirectional stream, using a shared dialer.
pub struct ProxyService<D> {
    dialer: D,
    config: SessionConfig,
    shutdown: ShutdownSignal,
}

impl<D: ClusterDialer> ProxyService<D> {
    pub fn new(dialer: D, config: SessionConfig, shutdown: ShutdownSignal) -> Self {
        Self { dialer, config, shutdown }
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Runs a dial session over an accepted stream and closes the stream once it's over. A session
    /// that ends cleanly finishes the stream, a failed one resets it with the failure's
    /// [`StatusCode`].
    pub async fn handle_stream(&self, mut send: SendStream, mut recv: RecvStream) -> Result<RelaySummary, SessionError> {
        let mut session = DialSession::new(&self.dialer, &self.config, self.shutdown.clone());

        match session.run(&mut recv, &mut send).await {
            Ok(summary) => {
                finish_stream(&mut send).await?;
                Ok(summary)
            }
            Err(error) => {
                let code = error.status_code().to_var_int();

                // Either half may already be closed if the client gave up first.
                if let Err(reset_error) = send.reset(code) {
                    debug!(%reset_error, "Couldn't reset the send half of the stream");
                }
                if let Err(stop_error) = recv.stop(code) {
                    debug!(%stop_error, "Couldn't stop the receive half of the stream");
                }

                Err(error)
            }
        }
    }
}

async fn finish_stream(send: &mut SendStream) -> Result<(), SessionError> {
    let result = timeout_if_some(Some(FINISH_TIMEOUT), send.finish()).await;
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(SessionError::relay(RelayOp::FinishingStream, error.into())),
        Err(limit) => {
            if let Err(reset_error) = send.reset(StatusCode::Cancelled.to_var_int()) {
                debug!(%reset_error, "Couldn't reset the unacknowledged stream");
            }
            let error = io::Error::new(ErrorKind::TimedOut, format!("Client didn't acknowledge the stream within {limit:?}"));
            Err(SessionError::relay(RelayOp::FinishingStream, error))
        }
    }
}

/// Accepts connections on `endpoint` until it's closed or the service is told to shut down. Every
/// connection and every stream within it is handled in its own task.
pub async fn run_server<D: ClusterDialer + 'static>(endpoint: Endpoint, service: Rc<ProxyService<D>>) {
    match endpoint.local_addr() {
        Ok(addr) => info!(%addr, "Starting proxy"),
        Err(error) => warn!(%error, "Starting proxy on unknown address"),
    }

    let mut shutdown = service.shutdown.clone();
    loop {
        let incoming_connection = select! {
            biased;
            _ = shutdown.triggered() => break,
            v = endpoint.accept() => v,
        };

        let incoming_connection = match incoming_connection {
            Some(c) => c,
            None => break,
        };

        let remote = incoming_connection.remote_address();
        debug!(%remote, "Incoming connection");
        let service = Rc::clone(&service);
        tokio::task::spawn_local(handle_connection(incoming_connection, service).instrument(info_span!("connection", %remote)));
    }

    endpoint.close(VarInt::from_u32(0), b"Proxy is shutting down");
    info!("Proxy closed");
}

async fn handle_connection<D: ClusterDialer + 'static>(incoming_connection: Connecting, service: Rc<ProxyService<D>>) {
    let connection = match incoming_connection.await {
        Ok(c) => c,
        Err(error) => {
            warn!(%error, "Failed to accept incoming connection");
            return;
        }
    };

    let mut shutdown = service.shutdown.clone();
    loop {
        let accept_result = select! {
            biased;
            _ = shutdown.triggered() => break,
            v = connection.accept_bi() => v,
        };

        let (send_stream, recv_stream) = match accept_result {
            Ok(v) => v,
            Err(ConnectionError::ApplicationClosed(_) | ConnectionError::LocallyClosed) => {
                debug!("Connection closed");
                break;
            }
            Err(error) => {
                warn!(%error, "Connection lost");
                break;
            }
        };

        let stream = send_stream.id();
        let service = Rc::clone(&service);
        let session = async move {
            match service.handle_stream(send_stream, recv_stream).await {
                Ok(summary) => info!(
                    "Session ended after {} bytes sent and {} bytes received",
                    summary.to_node, summary.from_node
                ),
                Err(error) if error.status_code() == StatusCode::Cancelled => debug!(%error, "Session cancelled"),
                Err(error) => warn!(%error, status = %error.status_code(), "Session failed"),
            }
        };

        tokio::task::spawn_local(session.instrument(info_span!("session", %stream)));
    }
}
