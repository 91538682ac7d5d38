use std::{
    io::{self, Error, ErrorKind},
    net::{SocketAddr, UdpSocket},
    sync::Arc,
    time::Duration,
};

use quinn::{ClientConfig, Endpoint, EndpointConfig, IdleTimeout, ServerConfig, TokioRuntime, TransportConfig, VarInt};

pub const KEEPALIVE_INTERVAL_PERIOD_MILLIS: u64 = 1000;
pub const MAX_IDLE_TIMEOUT_MILLIS: u32 = 10000;

/// The name the proxy's self-signed certificate is issued for, and that clients connect with.
pub const SERVER_NAME: &str = "localhost";

/// Binds a UDP socket to `addr` and makes a QUIC endpoint on it.
pub fn bind_endpoint(addr: SocketAddr, is_client: bool, is_server: bool) -> io::Result<Endpoint> {
    make_endpoint(UdpSocket::bind(addr)?, is_client, is_server)
}

pub fn make_endpoint(socket: UdpSocket, is_client: bool, is_server: bool) -> io::Result<Endpoint> {
    let server_config = match is_server {
        true => Some(configure_server()?),
        false => None,
    };

    let mut endpoint = Endpoint::new(EndpointConfig::default(), server_config, socket, Arc::new(TokioRuntime))?;
    if is_client {
        endpoint.set_default_client_config(configure_client());
    }

    Ok(endpoint)
}

pub fn configure_client() -> ClientConfig {
    let crypto = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(SkipServerVerification::new())
        .with_no_client_auth();

    let mut client_config = ClientConfig::new(Arc::new(crypto));
    client_config.transport_config(Arc::new(make_transport_config()));
    client_config
}

/// Makes a server config with a freshly generated self-signed certificate.
pub fn configure_server() -> io::Result<ServerConfig> {
    let cert = rcgen::generate_simple_self_signed(vec![SERVER_NAME.into()]).map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
    let cert_der = cert.serialize_der().map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?;
    let priv_key = rustls::PrivateKey(cert.serialize_private_key_der());
    let cert_chain = vec![rustls::Certificate(cert_der)];

    let mut server_config = ServerConfig::with_single_cert(cert_chain, priv_key).map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;
    server_config.transport_config(Arc::new(make_transport_config()));

    Ok(server_config)
}

/// Dial sessions only use bidirectional streams.
fn make_transport_config() -> TransportConfig {
    let mut transport_config = TransportConfig::default();
    transport_config.max_concurrent_uni_streams(0_u8.into());
    transport_config.keep_alive_interval(Some(Duration::from_millis(KEEPALIVE_INTERVAL_PERIOD_MILLIS)));
    transport_config.max_idle_timeout(Some(IdleTimeout::from(VarInt::from_u32(MAX_IDLE_TIMEOUT_MILLIS))));
    transport_config
}

struct SkipServerVerification;

impl SkipServerVerification {
    fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl rustls::client::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
