use std::{
    future::{poll_fn, Future},
    io::{self, Error, ErrorKind},
    net::SocketAddr,
    pin::Pin,
    task::Poll,
};

use quinn::{Connection, Endpoint};
use tracing::{debug, warn};

use crate::{
    endpoint::{bind_endpoint, SERVER_NAME},
    utils::{UNSPECIFIED_SOCKADDR_V4, UNSPECIFIED_SOCKADDR_V6},
};

/// Connects to whichever of `addresses` answers first. Returns the connection along with the
/// endpoint it was made on, which must be kept alive for as long as the connection is used.
pub async fn connect_client(addresses: &[SocketAddr]) -> io::Result<(Endpoint, Connection)> {
    let ipv4_endpoint = match addresses.iter().any(|a| a.is_ipv4()) {
        false => None,
        true => match bind_endpoint(UNSPECIFIED_SOCKADDR_V4, true, false) {
            Ok(endpoint) => Some(endpoint),
            Err(error) => {
                warn!(%error, "Cannot use IPv4 because binding an IPv4 endpoint failed");
                None
            }
        },
    };

    let ipv6_endpoint = match addresses.iter().any(|a| a.is_ipv6()) {
        false => None,
        true => match bind_endpoint(UNSPECIFIED_SOCKADDR_V6, true, false) {
            Ok(endpoint) => Some(endpoint),
            Err(error) => {
                warn!(%error, "Cannot use IPv6 because binding an IPv6 endpoint failed");
                None
            }
        },
    };

    let mut connect_futures = Vec::with_capacity(addresses.len());
    for &address in addresses {
        let maybe_endpoint = match address {
            SocketAddr::V4(_) => &ipv4_endpoint,
            SocketAddr::V6(_) => &ipv6_endpoint,
        };

        let endpoint = match maybe_endpoint {
            Some(endpoint) => endpoint,
            None => continue,
        };

        match endpoint.connect(address, SERVER_NAME) {
            Ok(c) => connect_futures.push((c, address)),
            Err(error) => warn!(%address, %error, "Couldn't start connection"),
        };
    }

    if connect_futures.is_empty() {
        return Err(Error::new(ErrorKind::Other, "Couldn't start a connection to any of the provided addresses"));
    }

    let result = poll_fn(move |cx| {
        let mut i = 0;
        while i < connect_futures.len() {
            match Pin::new(&mut connect_futures[i].0).poll(cx) {
                Poll::Ready(Ok(connection)) => return Poll::Ready(Some(connection)),
                Poll::Ready(Err(error)) => {
                    warn!(address = %connect_futures[i].1, %error, "Connection failed");
                    drop(connect_futures.swap_remove(i));

                    if connect_futures.is_empty() {
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => i += 1,
            }
        }

        Poll::Pending
    })
    .await;

    let connection = match result {
        Some(conn) => conn,
        None => {
            return Err(Error::new(
                ErrorKind::Other,
                "Couldn't establish a connection to any of the provided addresses",
            ))
        }
    };

    let endpoint = match connection.remote_address() {
        SocketAddr::V4(_) => ipv4_endpoint,
        SocketAddr::V6(_) => ipv6_endpoint,
    };

    match endpoint {
        Some(endpoint) => Ok((endpoint, connection)),
        None => Err(Error::new(ErrorKind::Other, "Connected through an endpoint that doesn't exist")),
    }
}

/// Binds a server endpoint on each of `addresses`. Addresses that can't be bound are skipped, it's
/// only an error if none can.
pub fn bind_server_endpoints(addresses: &[SocketAddr]) -> io::Result<Vec<Endpoint>> {
    let mut endpoints = Vec::with_capacity(addresses.len());

    for &address in addresses {
        match bind_endpoint(address, false, true) {
            Ok(endpoint) => {
                debug!(%address, "Bound server endpoint");
                endpoints.push(endpoint);
            }
            Err(error) => warn!(%address, %error, "Couldn't bind server endpoint"),
        }
    }

    match endpoints.is_empty() {
        true => Err(Error::new(
            ErrorKind::Other,
            "Couldn't bind a socket to any of the provided addresses",
        )),
        false => Ok(endpoints),
    }
}
