use std::cell::RefCell;

use quinn::{Connection, Endpoint};
use tokio::{
    io::{duplex, DuplexStream},
    sync::mpsc,
};

use crate::{
    dialer::{ClusterDialer, DialError, DialParams},
    endpoint::{bind_endpoint, SERVER_NAME},
};

pub const NODE_PIPE_CAPACITY: usize = 0x10000;

enum Outcome {
    Connect(mpsc::UnboundedSender<DuplexStream>),
    NotFound,
    Hang,
}

/// A [`ClusterDialer`] that records every call and connects to in-memory nodes.
pub struct TestDialer {
    outcome: Outcome,
    calls: RefCell<Vec<(String, DialParams)>>,
}

impl TestDialer {
    /// A dialer whose dials all succeed. The node's end of each dialed connection is sent to the
    /// returned receiver.
    pub fn connecting() -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(Outcome::Connect(sender)), receiver)
    }

    pub fn not_found() -> Self {
        Self::new(Outcome::NotFound)
    }

    /// A dialer whose dials never complete.
    pub fn hanging() -> Self {
        Self::new(Outcome::Hang)
    }

    fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, DialParams)> {
        self.calls.borrow().clone()
    }
}

impl ClusterDialer for TestDialer {
    type Conn = DuplexStream;

    async fn dial(&self, cluster_name: &str, params: DialParams) -> Result<DuplexStream, DialError> {
        self.calls.borrow_mut().push((cluster_name.to_string(), params.clone()));

        match &self.outcome {
            Outcome::Connect(sender) => {
                let (conn, node) = duplex(NODE_PIPE_CAPACITY);
                sender
                    .send(node)
                    .map_err(|_| DialError::Internal("test node receiver dropped".into()))?;
                Ok(conn)
            }
            Outcome::NotFound => Err(DialError::NotFound(format!("node {}", params.server_id))),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

pub fn loopback_server() -> Endpoint {
    bind_endpoint("127.0.0.1:0".parse().unwrap(), false, true).unwrap()
}

pub fn loopback_client() -> Endpoint {
    bind_endpoint("127.0.0.1:0".parse().unwrap(), true, false).unwrap()
}

pub async fn connect_loopback(client: &Endpoint, server: &Endpoint) -> Connection {
    client.connect(server.local_addr().unwrap(), SERVER_NAME).unwrap().await.unwrap()
}
