use std::collections::HashMap;

use tokio::net::TcpStream;
use tracing::debug;

use super::{split_node_id, ClusterDialer, DialError, DialParams};

/// A [`ClusterDialer`] backed by a fixed table that maps node ids to TCP addresses.
///
/// A node is only found if its id is in the table and the id's cluster name matches the cluster
/// being dialed.
#[derive(Debug, Default)]
pub struct StaticRouteDialer {
    routes: HashMap<String, String>,
}

impl StaticRouteDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route to `target`, given as `host:port`. Returns the previous target for this node,
    /// if there was one.
    pub fn add_route<N: Into<String>, T: Into<String>>(&mut self, node_id: N, target: T) -> Option<String> {
        self.routes.insert(node_id.into(), target.into())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for StaticRouteDialer {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut dialer = Self::new();
        for (node_id, target) in iter {
            dialer.add_route(node_id, target);
        }

        dialer
    }
}

impl ClusterDialer for StaticRouteDialer {
    type Conn = TcpStream;

    async fn dial(&self, cluster_name: &str, params: DialParams) -> Result<TcpStream, DialError> {
        match split_node_id(&params.server_id) {
            Some((_, node_cluster)) if node_cluster == cluster_name => {}
            _ => return Err(DialError::NotFound(format!("cluster {cluster_name}"))),
        }

        let target = match self.routes.get(&params.server_id) {
            Some(target) => target,
            None => return Err(DialError::NotFound(format!("node {}", params.server_id))),
        };

        debug!(node = %params.server_id, %target, conn_type = %params.conn_type, "Dialing node");
        TcpStream::connect(target.as_str()).await.map_err(DialError::Unreachable)
    }
}
