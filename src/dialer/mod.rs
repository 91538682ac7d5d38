use std::{io, time::Duration};

use dial_proxy_proto::shared::{DialRequest, NetAddr, StatusCode, TunnelType};
use tokio::io::{AsyncRead, AsyncWrite};

mod static_routes;

pub use static_routes::*;

/// The character separating a node's server id from its cluster name.
pub const NODE_ID_SEPARATOR: char = '.';

/// Everything a [`ClusterDialer`] is told about the node it should reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialParams {
    pub conn_type: TunnelType,
    pub server_id: String,
    pub from: Option<NetAddr>,
    pub to: Option<NetAddr>,
}

impl From<DialRequest> for DialParams {
    fn from(request: DialRequest) -> Self {
        Self {
            conn_type: request.tunnel_type,
            server_id: request.node_id,
            from: request.source,
            to: request.destination,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("node unreachable: {0}")]
    Unreachable(#[source] io::Error),

    #[error("dial timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal dial error: {0}")]
    Internal(String),
}

impl DialError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::DialNotFound,
            Self::Unreachable(_) | Self::Timeout(_) => StatusCode::DialUnreachable,
            Self::Internal(_) => StatusCode::DialInternal,
        }
    }
}

/// Reaches nodes inside a cluster, through whatever tunnels or routes the implementation knows
/// of. The proxy calls [`ClusterDialer::dial`] once per session and owns the returned connection
/// from then on.
#[allow(async_fn_in_trait)]
pub trait ClusterDialer {
    type Conn: AsyncRead + AsyncWrite + Unpin;

    async fn dial(&self, cluster_name: &str, params: DialParams) -> Result<Self::Conn, DialError>;
}

/// Splits a node id into its server id and cluster name at the last separator, so
/// `"test-id.test-cluster"` yields `("test-id", "test-cluster")`. Server ids may themselves
/// contain separators, cluster names can't.
///
/// Returns `None` if there's no separator or either side of it is empty.
pub fn split_node_id(node_id: &str) -> Option<(&str, &str)> {
    let (server_id, cluster_name) = node_id.rsplit_once(NODE_ID_SEPARATOR)?;
    match server_id.is_empty() || cluster_name.is_empty() {
        true => None,
        false => Some((server_id, cluster_name)),
    }
}
