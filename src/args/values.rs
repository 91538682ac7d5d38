use std::{fmt, time::Duration};

use dial_proxy_proto::shared::TunnelType;

use crate::dialer::split_node_id;

use super::Route;

#[derive(Debug, PartialEq, Eq)]
pub enum RouteErrorType {
    UnexpectedEnd(String),
    MissingSeparator(String, String),
    InvalidNodeId(String, String),
    InvalidTarget(String, String),
}

impl fmt::Display for RouteErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected route after {arg}"),
            Self::MissingSeparator(arg, arg2) => write!(f, "Invalid route after {arg}, expected node_id=host:port but got {arg2}"),
            Self::InvalidNodeId(arg, node_id) => {
                write!(f, "Invalid node id in route after {arg}, expected server_id.cluster but got {node_id}")
            }
            Self::InvalidTarget(arg, target) => write!(f, "Invalid route target after {arg}, expected host:port but got {target}"),
        }
    }
}

/// Parses a route argument in the form `node_id=host:port`. The target isn't resolved, only
/// checked to have a host and a valid port.
pub(super) fn parse_route_arg(arg: String, maybe_arg2: Option<String>) -> Result<Route, RouteErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(RouteErrorType::UnexpectedEnd(arg)),
    };

    let (node_id, target) = match arg2.split_once('=') {
        Some((node_id, target)) => (node_id.trim(), target.trim()),
        None => return Err(RouteErrorType::MissingSeparator(arg, arg2)),
    };

    if split_node_id(node_id).is_none() {
        return Err(RouteErrorType::InvalidNodeId(arg, node_id.to_string()));
    }

    let valid_target = match target.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p != 0),
        None => false,
    };

    match valid_target {
        true => Ok(Route::new(node_id, target)),
        false => Err(RouteErrorType::InvalidTarget(arg, target.to_string())),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TimeoutErrorType {
    UnexpectedEnd(String),
    InvalidValue(String, String),
}

impl fmt::Display for TimeoutErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected timeout in milliseconds after {arg}"),
            Self::InvalidValue(arg, arg2) => write!(f, "Invalid timeout after {arg}, expected milliseconds but got {arg2}"),
        }
    }
}

/// Parses a timeout in milliseconds, where 0 means no timeout.
pub(super) fn parse_timeout_arg(arg: String, maybe_arg2: Option<String>) -> Result<Option<Duration>, TimeoutErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(TimeoutErrorType::UnexpectedEnd(arg)),
    };

    match arg2.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(millis) => Ok(Some(Duration::from_millis(millis))),
        Err(_) => Err(TimeoutErrorType::InvalidValue(arg, arg2)),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum NodeIdErrorType {
    UnexpectedEnd(String),
    InvalidValue(String, String),
}

impl fmt::Display for NodeIdErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected node id after {arg}"),
            Self::InvalidValue(arg, arg2) => write!(f, "Invalid node id after {arg}, expected server_id.cluster but got {arg2}"),
        }
    }
}

pub(super) fn parse_node_id_arg(arg: String, maybe_arg2: Option<String>) -> Result<String, NodeIdErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(NodeIdErrorType::UnexpectedEnd(arg)),
    };

    match split_node_id(&arg2) {
        Some(_) => Ok(arg2),
        None => Err(NodeIdErrorType::InvalidValue(arg, arg2)),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TunnelTypeErrorType {
    UnexpectedEnd(String),
    InvalidValue(String, String),
}

impl fmt::Display for TunnelTypeErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd(arg) => write!(f, "Expected tunnel type after {arg}"),
            Self::InvalidValue(arg, arg2) => write!(
                f,
                "Invalid tunnel type after {arg}: {arg2} (expected node, proxy, app, kube, db or windows_desktop)"
            ),
        }
    }
}

pub(super) fn parse_tunnel_type_arg(arg: String, maybe_arg2: Option<String>) -> Result<TunnelType, TunnelTypeErrorType> {
    let arg2 = match maybe_arg2 {
        Some(arg2) => arg2,
        None => return Err(TunnelTypeErrorType::UnexpectedEnd(arg)),
    };

    arg2.parse::<TunnelType>().map_err(|_| TunnelTypeErrorType::InvalidValue(arg, arg2))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dial_proxy_proto::shared::TunnelType;

    use crate::args::Route;

    use super::{parse_route_arg, parse_timeout_arg, parse_tunnel_type_arg, RouteErrorType, TunnelTypeErrorType};

    fn route(value: &str) -> Result<Route, RouteErrorType> {
        parse_route_arg("--route".into(), Some(value.into()))
    }

    #[test]
    fn parses_routes() {
        assert_eq!(route("node.root=127.0.0.1:22"), Ok(Route::new("node.root", "127.0.0.1:22")));
        assert_eq!(route("a.b.leaf = db.internal:5432"), Ok(Route::new("a.b.leaf", "db.internal:5432")));
        assert_eq!(route("node.root=[::1]:22"), Ok(Route::new("node.root", "[::1]:22")));
    }

    #[test]
    fn rejects_bad_routes() {
        assert!(matches!(route("node.root"), Err(RouteErrorType::MissingSeparator(_, _))));
        assert!(matches!(route("node=127.0.0.1:22"), Err(RouteErrorType::InvalidNodeId(_, _))));
        assert!(matches!(route("node.root=127.0.0.1"), Err(RouteErrorType::InvalidTarget(_, _))));
        assert!(matches!(route("node.root=127.0.0.1:0"), Err(RouteErrorType::InvalidTarget(_, _))));
        assert!(matches!(route("node.root=:22"), Err(RouteErrorType::InvalidTarget(_, _))));
        assert_eq!(
            parse_route_arg("--route".into(), None),
            Err(RouteErrorType::UnexpectedEnd("--route".into()))
        );
    }

    #[test]
    fn zero_timeout_disables_it() {
        assert_eq!(parse_timeout_arg("--dial-timeout".into(), Some("0".into())), Ok(None));
        assert_eq!(
            parse_timeout_arg("--dial-timeout".into(), Some("1500".into())),
            Ok(Some(Duration::from_millis(1500)))
        );
        assert!(parse_timeout_arg("--dial-timeout".into(), Some("-1".into())).is_err());
    }

    #[test]
    fn parses_tunnel_types() {
        assert_eq!(parse_tunnel_type_arg("--tunnel-type".into(), Some("db".into())), Ok(TunnelType::Database));
        assert_eq!(
            parse_tunnel_type_arg("--tunnel-type".into(), Some("ssh".into())),
            Err(TunnelTypeErrorType::InvalidValue("--tunnel-type".into(), "ssh".into()))
        );
    }
}
