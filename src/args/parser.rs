use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use super::{
    parse_node_id_arg, parse_route_arg, parse_socket_arg, parse_timeout_arg, parse_tunnel_type_arg, ArgumentsRequest,
    NodeIdErrorType, RouteErrorType, SocketErrorType, StartClientConfig, StartServerConfig, StartupArguments, StartupMode,
    TimeoutErrorType, TunnelTypeErrorType, DEFAULT_PORT,
};

#[derive(Debug, PartialEq, Eq)]
pub enum ArgumentsError {
    UnknownArgument(String),
    ConnectError(SocketErrorType),
    ListenError(SocketErrorType),
    Route(RouteErrorType),
    DialTimeout(TimeoutErrorType),
    HandshakeTimeout(TimeoutErrorType),
    NodeId(NodeIdErrorType),
    TunnelType(TunnelTypeErrorType),
    ClientFoundServerArgument(String),
    ServerFoundClientArgument(String),
    MissingDestination,
    MissingNodeId,
}

impl fmt::Display for ArgumentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArgument(arg) => write!(f, "Unknown argument: {arg}"),
            Self::ConnectError(socket_error) => socket_error.fmt(f),
            Self::ListenError(socket_error) => socket_error.fmt(f),
            Self::Route(route_error) => route_error.fmt(f),
            Self::DialTimeout(timeout_error) => timeout_error.fmt(f),
            Self::HandshakeTimeout(timeout_error) => timeout_error.fmt(f),
            Self::NodeId(node_id_error) => node_id_error.fmt(f),
            Self::TunnelType(tunnel_type_error) => tunnel_type_error.fmt(f),
            Self::ClientFoundServerArgument(arg) => {
                write!(f, "Previous arguments indicated client mode, but {arg} is indicating server mode")
            }
            Self::ServerFoundClientArgument(arg) => {
                write!(f, "Previous arguments indicated server mode, but {arg} is indicating client mode")
            }
            Self::MissingDestination => write!(f, "When running on client mode, a proxy address must be specified with --connect"),
            Self::MissingNodeId => write!(f, "When running on client mode, the node to dial must be specified with --node"),
        }
    }
}

struct StartupArgumentsParser {
    verbose: bool,
    silent: bool,
    startup_mode: Option<StartupMode>,
}

impl StartupArgumentsParser {
    const fn new() -> Self {
        Self {
            verbose: false,
            silent: false,
            startup_mode: None,
        }
    }

    fn modify_startup_mode_client<F>(&mut self, arg: String, f: F) -> Result<(), ArgumentsError>
    where
        F: FnOnce(String, &mut StartClientConfig) -> Result<(), ArgumentsError>,
    {
        match &mut self.startup_mode {
            None => {
                let mut client_config = StartClientConfig::new();
                f(arg, &mut client_config)?;
                self.startup_mode = Some(StartupMode::Client(client_config));
            }
            Some(StartupMode::Client(client_config)) => f(arg, client_config)?,
            Some(StartupMode::Server(_)) => return Err(ArgumentsError::ServerFoundClientArgument(arg)),
        }

        Ok(())
    }

    fn modify_startup_mode_server<F>(&mut self, arg: String, f: F) -> Result<(), ArgumentsError>
    where
        F: FnOnce(String, &mut StartServerConfig) -> Result<(), ArgumentsError>,
    {
        match &mut self.startup_mode {
            None => {
                let mut server_config = StartServerConfig::new();
                f(arg, &mut server_config)?;
                self.startup_mode = Some(StartupMode::Server(server_config));
            }
            Some(StartupMode::Server(server_config)) => f(arg, server_config)?,
            Some(StartupMode::Client(_)) => return Err(ArgumentsError::ClientFoundServerArgument(arg)),
        }

        Ok(())
    }

    fn complete(self) -> Result<StartupArguments, ArgumentsError> {
        let mut startup_mode = self.startup_mode.unwrap_or_else(|| StartupMode::Server(StartServerConfig::new()));

        match &mut startup_mode {
            StartupMode::Server(server_config) => {
                if server_config.listen_addresses.is_empty() {
                    let addresses = &mut server_config.listen_addresses;
                    addresses.push(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), DEFAULT_PORT));
                    addresses.push(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT));
                }
            }
            StartupMode::Client(client_config) => {
                if client_config.connect_addresses.is_empty() {
                    return Err(ArgumentsError::MissingDestination);
                }

                if client_config.node_id.is_empty() {
                    return Err(ArgumentsError::MissingNodeId);
                }
            }
        }

        Ok(StartupArguments::new(self.verbose, self.silent, startup_mode))
    }
}

fn try_parse_general_argument(result: &mut StartupArgumentsParser, maybe_arg: &mut Option<String>) -> Result<bool, ArgumentsError> {
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("-v") || arg.eq_ignore_ascii_case("--verbose") {
        result.verbose = true;
    } else if arg.eq("-s") || arg.eq_ignore_ascii_case("--silent") {
        result.silent = true;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_client_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("--client") {
        result.modify_startup_mode_client(arg, |_, _| Ok(()))?;
    } else if arg.eq("--connect") {
        result.modify_startup_mode_client(arg, |arg, client_config| {
            let addresses = &mut client_config.connect_addresses;
            parse_socket_arg(addresses, arg, get_next_arg(), DEFAULT_PORT).map_err(ArgumentsError::ConnectError)
        })?;
    } else if arg.eq("--node") {
        result.modify_startup_mode_client(arg, |arg, client_config| {
            client_config.node_id = parse_node_id_arg(arg, get_next_arg()).map_err(ArgumentsError::NodeId)?;
            Ok(())
        })?;
    } else if arg.eq_ignore_ascii_case("--tunnel-type") {
        result.modify_startup_mode_client(arg, |arg, client_config| {
            client_config.tunnel_type = parse_tunnel_type_arg(arg, get_next_arg()).map_err(ArgumentsError::TunnelType)?;
            Ok(())
        })?;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

fn try_parse_server_argument<F>(
    result: &mut StartupArgumentsParser,
    maybe_arg: &mut Option<String>,
    get_next_arg: F,
) -> Result<bool, ArgumentsError>
where
    F: FnOnce() -> Option<String>,
{
    let arg = match maybe_arg.take() {
        Some(s) => s,
        None => return Ok(false),
    };

    if arg.eq("--server") {
        result.modify_startup_mode_server(arg, |_, _| Ok(()))?;
    } else if arg.eq("--listen") {
        result.modify_startup_mode_server(arg, |arg, server_config| {
            let addresses = &mut server_config.listen_addresses;
            parse_socket_arg(addresses, arg, get_next_arg(), DEFAULT_PORT).map_err(ArgumentsError::ListenError)
        })?;
    } else if arg.eq("--route") {
        result.modify_startup_mode_server(arg, |arg, server_config| {
            let route = parse_route_arg(arg, get_next_arg()).map_err(ArgumentsError::Route)?;
            server_config.routes.retain(|r| r.node_id != route.node_id);
            server_config.routes.push(route);
            Ok(())
        })?;
    } else if arg.eq_ignore_ascii_case("--dial-timeout") {
        result.modify_startup_mode_server(arg, |arg, server_config| {
            server_config.session.dial_timeout = parse_timeout_arg(arg, get_next_arg()).map_err(ArgumentsError::DialTimeout)?;
            Ok(())
        })?;
    } else if arg.eq_ignore_ascii_case("--handshake-timeout") {
        result.modify_startup_mode_server(arg, |arg, server_config| {
            server_config.session.handshake_timeout =
                parse_timeout_arg(arg, get_next_arg()).map_err(ArgumentsError::HandshakeTimeout)?;
            Ok(())
        })?;
    } else {
        *maybe_arg = Some(arg);
    }

    Ok(maybe_arg.is_none())
}

pub fn parse_arguments<T>(mut args: T) -> Result<ArgumentsRequest, ArgumentsError>
where
    T: Iterator<Item = String>,
{
    let mut result = StartupArgumentsParser::new();

    // Ignore the first argument, as it's by convention the name of the program
    args.next();

    while let Some(arg) = args.next() {
        if arg.is_empty() {
            continue;
        } else if arg.eq("-h") || arg.eq_ignore_ascii_case("--help") {
            return Ok(ArgumentsRequest::Help);
        } else if arg.eq("-V") || arg.eq_ignore_ascii_case("--version") {
            return Ok(ArgumentsRequest::Version);
        }

        let mut maybe_arg = Some(arg);
        let _ = !try_parse_general_argument(&mut result, &mut maybe_arg)?
            && !try_parse_client_argument(&mut result, &mut maybe_arg, || args.next())?
            && !try_parse_server_argument(&mut result, &mut maybe_arg, || args.next())?;

        if let Some(arg) = maybe_arg {
            return Err(ArgumentsError::UnknownArgument(arg));
        }
    }

    let result = result.complete()?;
    Ok(ArgumentsRequest::Run(result))
}
