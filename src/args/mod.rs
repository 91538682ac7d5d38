use std::net::SocketAddr;

use dial_proxy_proto::shared::TunnelType;

use crate::session::SessionConfig;

mod addresses;
mod parser;
mod values;

pub use addresses::*;
pub use parser::*;
pub use values::*;

/// The default port the proxy listens on and clients connect to.
pub const DEFAULT_PORT: u16 = 5995;

/// Gets a small string with this program's name and version.
pub fn get_version_string() -> String {
    format!(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), " ({} {})"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Gets a string with this program's help documentation.
pub fn get_help_string() -> &'static str {
    concat!(
        "Usage: ",
        env!("CARGO_PKG_NAME"),
        " [options...]\n",
        "Dials nodes by id and relays a byte stream to them over QUIC.\n",
        "\n",
        "General options:\n",
        "  -h, --help                      Display this help menu and exit\n",
        "  -V, --version                   Display the version number and exit\n",
        "  -v, --verbose                   Log debug information\n",
        "  -s, --silent                    Only log errors (RUST_LOG overrides both)\n",
        "\n",
        "Server options (the default mode):\n",
        "  --server                        Run as the proxy\n",
        "  --listen <address>              Listen for clients at this address (default [::]:5995 and 0.0.0.0:5995)\n",
        "  --route <node_id>=<host:port>   Dial this TCP address when a client asks for node_id\n",
        "  --dial-timeout <millis>         Give up dialing a node after this long, 0 to wait forever (default 30000)\n",
        "  --handshake-timeout <millis>    Close streams with no dial request after this long, 0 to wait forever (default 15000)\n",
        "\n",
        "Client options:\n",
        "  --client                        Run as a client, relaying stdin and stdout to a node\n",
        "  --connect <address>             Connect to the proxy at this address\n",
        "  --node <node_id>                The node to dial, as server_id.cluster\n",
        "  --tunnel-type <type>            One of node, proxy, app, kube, db or windows_desktop (default node)\n",
    )
}

/// The result of parsing the program's arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentsRequest {
    /// Print the help menu to stdout and exit.
    Help,

    /// Print this program's version to stdout and exit.
    Version,

    /// Run with the provided arguments.
    Run(StartupArguments),
}

/// Specifies the information on how the program should run.
#[derive(Debug, PartialEq)]
pub struct StartupArguments {
    /// Whether to log debug information.
    pub verbose: bool,

    /// Whether to only log errors.
    pub silent: bool,

    /// Whether to run in client or server mode.
    pub startup_mode: StartupMode,
}

impl StartupArguments {
    pub const fn new(verbose: bool, silent: bool, startup_mode: StartupMode) -> Self {
        Self {
            verbose,
            silent,
            startup_mode,
        }
    }
}

/// Specifies whether the program should start in client or server mode.
#[derive(Debug, PartialEq)]
pub enum StartupMode {
    Server(StartServerConfig),
    Client(StartClientConfig),
}

/// A static route from a node id to the TCP address it's reachable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub node_id: String,
    pub target: String,
}

impl Route {
    pub fn new<N: Into<String>, T: Into<String>>(node_id: N, target: T) -> Self {
        Self {
            node_id: node_id.into(),
            target: target.into(),
        }
    }
}

/// Specifies configuration when starting in server mode.
#[derive(Debug, PartialEq)]
pub struct StartServerConfig {
    /// The addresses to listen for clients at. Defaults to every interface on [`DEFAULT_PORT`].
    pub listen_addresses: Vec<SocketAddr>,

    pub routes: Vec<Route>,

    pub session: SessionConfig,
}

impl StartServerConfig {
    pub fn new() -> Self {
        Self {
            listen_addresses: Vec::new(),
            routes: Vec::new(),
            session: SessionConfig::default(),
        }
    }
}

/// Specifies configuration when starting in client mode.
#[derive(Debug, PartialEq)]
pub struct StartClientConfig {
    /// The addresses the proxy may be reached at. The first one to answer is used.
    pub connect_addresses: Vec<SocketAddr>,

    /// The node to dial. Always set once parsing completes.
    pub node_id: String,

    pub tunnel_type: TunnelType,
}

impl StartClientConfig {
    pub const fn new() -> Self {
        Self {
            connect_addresses: Vec::new(),
            node_id: String::new(),
            tunnel_type: TunnelType::Node,
        }
    }
}
