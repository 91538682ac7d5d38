use std::{env, io, pin::pin, process::exit, rc::Rc};

use args::{ArgumentsRequest, StartClientConfig, StartServerConfig, StartupArguments, StartupMode};
use tokio::{select, task::LocalSet};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    connect::{bind_server_endpoints, connect_client},
    dialer::StaticRouteDialer,
    service::{run_server, ProxyService},
    shutdown::ShutdownTrigger,
};

mod args;
mod client;
mod connect;
mod dialer;
mod endpoint;
mod error;
mod service;
mod session;
mod shutdown;
mod utils;

#[cfg(test)]
mod test_utils;

fn main() {
    let arguments = match args::parse_arguments(env::args()) {
        Err(err) => {
            eprintln!("{err}\n\nType 'dial-proxy --help' for a help menu");
            exit(1);
        }
        Ok(arguments) => arguments,
    };

    let startup_args = match arguments {
        ArgumentsRequest::Version => {
            println!("{}", args::get_version_string());
            return;
        }
        ArgumentsRequest::Help => {
            println!("{}", args::get_help_string());
            return;
        }
        ArgumentsRequest::Run(startup_args) => startup_args,
    };

    init_tracing(&startup_args);

    let runtime_result = tokio::runtime::Builder::new_current_thread().enable_all().build();

    let result = match runtime_result {
        Ok(runtime) => LocalSet::new().block_on(&runtime, async_main(startup_args)),
        Err(err) => {
            eprintln!("Failed to start Tokio runtime: {err}");
            exit(1);
        }
    };

    if let Err(error) = result {
        eprintln!("Program finished with error: {error}");
        exit(1);
    }
}

/// Logs go to stderr, since in client mode stdout carries the node's data.
fn init_tracing(startup_args: &StartupArguments) {
    let default_level = match (startup_args.silent, startup_args.verbose) {
        (true, _) => "error",
        (false, true) => "debug",
        (false, false) => "info",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

async fn async_main(startup_args: StartupArguments) -> io::Result<()> {
    match startup_args.startup_mode {
        StartupMode::Client(client_config) => run_client_mode(client_config).await,
        StartupMode::Server(server_config) => run_server_mode(server_config).await,
    }
}

async fn run_client_mode(client_config: StartClientConfig) -> io::Result<()> {
    let (endpoint, connection) = connect_client(&client_config.connect_addresses).await?;
    let result = client::run_client(connection, client_config).await;
    endpoint.wait_idle().await;
    result
}

async fn run_server_mode(server_config: StartServerConfig) -> io::Result<()> {
    let endpoints = bind_server_endpoints(&server_config.listen_addresses)?;

    let dialer: StaticRouteDialer = server_config.routes.into_iter().map(|r| (r.node_id, r.target)).collect();
    if dialer.is_empty() {
        warn!("No routes configured, every dial will fail with not found");
    } else {
        info!(routes = dialer.len(), "Loaded static routes");
    }

    let trigger = ShutdownTrigger::new();
    let service = Rc::new(ProxyService::new(dialer, server_config.session, trigger.signal()));

    let handles = endpoints
        .into_iter()
        .map(|endpoint| tokio::task::spawn_local(run_server(endpoint, Rc::clone(&service))))
        .collect();

    let mut servers = pin!(utils::join_all(handles));
    select! {
        _ = &mut servers => return Ok(()),
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                warn!(%error, "Failed to listen for Ctrl-C, the proxy can't be shut down gracefully");
                servers.await;
                return Ok(());
            }
        }
    }

    info!("Shutting down");
    trigger.trigger();
    servers.await;
    Ok(())
}
