use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use websocket_relay::{
    cli::{Cli, Command, ServeArgs},
    client,
    server::RelayServer,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Binds the listener and serves until ctrl-c.
///
/// The banner ends with the bound address so scripts can pick up an
/// ephemeral port.
async fn serve(args: ServeArgs) -> Result<()> {
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let server = RelayServer::new(listener);
    info!("relay listening on {}", server.local_addr()?);

    server.run_until_ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Client(args) => client::run(args).await,
        Command::Send(args) => client::send_once(args).await,
    }
}
