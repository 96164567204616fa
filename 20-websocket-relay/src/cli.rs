use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server: WebSocket delivery plus the HTTP submission endpoint.
    Serve(ServeArgs),
    /// Connect to a relay, print incoming messages and send stdin lines.
    Client(ClientArgs),
    /// Submit a single message and exit.
    Send(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Identity to register under. A random one is generated when omitted.
    #[arg(long)]
    pub identity: Option<String>,

    /// Identity that typed lines are addressed to. Change it later with `/to NAME`.
    #[arg(long)]
    pub to: Option<String>,

    /// Address of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub server: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[arg(long)]
    pub sender: String,

    #[arg(long)]
    pub receiver: String,

    #[arg(long)]
    pub message: String,

    /// Address of the relay to submit to.
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub server: SocketAddr,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults_to_port_8000() {
        let cli = Cli::try_parse_from(["websocket_relay", "serve"]).expect("parse");
        match cli.command {
            Command::Serve(args) => assert_eq!(args.listen.port(), 8000),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn client_identity_is_optional() {
        let cli = Cli::try_parse_from(["websocket_relay", "client", "--to", "bob"]).expect("parse");
        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.identity, None);
                assert_eq!(args.to.as_deref(), Some("bob"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
