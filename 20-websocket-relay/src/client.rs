use std::net::SocketAddr;

use anyhow::{Context, Result, anyhow};
use futures_util::StreamExt;
use reqwest::Url;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::{
    cli::{ClientArgs, SendArgs},
    message::{SendMessageRequest, SendMessageResponse},
};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct ClientSession {
    identity: String,
    target: Option<String>,
    server: SocketAddr,
    http: reqwest::Client,
}

pub async fn run(args: ClientArgs) -> Result<()> {
    let identity = args.identity.unwrap_or_else(|| nanoid::nanoid!(8));
    let mut socket = establish_connection(args.server, &identity).await?;
    write_stdout(&format!("*** connected as {identity}")).await?;

    let mut session = ClientSession {
        identity,
        target: args.to,
        server: args.server,
        http: reqwest::Client::new(),
    };
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    run_client_loop(&mut socket, &mut stdin, &mut input, &mut session).await?;
    shutdown_connection(&mut socket).await;

    Ok(())
}

/// Submits one message and prints the relay's acknowledgment.
pub async fn send_once(args: SendArgs) -> Result<()> {
    let request = SendMessageRequest {
        sender: args.sender,
        receiver: args.receiver,
        message: args.message,
    };
    let response = submit(&reqwest::Client::new(), args.server, &request).await?;
    write_stdout(&response.status).await?;
    Ok(())
}

pub async fn submit(
    http: &reqwest::Client,
    server: SocketAddr,
    request: &SendMessageRequest,
) -> Result<SendMessageResponse> {
    let url = format!("http://{server}/send-message");
    let response = http
        .post(&url)
        .json(request)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()?
        .json::<SendMessageResponse>()
        .await
        .context("invalid acknowledgment from relay")?;
    Ok(response)
}

/// WebSocket URL for `identity`, percent-encoded as a single path segment.
pub fn session_url(server: SocketAddr, identity: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("ws://{server}/ws/"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow!("relay url cannot carry a path"))?
        .pop_if_empty()
        .push(identity);
    Ok(url)
}

async fn establish_connection(server: SocketAddr, identity: &str) -> Result<RelaySocket> {
    let url = session_url(server, identity)?;
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;

    info!("connected to {}", server);
    Ok(socket)
}

async fn run_client_loop(
    socket: &mut RelaySocket,
    stdin: &mut BufReader<tokio::io::Stdin>,
    input: &mut String,
    session: &mut ClientSession,
) -> Result<()> {
    loop {
        input.clear();
        select! {
            server_message = socket.next() => {
                if !handle_server_message(server_message).await? {
                    break;
                }
            }
            bytes_read = stdin.read_line(input) => {
                if !handle_stdin_input(bytes_read, input, session).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                handle_ctrl_c(ctrl_c);
                break;
            }
        }
    }
    Ok(())
}

async fn handle_server_message(
    message: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
) -> Result<bool> {
    match message.transpose()? {
        Some(Message::Text(text)) => {
            write_stdout(&text).await?;
            Ok(true)
        }
        Some(Message::Close(_)) | None => {
            write_stdout("*** server closed the connection").await?;
            Ok(false)
        }
        Some(_) => Ok(true),
    }
}

async fn handle_stdin_input(
    bytes_read: io::Result<usize>,
    input: &str,
    session: &mut ClientSession,
) -> Result<bool> {
    let bytes_read = bytes_read?;
    if bytes_read == 0 {
        return Ok(false);
    }

    let text = input.trim_end();
    if text.is_empty() {
        return Ok(true);
    }

    if text.eq_ignore_ascii_case("/quit") {
        write_stdout("*** leaving relay").await?;
        return Ok(false);
    }

    if let Some(target) = text.strip_prefix("/to ") {
        let target = target.trim();
        if target.is_empty() {
            write_stderr("!!! usage: /to NAME").await?;
        } else {
            write_stdout(&format!("*** sending to {target}")).await?;
            session.target = Some(target.to_string());
        }
        return Ok(true);
    }

    let Some(receiver) = session.target.clone() else {
        write_stderr("!!! no recipient selected; use /to NAME").await?;
        return Ok(true);
    };

    let request = SendMessageRequest {
        sender: session.identity.clone(),
        receiver,
        message: text.to_string(),
    };
    if let Err(err) = submit(&session.http, session.server, &request).await {
        write_stderr(&format!("!!! failed to send: {err:#}")).await?;
    }
    Ok(true)
}

fn handle_ctrl_c(result: io::Result<()>) {
    if let Err(error) = result {
        warn!(?error, "ctrl-c handler failed");
    }
}

async fn shutdown_connection(socket: &mut RelaySocket) {
    if let Err(error) = socket.close(None).await {
        warn!(?error, "failed to close websocket cleanly");
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> SocketAddr {
        "127.0.0.1:8000".parse().expect("socket address")
    }

    #[test]
    fn plain_identity_is_left_alone() {
        let url = session_url(server(), "alice").expect("url");
        assert_eq!(url.as_str(), "ws://127.0.0.1:8000/ws/alice");
    }

    #[test]
    fn reserved_characters_stay_inside_the_segment() {
        let url = session_url(server(), "alice?x#y/z w").expect("url");
        assert_eq!(url.path(), "/ws/alice%3Fx%23y%2Fz%20w");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }
}
