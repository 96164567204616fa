//! Addressed message relay over WebSockets.
//!
//! Clients hold a WebSocket open at `/ws/{identity}` to receive messages and
//! submit messages for others with `POST /send-message`. Submission and
//! delivery are decoupled: a submission is always acknowledged, and the text
//! is pushed only if the receiver is connected at that moment.
//!
//! - [`registry`] maps identities to live push channels and performs the
//!   single delivery attempt for each message.
//! - [`server`] exposes the HTTP and WebSocket routes on top of the registry.
//! - [`session`] owns one WebSocket connection for its whole lifetime.
//! - [`message`] holds the JSON submission and acknowledgment bodies.
//! - [`client`] is a terminal client plus a one-shot submitter.
//! - [`cli`] parses the command-line interface.

pub mod cli;
pub mod client;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
