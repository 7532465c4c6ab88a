//! A small SOCKS5 (RFC 1928) proxy server
//!
//! Accepts TCP clients, negotiates the no-authentication SOCKS5 handshake,
//! connects the requested destination and relays bytes in both directions
//! until either side closes. Only CONNECT is supported.

use std::io;

pub use self::{
    config::Config,
    relay::listener::Socks5Server,
};

pub mod config;
pub mod logging;
pub mod monitor;
pub mod net;
pub mod relay;

/// Binds the listener and serves until it fails
pub async fn run_server(config: Config) -> io::Result<()> {
    let server = Socks5Server::bind(&config).await?;
    server.run().await
}
