//! Network wrappers shared by the listener and the sessions

use std::{io, net::SocketAddr};

use tokio::net::TcpStream;

pub use self::option::{AcceptOpts, ConnectOpts, TcpSocketOpts};

mod option;
mod sys;

/// Connects `addr` and applies the outbound socket options
pub async fn connect_tcp_stream(addr: &SocketAddr, opts: &ConnectOpts) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(addr).await?;
    sys::set_common_sockopts(&stream, &opts.tcp)?;
    Ok(stream)
}

/// Applies the inbound socket options to a freshly accepted stream
pub fn set_accepted_sockopts(stream: &TcpStream, opts: &AcceptOpts) -> io::Result<()> {
    sys::set_common_sockopts(stream, &opts.tcp)
}
