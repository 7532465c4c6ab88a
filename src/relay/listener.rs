//! TCP listener accepting SOCKS5 clients

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use log::{debug, error, info, trace, warn};
use tokio::{
    net::{lookup_host, TcpListener, TcpSocket},
    time,
};

use crate::{
    config::Config,
    net::{self, AcceptOpts, ConnectOpts},
    relay::session::Session,
};

/// Process-wide state shared read-only by every session after startup
pub struct ServerContext {
    /// The address the listener actually bound; every CONNECT success reply
    /// echoes it back to the client as BND.ADDR/BND.PORT
    bound_addr: SocketAddr,
    buffer_size: usize,
    accept_opts: AcceptOpts,
    connect_opts: ConnectOpts,
}

impl ServerContext {
    pub fn bound_addr(&self) -> SocketAddr {
        self.bound_addr
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn accept_opts(&self) -> &AcceptOpts {
        &self.accept_opts
    }

    pub fn connect_opts(&self) -> &ConnectOpts {
        &self.connect_opts
    }
}

/// A bound SOCKS5 server, ready to accept
pub struct Socks5Server {
    context: Arc<ServerContext>,
    listener: TcpListener,
}

impl Socks5Server {
    /// Resolves the configured bind host and listens on the first resolved
    /// address that accepts bind+listen. Resolution failure or running out
    /// of candidate addresses is fatal to the caller.
    pub async fn bind(config: &Config) -> io::Result<Socks5Server> {
        let addrs = lookup_host((config.bind_host.as_str(), config.bind_port)).await?;

        let mut listener = None;
        let mut last_err = None;
        for addr in addrs {
            match create_listener(&addr, config.backlog) {
                Ok(l) => {
                    listener = Some(l);
                    break;
                }
                Err(err) => {
                    warn!("listening on {} failed: {}", addr, err);
                    last_err = Some(err);
                }
            }
        }

        let listener = match listener {
            Some(l) => l,
            None => {
                return Err(last_err.unwrap_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::AddrNotAvailable,
                        format!("{} resolved to no addresses", config.bind_host),
                    )
                }));
            }
        };

        let bound_addr = listener.local_addr()?;
        info!("socks5 server listening on {}", bound_addr);

        let context = ServerContext {
            bound_addr,
            buffer_size: config.buffer_size,
            accept_opts: AcceptOpts {
                tcp: net::TcpSocketOpts {
                    keepalive: config.keepalive,
                },
            },
            connect_opts: ConnectOpts {
                tcp: net::TcpSocketOpts {
                    keepalive: config.keepalive,
                },
            },
        };

        Ok(Socks5Server {
            context: Arc::new(context),
            listener,
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.context.bound_addr
    }

    /// Accepts clients forever, one spawned session per connection
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(s) => s,
                Err(err) => {
                    error!("accept failed: {}", err);

                    // the process-level fd limit may be exhausted; back off
                    // instead of spinning on the same error
                    time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            trace!("accepted connection, peer: {}", peer_addr);

            if let Err(err) = net::set_accepted_sockopts(&stream, &self.context.accept_opts) {
                error!("failed to set socket options: {}, peer: {}", err, peer_addr);
                // dropping the stream closes the session immediately
                continue;
            }

            let session = Session::new(self.context.clone(), stream, peer_addr);
            tokio::spawn(async move {
                if let Err(err) = session.run().await {
                    if err.kind() != io::ErrorKind::BrokenPipe {
                        debug!("session {} failed: {}", peer_addr, err);
                    }
                }
            });
        }
    }
}

fn create_listener(addr: &SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(..) => TcpSocket::new_v4()?,
        SocketAddr::V6(..) => TcpSocket::new_v6()?,
    };

    socket.set_reuseaddr(true)?;
    socket.bind(*addr)?;
    socket.listen(backlog)
}
