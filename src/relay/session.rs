//! Per-client SOCKS5 session
//!
//! One `Session` exists per accepted connection and is driven by read
//! completions on the client endpoint: the greeting and the CONNECT request
//! are accumulated through the embedded incremental parser, the upstream
//! connection is established (with fallback across every resolved address
//! for domain targets), and the two endpoints are then bridged by the
//! bidirectional relay until either side closes.

use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use log::{debug, error, trace, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{lookup_host, TcpStream},
};

use crate::{
    net::connect_tcp_stream,
    relay::{
        copy::relay_bidirectional,
        listener::ServerContext,
        socks5::{self, Address, Error as Socks5Error, HandshakeResponse, Parser, Reply, TcpResponseHeader},
    },
};

/// Session-level state, advanced by client read completions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Awaiting the method identification greeting
    MethodId,
    /// Awaiting the CONNECT request
    Request,
    /// Relaying payload bytes in both directions
    Streaming,
    /// A final reply is in flight; close as soon as it is written
    StreamingEnd,
}

pub struct Session {
    context: Arc<ServerContext>,
    client: TcpStream,
    peer_addr: SocketAddr,
    state: SessionState,
    parser: Parser,
}

impl Session {
    pub fn new(context: Arc<ServerContext>, client: TcpStream, peer_addr: SocketAddr) -> Session {
        Session {
            context,
            client,
            peer_addr,
            state: SessionState::MethodId,
            parser: Parser::new(),
        }
    }

    /// Drives the session to completion. Every termination path funnels
    /// through here exactly once; dropping `self` closes whatever the
    /// explicit shutdowns have not.
    pub async fn run(mut self) -> io::Result<()> {
        let mut upstream = match self.handshake().await? {
            Some(upstream) => upstream,
            // the rejection reply (if any) has been written and the
            // connection shut down
            None => return Ok(()),
        };

        debug_assert_eq!(self.state, SessionState::Streaming);

        match relay_bidirectional(&mut self.client, &mut upstream, self.context.buffer_size()).await {
            Ok((c2u, u2c)) => {
                trace!(
                    "session {} closed, C2U {} bytes, U2C {} bytes",
                    self.peer_addr,
                    c2u,
                    u2c
                );
            }
            Err(err) => {
                trace!("session {} closed with error: {}", self.peer_addr, err);
                self.close(Some(&mut upstream)).await;
            }
        }

        Ok(())
    }

    /// Reads from the client and dispatches on the session state until the
    /// tunnel is established (`Ok(Some(upstream))`) or the session is over.
    async fn handshake(&mut self) -> io::Result<Option<TcpStream>> {
        let mut buf = vec![0u8; self.context.buffer_size()];

        loop {
            let n = match self.client.read(&mut buf).await {
                Ok(n) => n,
                Err(err) => {
                    self.close(None).await;
                    return Err(err);
                }
            };
            if n == 0 {
                // client went away mid-handshake; nothing to reply to
                trace!("handshake early eof, peer: {}", self.peer_addr);
                self.close(None).await;
                return Ok(None);
            }

            match self.state {
                SessionState::MethodId => {
                    if let Err(err) = self.parser.parse_method_identification(&buf[..n]) {
                        error!("method identification failed: {}, peer: {}", err, self.peer_addr);
                        self.close(None).await;
                        return Err(err.into());
                    }
                    if !self.parser.is_finished() {
                        // need more bytes
                        continue;
                    }

                    trace!("socks5 {:?}, peer: {}", self.parser, self.peer_addr);

                    if self.parser.has_auth_method_none() {
                        self.state = SessionState::Request;
                        let resp = HandshakeResponse::new(socks5::SOCKS5_AUTH_METHOD_NONE);
                        if let Err(err) = resp.write_to(&mut self.client).await {
                            self.close(None).await;
                            return Err(err);
                        }
                    } else {
                        warn!("no acceptable authentication method, peer: {}", self.peer_addr);
                        self.state = SessionState::StreamingEnd;
                        let resp = HandshakeResponse::new(socks5::SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE);
                        let _ = resp.write_to(&mut self.client).await;
                        self.close(None).await;
                        return Ok(None);
                    }
                }
                SessionState::Request => {
                    if let Err(err) = self.parser.parse_request(&buf[..n]) {
                        error!("request parsing failed: {}, peer: {}", err, self.peer_addr);
                        return self.reply_error(err.as_reply()).await;
                    }
                    if !self.parser.is_finished() {
                        continue;
                    }

                    let target = match self.parser.address() {
                        Ok(target) => target,
                        Err(err) => {
                            error!("bad destination address: {}, peer: {}", err, self.peer_addr);
                            return self.reply_error(err.as_reply()).await;
                        }
                    };

                    debug!("CONNECT {}, peer: {}", target, self.peer_addr);

                    return match self.connect_upstream(&target).await {
                        Ok(mut upstream) => {
                            self.state = SessionState::Streaming;

                            // Tell the client that we are ready; BND.* is the
                            // proxy's own bound address.
                            let header = TcpResponseHeader::new(
                                Reply::Succeeded,
                                Address::SocketAddress(self.context.bound_addr()),
                            );
                            if let Err(err) = header.write_to(&mut self.client).await {
                                self.close(Some(&mut upstream)).await;
                                return Err(err);
                            }
                            trace!("sent {:?}, peer: {}", header, self.peer_addr);

                            Ok(Some(upstream))
                        }
                        Err(err) => {
                            warn!("CONNECT {} failed: {}, peer: {}", target, err, self.peer_addr);
                            self.reply_error(Socks5Error::from(err).as_reply()).await
                        }
                    };
                }
                state => {
                    // reads are never armed in these states
                    error!("unexpected session state {:?}, peer: {}", state, self.peer_addr);
                    self.close(None).await;
                    return Err(io::Error::other("unexpected session state"));
                }
            }
        }
    }

    /// Connects the destination. Domain targets are resolved and every
    /// address is tried in resolution order; the first successful connect
    /// wins and the last error surfaces if none do.
    async fn connect_upstream(&self, target: &Address) -> io::Result<TcpStream> {
        match *target {
            Address::SocketAddress(ref saddr) => connect_tcp_stream(saddr, self.context.connect_opts()).await,
            Address::DomainNameAddress(ref domain, port) => {
                let mut last_err = None;
                for saddr in lookup_host((domain.as_str(), port)).await? {
                    match connect_tcp_stream(&saddr, self.context.connect_opts()).await {
                        Ok(stream) => {
                            trace!("connected to {} at {}", target, saddr);
                            return Ok(stream);
                        }
                        Err(err) => {
                            warn!("connect {} at {} failed: {}", target, saddr, err);
                            last_err = Some(err);
                        }
                    }
                }
                Err(last_err
                    .unwrap_or_else(|| io::Error::new(ErrorKind::AddrNotAvailable, "resolved to no addresses")))
            }
        }
    }

    /// Sends the canonical error reply `05 REP 00 01 0.. 0..`, then closes.
    /// `StreamingEnd` is sticky: once set the session terminates right after
    /// the write, whatever the write's outcome.
    async fn reply_error(&mut self, reply: Reply) -> io::Result<Option<TcpStream>> {
        self.state = SessionState::StreamingEnd;

        let dummy_address = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0);
        let header = TcpResponseHeader::new(reply, Address::SocketAddress(dummy_address));
        let _ = header.write_to(&mut self.client).await;

        self.close(None).await;
        Ok(None)
    }

    /// Terminal close. Safe to reach from any state: a half that is already
    /// shut down (or gone) just reports an error we do not care about, so
    /// re-entry can never double-close an endpoint.
    async fn close(&mut self, upstream: Option<&mut TcpStream>) {
        trace!("closing session, peer: {}", self.peer_addr);

        let _ = self.client.shutdown().await;
        if let Some(upstream) = upstream {
            let _ = upstream.shutdown().await;
        }
    }
}
