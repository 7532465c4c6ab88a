//! Socket options for inbound and outbound connections

use std::time::Duration;

/// TCP options applied to both endpoints of a session
#[derive(Debug, Clone, Default)]
pub struct TcpSocketOpts {
    /// `SO_KEEPALIVE`, with `TCP_KEEPIDLE` set to the given idle period.
    /// This is the server's only liveness mechanism; there is no
    /// per-session watchdog.
    pub keepalive: Option<Duration>,
}

/// Options for accepted client connections
#[derive(Debug, Clone, Default)]
pub struct AcceptOpts {
    /// TCP options
    pub tcp: TcpSocketOpts,
}

/// Options for connecting to the requested upstream
#[derive(Debug, Clone, Default)]
pub struct ConnectOpts {
    /// TCP options
    pub tcp: TcpSocketOpts,
}
