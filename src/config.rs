//! Server configuration

use std::time::Duration;

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "127.0.0.1";
/// Default listen port
pub const DEFAULT_BIND_PORT: u16 = 8789;
/// Default listen backlog
pub const DEFAULT_BACKLOG: u32 = 256;
/// Default TCP keep-alive idle period for both endpoints
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(60);
/// Default fixed receive buffer size per relay direction
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to listen on; a name resolving to several addresses is tried in
    /// resolution order until one binds
    pub bind_host: String,
    /// Port to listen on
    pub bind_port: u16,
    /// Listen backlog
    pub backlog: u32,
    /// TCP keep-alive idle period for client and upstream endpoints,
    /// `None` disables keep-alive
    pub keepalive: Option<Duration>,
    /// Fixed receive buffer size per relay direction
    pub buffer_size: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bind_host: DEFAULT_BIND_HOST.to_owned(),
            bind_port: DEFAULT_BIND_PORT,
            backlog: DEFAULT_BACKLOG,
            keepalive: Some(DEFAULT_KEEPALIVE),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}
