//! Platform socket option plumbing

use std::io;

use cfg_if::cfg_if;
use tokio::net::TcpStream;

use super::TcpSocketOpts;

cfg_if! {
    if #[cfg(unix)] {
        pub fn set_common_sockopts(stream: &TcpStream, opts: &TcpSocketOpts) -> io::Result<()> {
            use socket2::{Socket, TcpKeepalive};
            use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};

            let socket = unsafe { Socket::from_raw_fd(stream.as_raw_fd()) };

            macro_rules! try_sockopt {
                ($socket:ident . $func:ident ($($arg:expr),*)) => {
                    match $socket . $func ($($arg),*) {
                        Ok(e) => e,
                        Err(err) => {
                            let _ = socket.into_raw_fd();
                            return Err(err);
                        }
                    }
                };
            }

            if let Some(keepalive_duration) = opts.keepalive {
                #[allow(unused_mut)]
                let mut keepalive = TcpKeepalive::new().with_time(keepalive_duration);

                #[cfg(any(
                    target_os = "freebsd",
                    target_os = "fuchsia",
                    target_os = "linux",
                    target_os = "netbsd",
                    target_vendor = "apple",
                ))]
                {
                    keepalive = keepalive.with_interval(keepalive_duration);
                }

                try_sockopt!(socket.set_tcp_keepalive(&keepalive));
            }

            let _ = socket.into_raw_fd();
            Ok(())
        }
    } else if #[cfg(windows)] {
        pub fn set_common_sockopts(stream: &TcpStream, opts: &TcpSocketOpts) -> io::Result<()> {
            use socket2::{Socket, TcpKeepalive};
            use std::os::windows::io::{AsRawSocket, FromRawSocket, IntoRawSocket};

            let socket = unsafe { Socket::from_raw_socket(stream.as_raw_socket()) };

            macro_rules! try_sockopt {
                ($socket:ident . $func:ident ($($arg:expr),*)) => {
                    match $socket . $func ($($arg),*) {
                        Ok(e) => e,
                        Err(err) => {
                            let _ = socket.into_raw_socket();
                            return Err(err);
                        }
                    }
                };
            }

            if let Some(keepalive_duration) = opts.keepalive {
                let keepalive = TcpKeepalive::new()
                    .with_time(keepalive_duration)
                    .with_interval(keepalive_duration);
                try_sockopt!(socket.set_tcp_keepalive(&keepalive));
            }

            let _ = socket.into_raw_socket();
            Ok(())
        }
    } else {
        pub fn set_common_sockopts(_: &TcpStream, _: &TcpSocketOpts) -> io::Result<()> {
            Ok(())
        }
    }
}
