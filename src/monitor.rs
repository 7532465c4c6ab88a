//! Signal monitor

use std::io;

use cfg_if::cfg_if;
use log::info;

cfg_if! {
    if #[cfg(unix)] {
        /// Resolves when the process receives SIGTERM or SIGINT
        pub async fn create_signal_monitor() -> io::Result<()> {
            use futures::future::{self, Either};
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            let signal_name = {
                let sigterm_fut = Box::pin(sigterm.recv());
                let sigint_fut = Box::pin(sigint.recv());
                match future::select(sigterm_fut, sigint_fut).await {
                    Either::Left(..) => "SIGTERM",
                    Either::Right(..) => "SIGINT",
                }
            };

            info!("received {}, exiting", signal_name);

            Ok(())
        }
    } else {
        /// Resolves when the process receives CTRL-C
        pub async fn create_signal_monitor() -> io::Result<()> {
            tokio::signal::ctrl_c().await?;

            info!("received CTRL-C, exiting");

            Ok(())
        }
    }
}
