//! Service launcher

use std::{process::ExitCode, time::Duration};

use clap::{value_parser, Arg, ArgAction, Command};
use futures::future::{self, Either};
use log::error;
use tokio::runtime::Builder;

use socks5d::{logging, monitor, Config};

/// Defines command line options
fn define_command_line_options(app: Command) -> Command {
    app.arg(
        Arg::new("BIND_HOST")
            .short('b')
            .long("bind-host")
            .num_args(1)
            .action(ArgAction::Set)
            .help("Host to listen on, default 127.0.0.1"),
    )
    .arg(
        Arg::new("BIND_PORT")
            .short('p')
            .long("port")
            .num_args(1)
            .action(ArgAction::Set)
            .value_parser(value_parser!(u16))
            .help("Port to listen on, default 8789"),
    )
    .arg(
        Arg::new("BACKLOG")
            .long("backlog")
            .num_args(1)
            .action(ArgAction::Set)
            .value_parser(value_parser!(u32))
            .help("Listen backlog, default 256"),
    )
    .arg(
        Arg::new("KEEPALIVE")
            .long("keepalive")
            .num_args(1)
            .action(ArgAction::Set)
            .value_parser(value_parser!(u64))
            .help("TCP keep-alive idle seconds on both endpoints, default 60, 0 disables"),
    )
    .arg(
        Arg::new("BUFFER_SIZE")
            .long("buffer-size")
            .num_args(1)
            .action(ArgAction::Set)
            .value_parser(value_parser!(u32).range(1..))
            .help("Receive buffer size per relay direction in bytes, default 2048"),
    )
    .arg(
        Arg::new("VERBOSE")
            .short('v')
            .action(ArgAction::Count)
            .help("Verbose mode, repeat for more detailed log"),
    )
    .arg(
        Arg::new("LOG_WITHOUT_TIME")
            .long("log-without-time")
            .action(ArgAction::SetTrue)
            .help("Log without datetime prefix"),
    )
}

fn main() -> ExitCode {
    let mut app = Command::new("socks5d")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A small SOCKS5 (RFC 1928) proxy server");
    app = define_command_line_options(app);

    let matches = app.get_matches();

    logging::init("socks5d", matches.get_count("VERBOSE"), matches.get_flag("LOG_WITHOUT_TIME"));

    let mut config = Config::default();
    if let Some(host) = matches.get_one::<String>("BIND_HOST") {
        config.bind_host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("BIND_PORT") {
        config.bind_port = *port;
    }
    if let Some(backlog) = matches.get_one::<u32>("BACKLOG") {
        config.backlog = *backlog;
    }
    if let Some(secs) = matches.get_one::<u64>("KEEPALIVE") {
        config.keepalive = if *secs == 0 {
            None
        } else {
            Some(Duration::from_secs(*secs))
        };
    }
    if let Some(size) = matches.get_one::<u32>("BUFFER_SIZE") {
        config.buffer_size = *size as usize;
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("create tokio Runtime");

    runtime.block_on(async move {
        let server = Box::pin(socks5d::run_server(config));
        let monitor = Box::pin(monitor::create_signal_monitor());

        match future::select(server, monitor).await {
            Either::Left((Err(err), ..)) => {
                error!("server exited unexpectedly: {}", err);
                ExitCode::FAILURE
            }
            // the accept loop never resolves on its own; reaching here means
            // a shutdown signal arrived
            Either::Left((Ok(..), ..)) | Either::Right(..) => ExitCode::SUCCESS,
        }
    })
}
