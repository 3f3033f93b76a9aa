// CLI entry point for the robot control server.
//
// Starts the listener and serves robots until the process is killed. See
// `server.rs` for the networking architecture and `session.rs` for the
// dialogue itself.
//
// Usage:
//   robot-server [PORT] [--bind ADDR] [--config FILE]
//
// Command-line values override the config file. Set `RUST_LOG` to change
// log verbosity (default `info`).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use robot_control_server::config::ServerConfig;
use robot_control_server::{logging, start_server};
use tracing::error;

/// Robot control server: login, navigation to the origin, secret retrieval.
#[derive(Parser, Debug)]
#[command(name = "robot-server", version, about)]
struct Args {
    /// Listen port (default: 3999)
    port: Option<u16>,

    /// Address to bind (default: 0.0.0.0)
    #[arg(long)]
    bind: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init();

    let mut config = match &args.config {
        Some(path) => match ServerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    let (handle, _addr) = match start_server(&config) {
        Ok(started) => started,
        Err(e) => {
            error!(
                bind = %config.bind_address,
                port = config.port,
                "failed to start server: {e}"
            );
            return ExitCode::FAILURE;
        }
    };

    handle.wait();
    ExitCode::SUCCESS
}
