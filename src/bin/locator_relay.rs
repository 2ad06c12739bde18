use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use clap_derive::{Parser, Subcommand};
use locator_relay::datagram::DatagramFormat;
use locator_relay::relay::relay_config::{with_default_port, RelayConfig, DEFAULT_UPSTREAM_ADDR, DEFAULT_UPSTREAM_HOST};
use locator_relay::relay::relay_driver::{run_inspect, Relay};
use tokio::select;
use tracing::{error, info, Level};

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Relays every n-th upstream chunk to all connected downstream clients
    Relay {
        #[clap(long, default_value = DEFAULT_UPSTREAM_ADDR)]
        upstream: String,

        #[clap(long)]
        listen: Option<SocketAddr>,

        #[clap(long)]
        divisor: Option<u32>,
    },
    /// Decodes and logs datagrams of a single format
    Inspect {
        format: DatagramFormat,

        /// host or host:port - the Locator's default port for the format is used if there is none
        #[clap(long, default_value = DEFAULT_UPSTREAM_HOST)]
        upstream: String,
    },
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let result = select! {
        result = run(args.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Relay { upstream, listen, divisor } => {
            let mut config = RelayConfig::new(upstream);
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            if let Some(divisor) = divisor {
                config.decimation_divisor = divisor;
            }

            let relay = Relay::bind(Arc::new(config)).await?;
            relay.run().await
        }
        Command::Inspect { format, upstream } => {
            let upstream = with_default_port(&upstream, format.default_port());
            run_inspect(&RelayConfig::new(upstream), format).await
        }
    }
}
