use std::net::SocketAddr;
use std::sync::Arc;

use tokio::select;
use tracing::info;

use crate::datagram::DatagramFormat;
use crate::relay::broadcast_registry::BroadcastRegistry;
use crate::relay::decimation_gate::DecimationGate;
use crate::relay::decoding_sink::DecodingSink;
use crate::relay::downstream_listener::DownstreamListener;
use crate::relay::relay_config::RelayConfig;
use crate::upstream::upstream_connection::UpstreamConnection;


/// Upstream connection -> decimation gate -> broadcast registry, plus the listener that feeds the
///  registry with downstream clients.
pub struct Relay {
    config: Arc<RelayConfig>,
    registry: Arc<BroadcastRegistry>,
    listener: DownstreamListener,
    upstream: UpstreamConnection,
}

impl Relay {
    /// binds the downstream listener, failing if that is not possible
    pub async fn bind(config: Arc<RelayConfig>) -> anyhow::Result<Relay> {
        let registry = Arc::new(BroadcastRegistry::new());
        let listener = DownstreamListener::bind(config.listen_addr, registry.clone()).await?;
        let upstream = UpstreamConnection::new(&config);

        Ok(Relay {
            config,
            registry,
            listener,
            upstream,
        })
    }

    pub fn downstream_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let gate = Arc::new(DecimationGate::new(self.config.decimation_divisor, self.registry.clone())?);
        info!("relaying every {}. chunk from {} to downstream clients", self.config.decimation_divisor, self.config.upstream_addr);

        select! {
            result = self.listener.accept_loop() => result,
            result = self.upstream.run(gate) => result,
        }
    }
}

/// Connects to upstream and logs every chunk decoded as `format`
pub async fn run_inspect(config: &RelayConfig, format: DatagramFormat) -> anyhow::Result<()> {
    info!("decoding {} datagrams from {}", format, config.upstream_addr);

    let upstream = UpstreamConnection::new(config);
    upstream.run(Arc::new(DecodingSink::new(format))).await
}
