use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{info, trace, warn};

use crate::relay::relay_config::RelayConfig;
use crate::upstream::upstream_state::{UpstreamAction, UpstreamEvent, UpstreamState, UpstreamStateMachine};
use crate::upstream::ChunkSink;


pub type UpstreamStream = Box<dyn AsyncRead + Send + Unpin>;

/// Establishes the byte stream to the upstream source. Separated from [UpstreamConnection] so the
///  reconnect logic does not depend on actual TCP.
#[async_trait]
pub trait UpstreamConnector: Sync + Send + 'static {
    async fn connect(&self) -> anyhow::Result<UpstreamStream>;
}

pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}
impl TcpConnector {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> TcpConnector {
        TcpConnector {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl UpstreamConnector for TcpConnector {
    async fn connect(&self) -> anyhow::Result<UpstreamStream> {
        match time::timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => {
                info!("connected to {}", self.addr);
                Ok(Box::new(stream))
            }
            Ok(Err(e)) => Err(anyhow!("connecting to {}: {}", self.addr, e)),
            Err(_) => Err(anyhow!("connecting to {}: no response after {:?}", self.addr, self.connect_timeout)),
        }
    }
}


/// Owns the single connection to the upstream source, passing everything it reads to a
///  [ChunkSink] and reconnecting after a fixed delay whenever the connection fails or ends.
///
/// The lifecycle is driven by an [UpstreamStateMachine]: connection attempts and the reconnect
///  timer run as tasks that report back through an event queue, and the state machine decides
///  what happens next.
pub struct UpstreamConnection {
    connector: Arc<dyn UpstreamConnector>,
    reconnect_delay: Duration,
    read_buffer_size: usize,
    state: watch::Sender<UpstreamState>,
}

impl Debug for UpstreamConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UpstreamConnection{{state:{:?}}}", *self.state.borrow())
    }
}

impl UpstreamConnection {
    pub fn new(config: &RelayConfig) -> UpstreamConnection {
        let connector = TcpConnector::new(config.upstream_addr.clone(), config.connect_timeout);
        Self::with_connector(Arc::new(connector), config.reconnect_delay, config.read_buffer_size)
    }

    pub fn with_connector(connector: Arc<dyn UpstreamConnector>, reconnect_delay: Duration, read_buffer_size: usize) -> UpstreamConnection {
        UpstreamConnection {
            connector,
            reconnect_delay,
            read_buffer_size: read_buffer_size.max(1),
            state: watch::Sender::new(UpstreamState::Disconnected),
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<UpstreamState> {
        self.state.subscribe()
    }

    /// Runs until the returned future is dropped; connection problems are logged and retried,
    ///  they never terminate the loop.
    pub async fn run(&self, sink: Arc<dyn ChunkSink>) -> anyhow::Result<()> {
        let (event_send, mut event_recv) = mpsc::unbounded_channel();
        let mut state_machine = UpstreamStateMachine::new(self.reconnect_delay);
        let mut tasks = UpstreamTasks::default();

        event_send.send(UpstreamEvent::Start)?;

        while let Some(event) = event_recv.recv().await {
            match &event {
                UpstreamEvent::ConnectFailed(reason) => warn!("upstream connection failed: {} - retrying in {:?}", reason, self.reconnect_delay),
                UpstreamEvent::StreamEnded(reason) => warn!("upstream connection ended: {} - reconnecting in {:?}", reason, self.reconnect_delay),
                _ => trace!("upstream event {:?}", event),
            }

            for action in state_machine.on_event(event) {
                match action {
                    UpstreamAction::Connect => {
                        tasks.replace_connection(tokio::spawn(connect_and_read(
                            self.connector.clone(),
                            self.read_buffer_size,
                            sink.clone(),
                            event_send.clone(),
                        )));
                    }
                    UpstreamAction::ScheduleReconnect(delay) => {
                        let event_send = event_send.clone();
                        tasks.replace_reconnect_timer(tokio::spawn(async move {
                            time::sleep(delay).await;
                            let _ = event_send.send(UpstreamEvent::ReconnectTimerFired);
                        }));
                    }
                    UpstreamAction::CancelReconnect => {
                        tasks.cancel_reconnect_timer();
                    }
                }
            }

            self.state.send_replace(state_machine.state());
        }

        // we hold a sender ourselves, so the queue does not close
        Err(anyhow!("upstream event queue closed"))
    }
}


/// Handles of the tasks spawned on behalf of [UpstreamConnection::run], aborted when the run
///  loop is dropped
#[derive(Default)]
struct UpstreamTasks {
    connection: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}
impl UpstreamTasks {
    fn replace_connection(&mut self, handle: JoinHandle<()>) {
        // the previous connection task reported its end before a new connection is started
        if let Some(prev) = self.connection.replace(handle) {
            prev.abort();
        }
    }

    fn replace_reconnect_timer(&mut self, handle: JoinHandle<()>) {
        if let Some(prev) = self.reconnect_timer.replace(handle) {
            prev.abort();
        }
    }

    fn cancel_reconnect_timer(&mut self) {
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
    }
}
impl Drop for UpstreamTasks {
    fn drop(&mut self) {
        self.cancel_reconnect_timer();
        if let Some(handle) = self.connection.take() {
            handle.abort();
        }
    }
}


async fn connect_and_read(connector: Arc<dyn UpstreamConnector>, read_buffer_size: usize, sink: Arc<dyn ChunkSink>, events: mpsc::UnboundedSender<UpstreamEvent>) {
    let mut stream = match connector.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            let _ = events.send(UpstreamEvent::ConnectFailed(e.to_string()));
            return;
        }
    };
    let _ = events.send(UpstreamEvent::ConnectSucceeded);

    let reason = match read_loop(&mut stream, read_buffer_size, sink.as_ref()).await {
        Ok(()) => "closed by peer".to_string(),
        Err(e) => e.to_string(),
    };
    let _ = events.send(UpstreamEvent::StreamEnded(reason));
}

async fn read_loop(stream: &mut UpstreamStream, read_buffer_size: usize, sink: &dyn ChunkSink) -> anyhow::Result<()> {
    let mut buf = vec![0u8; read_buffer_size];
    loop {
        let num_read = stream.read(&mut buf).await?;
        if num_read == 0 {
            return Ok(());
        }
        trace!("received {} bytes from upstream", num_read);
        sink.on_chunk(&buf[..num_read]).await;
    }
}
