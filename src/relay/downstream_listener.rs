use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::select;
use tokio::sync::oneshot;
use tokio::time;
use tracing::{debug, info, warn};

use crate::relay::broadcast_registry::{BroadcastRegistry, ClientId};


const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts downstream connections and registers them with a [BroadcastRegistry]. Every accepted
///  connection is registered, there is no authentication or limit.
pub struct DownstreamListener {
    listener: TcpListener,
    registry: Arc<BroadcastRegistry>,
}

impl DownstreamListener {
    /// Failure to bind is the one error that is not recovered from: it is meant to abort startup.
    pub async fn bind(addr: SocketAddr, registry: Arc<BroadcastRegistry>) -> anyhow::Result<DownstreamListener> {
        let listener = bind_reusable(addr)
            .with_context(|| format!("binding downstream listener to {}", addr))?;
        info!("listening for downstream clients on {}", listener.local_addr()?);

        Ok(DownstreamListener {
            listener,
            registry,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept_loop(&self) -> anyhow::Result<()> {
        loop {
            let (stream, peer_addr) = accept_retrying(|| self.listener.accept(), ACCEPT_ERROR_BACKOFF).await;
            info!("downstream client connected from {}", peer_addr);

            let stream = Arc::new(stream);
            let registration = self.registry.register(peer_addr, stream.clone()).await;
            tokio::spawn(watch_client(stream, peer_addr, registration.id, registration.evicted, self.registry.clone()));
        }
    }
}

/// Errors from `accept` (e.g. running out of file descriptors) do not affect existing clients. They
///  tend to persist for a while though, so the next attempt is delayed.
async fn accept_retrying<F, Fut, T>(mut accept: F, backoff: Duration) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("error accepting downstream connection: {} - retrying in {:?}", e, backoff);
                time::sleep(backoff).await;
            }
        }
    }
}

fn bind_reusable(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Waits for a downstream client to go away, or to be evicted from the registry. Data sent by the
///  client is discarded.
async fn watch_client(stream: Arc<TcpStream>, peer_addr: SocketAddr, id: ClientId, mut evicted: oneshot::Receiver<()>, registry: Arc<BroadcastRegistry>) {
    let mut buf = [0u8; 1024];
    loop {
        select! {
            _ = &mut evicted => {
                debug!("{:?} was evicted - closing connection to {}", id, peer_addr);
                return;
            }
            readable = stream.readable() => {
                if let Err(e) = readable {
                    debug!("{:?}: {}", id, e);
                    break;
                }
                match stream.try_read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => debug!("{:?} sent {} bytes - ignoring", id, n),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!("{:?}: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    info!("downstream client {} disconnected", peer_addr);
    registry.remove(id).await;
}


#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::Instant;

    use super::*;

    async fn wait_for_len(registry: &BroadcastRegistry, len: usize) {
        time::timeout(Duration::from_secs(5), async {
            while registry.len().await != len {
                time::sleep(Duration::from_millis(10)).await;
            }
        }).await.unwrap();
    }

    async fn start_listener() -> (Arc<BroadcastRegistry>, SocketAddr, tokio::task::JoinHandle<anyhow::Result<()>>) {
        let registry = Arc::new(BroadcastRegistry::new());
        let listener = DownstreamListener::bind("127.0.0.1:0".parse().unwrap(), registry.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move { listener.accept_loop().await });
        (registry, addr, handle)
    }

    #[tokio::test]
    async fn test_clients_receive_broadcast() {
        let (registry, addr, handle) = start_listener().await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 2).await;

        assert_eq!(registry.broadcast(b"hello").await, 2);

        for client in [&mut a, &mut b] {
            let mut buf = [0u8; 5];
            time::timeout(Duration::from_secs(5), client.read_exact(&mut buf)).await.unwrap().unwrap();
            assert_eq!(&buf, b"hello");
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_client_close_removes_registration() {
        let (registry, addr, handle) = start_listener().await;

        let a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 2).await;

        // data sent by clients is ignored
        b.write_all(b"ignored").await.unwrap();

        drop(a);
        wait_for_len(&registry, 1).await;

        assert_eq!(registry.broadcast(b"x").await, 1);
        let mut buf = [0u8; 1];
        time::timeout(Duration::from_secs(5), b.read_exact(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf, b"x");

        handle.abort();
    }

    #[tokio::test]
    async fn test_evicted_client_is_disconnected() {
        let (registry, addr, handle) = start_listener().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        wait_for_len(&registry, 1).await;

        let id = registry.client_ids().await[0];
        assert!(registry.remove(id).await);

        let mut buf = [0u8; 16];
        let num_read = time::timeout(Duration::from_secs(5), client.read(&mut buf)).await.unwrap();
        // orderly close or reset, depending on timing
        assert!(matches!(num_read, Ok(0) | Err(_)));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_errors_are_retried_after_backoff() {
        let start = Instant::now();
        let mut attempts = Vec::new();

        let accepted = accept_retrying(|| {
            attempts.push(start.elapsed());
            let result = if attempts.len() <= 3 {
                Err(io::Error::from_raw_os_error(24)) // EMFILE
            }
            else {
                Ok(attempts.len())
            };
            std::future::ready(result)
        }, ACCEPT_ERROR_BACKOFF).await;

        assert_eq!(accepted, 4);
        assert_eq!(attempts, vec![
            Duration::ZERO,
            ACCEPT_ERROR_BACKOFF,
            2*ACCEPT_ERROR_BACKOFF,
            3*ACCEPT_ERROR_BACKOFF,
        ]);
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let result = DownstreamListener::bind(addr, Arc::new(BroadcastRegistry::new())).await;
        let e = result.err().unwrap();
        assert!(e.to_string().contains(&addr.to_string()), "{}", e);
    }
}
