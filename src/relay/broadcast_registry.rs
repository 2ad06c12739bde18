use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, trace};

use crate::upstream::ChunkSink;


/// The write side of a downstream connection, as far as broadcasting is concerned
#[cfg_attr(test, automock)]
pub trait DownstreamWriter: Send + Sync + 'static {
    /// Writes without waiting, returning [io::ErrorKind::WouldBlock] if the peer can not take
    ///  any data right now. May write only part of the buffer.
    fn try_write(&self, buf: &[u8]) -> io::Result<usize>;
}

impl DownstreamWriter for TcpStream {
    fn try_write(&self, buf: &[u8]) -> io::Result<usize> {
        TcpStream::try_write(self, buf)
    }
}


/// Identifies a downstream client for the lifetime of the registry. Ids are handed out in
///  increasing order, starting from the milliseconds since epoch when the registry was created.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ClientId(pub u64);
impl Debug for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Returned by [BroadcastRegistry::register]. `evicted` completes when the client is no longer
///  part of the registry, either because it was removed or because it was not writable during a
///  broadcast: the connection should be closed then.
pub struct Registration {
    pub id: ClientId,
    pub evicted: oneshot::Receiver<()>,
}

struct DownstreamClient {
    peer_addr: SocketAddr,
    writer: Arc<dyn DownstreamWriter>,
    writable: bool,
    /// dropped together with the entry, completing [Registration::evicted]
    _evicted: oneshot::Sender<()>,
}

/// The set of downstream clients, and fan-out of chunks to all of them.
///
/// There is no buffering per client: a client that can not take a chunk immediately and
///  completely is dropped from the registry rather than retried. All operations take the write
///  lock, so registration and removal are mutually exclusive with a broadcast in progress.
pub struct BroadcastRegistry {
    next_id: AtomicU64,
    clients: RwLock<BTreeMap<ClientId, DownstreamClient>>,
}

impl Debug for BroadcastRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "BroadcastRegistry{{next_id:{}}}", self.next_id.load(Ordering::Relaxed))
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        BroadcastRegistry::new()
    }
}

impl BroadcastRegistry {
    pub fn new() -> BroadcastRegistry {
        let millis_since_epoch = SystemTime::now().duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        BroadcastRegistry {
            next_id: AtomicU64::new(millis_since_epoch),
            clients: Default::default(),
        }
    }

    pub async fn register(&self, peer_addr: SocketAddr, writer: Arc<dyn DownstreamWriter>) -> Registration {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (evicted_send, evicted_recv) = oneshot::channel();

        self.clients.write().await
            .insert(id, DownstreamClient {
                peer_addr,
                writer,
                writable: true,
                _evicted: evicted_send,
            });
        debug!("registered {:?} for {:?}", id, peer_addr);

        Registration {
            id,
            evicted: evicted_recv,
        }
    }

    /// returns `false` if there was no client with this id (e.g. because it was dropped during
    ///  a broadcast already)
    pub async fn remove(&self, id: ClientId) -> bool {
        match self.clients.write().await.remove(&id) {
            Some(client) => {
                debug!("removed {:?} for {:?}", id, client.peer_addr);
                true
            }
            None => false,
        }
    }

    /// Writes `buf` to every writable client, in registration order, and drops every client that
    ///  is not writable. Returns the number of clients that received the chunk.
    pub async fn broadcast(&self, buf: &[u8]) -> usize {
        let mut clients = self.clients.write().await;

        let mut num_delivered = 0;
        for (id, client) in clients.iter_mut() {
            if !client.writable {
                continue;
            }

            match client.writer.try_write(buf) {
                Ok(n) if n == buf.len() => {
                    num_delivered += 1;
                }
                Ok(n) => {
                    debug!("{:?} took only {} of {} bytes", id, n, buf.len());
                    client.writable = false;
                }
                Err(e) => {
                    debug!("{:?} is not writable: {}", id, e);
                    client.writable = false;
                }
            }
        }

        clients.retain(|id, client| {
            if !client.writable {
                debug!("dropping {:?} for {:?}", id, client.peer_addr);
            }
            client.writable
        });

        trace!("broadcast {} bytes to {} clients", buf.len(), num_delivered);
        num_delivered
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    pub async fn client_ids(&self) -> Vec<ClientId> {
        self.clients.read().await.keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChunkSink for BroadcastRegistry {
    async fn on_chunk(&self, chunk: &[u8]) {
        self.broadcast(chunk).await;
    }
}
