pub mod upstream_connection;
pub mod upstream_state;


/// This trait decouples the upstream connection (which only reads raw bytes) from what is done
///  with those bytes: decoding them for inspection, or decimating and relaying them.
///
/// Chunks are passed in exactly the order they were received, and the next chunk is not passed
///  before the previous call returned.
#[async_trait::async_trait]
pub trait ChunkSink: Sync + Send + 'static {
    async fn on_chunk(&self, chunk: &[u8]);
}
