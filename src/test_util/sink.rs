use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::upstream::ChunkSink;


/// A [ChunkSink] that keeps every chunk it is passed, for inspection by test code
#[derive(Debug, Default)]
pub struct RecordingSink {
    chunks: RwLock<Vec<Vec<u8>>>,
}
impl RecordingSink {
    pub async fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.read().await.clone()
    }

    /// all received chunks, concatenated
    pub async fn received_bytes(&self) -> Vec<u8> {
        self.chunks.read().await.concat()
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    async fn on_chunk(&self, chunk: &[u8]) {
        self.chunks.write().await.push(chunk.to_vec());
    }
}
