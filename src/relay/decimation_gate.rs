use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use tracing::trace;

use crate::upstream::ChunkSink;


/// Forwards every `divisor`-th chunk to the next sink and drops the others.
///
/// Selection is purely by index: of each group of `divisor` consecutive chunks, the last one is
///  forwarded. Nothing is buffered, the forwarded chunk is passed on during the call that
///  received it.
pub struct DecimationGate {
    divisor: u32,
    counter: Mutex<u32>,
    next: Arc<dyn ChunkSink>,
}

impl DecimationGate {
    pub fn new(divisor: u32, next: Arc<dyn ChunkSink>) -> anyhow::Result<DecimationGate> {
        if divisor == 0 {
            bail!("decimation divisor must be at least 1");
        }

        Ok(DecimationGate {
            divisor,
            counter: Mutex::new(0),
            next,
        })
    }

    /// Counts a chunk, returning `true` if it is the one to be forwarded
    fn count(&self) -> bool {
        let mut counter = match self.counter.lock() {
            Ok(counter) => counter,
            Err(poisoned) => poisoned.into_inner(),
        };

        *counter += 1;
        if *counter >= self.divisor {
            *counter = 0;
            true
        }
        else {
            false
        }
    }
}

#[async_trait]
impl ChunkSink for DecimationGate {
    async fn on_chunk(&self, chunk: &[u8]) {
        if self.count() {
            trace!("forwarding chunk of {} bytes", chunk.len());
            self.next.on_chunk(chunk).await;
        }
    }
}
