use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::datagram::{decode, DatagramFormat};
use crate::upstream::ChunkSink;


/// Decodes every chunk as a datagram of a given format and logs the result. A chunk that can not
///  be decoded is reported and dropped; processing continues with the next chunk.
pub struct DecodingSink {
    format: DatagramFormat,
    num_decoded: AtomicU64,
    num_dropped: AtomicU64,
}

impl DecodingSink {
    pub fn new(format: DatagramFormat) -> DecodingSink {
        DecodingSink {
            format,
            num_decoded: AtomicU64::new(0),
            num_dropped: AtomicU64::new(0),
        }
    }

    pub fn num_decoded(&self) -> u64 {
        self.num_decoded.load(Ordering::Relaxed)
    }

    pub fn num_dropped(&self) -> u64 {
        self.num_dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChunkSink for DecodingSink {
    async fn on_chunk(&self, chunk: &[u8]) {
        match decode(chunk, self.format) {
            Ok(decoded) => {
                self.num_decoded.fetch_add(1, Ordering::Relaxed);
                info!("{:?}", decoded.datagram);
                for violation in &decoded.violations {
                    warn!("{}", violation);
                }
                if decoded.consumed < chunk.len() {
                    warn!("{} trailing bytes after {} datagram - ignoring", chunk.len() - decoded.consumed, self.format);
                }
            }
            Err(e) => {
                self.num_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("dropping chunk of {} bytes: {}", chunk.len(), e);
            }
        }
    }
}


#[cfg(test)]
mod test {
    use crate::test_util::datagram::test_pose_bytes;
    use super::*;

    #[tokio::test]
    async fn test_framing_errors_do_not_stop_decoding() {
        let sink = DecodingSink::new(DatagramFormat::Pose);
        let pose = test_pose_bytes();

        sink.on_chunk(&pose).await;
        sink.on_chunk(&pose[..100]).await;
        sink.on_chunk(&pose).await;

        assert_eq!(sink.num_decoded(), 2);
        assert_eq!(sink.num_dropped(), 1);
    }

    #[tokio::test]
    async fn test_field_errors_still_count_as_decoded() {
        let sink = DecodingSink::new(DatagramFormat::ControlMode);
        sink.on_chunk(b"\xff\xff\xff\xff").await;

        assert_eq!(sink.num_decoded(), 1);
        assert_eq!(sink.num_dropped(), 0);
    }
}
