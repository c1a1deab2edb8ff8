//! Buffers between browser capture and the vendor sockets.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;

/// Single-slot holder for the most recent camera frame.
///
/// The browser may push frames faster than the capture timer sends them;
/// only the newest one is kept and each frame is sent at most once.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<String>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: String) {
        *self.latest.lock() = Some(frame);
    }

    pub fn take(&self) -> Option<String> {
        self.latest.lock().take()
    }

    pub fn clear(&self) {
        self.latest.lock().take();
    }
}

/// Accumulates microphone bytes into fixed-size chunks.
#[derive(Debug)]
pub struct AudioChunker {
    chunk_size: usize,
    buffer: BytesMut,
}

impl AudioChunker {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            buffer: BytesMut::with_capacity(chunk_size * 2),
        }
    }

    /// Append `data` and return every chunk that is now full.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(data);
        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_size {
            chunks.push(self.buffer.split_to(self.chunk_size).freeze());
        }
        chunks
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_slot_keeps_latest_once() {
        let slot = FrameSlot::new();
        assert!(slot.take().is_none());
        slot.publish("a".into());
        slot.publish("b".into());
        assert_eq!(slot.take().as_deref(), Some("b"));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_audio_chunker_emits_fixed_size_chunks() {
        let mut chunker = AudioChunker::new(4);
        assert!(chunker.push(&[1, 2, 3]).is_empty());
        let chunks = chunker.push(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0][..], &[1, 2, 3, 4]);
        assert_eq!(&chunks[1][..], &[5, 6, 7, 8]);
        assert_eq!(chunker.pending(), 1);
        chunker.reset();
        assert_eq!(chunker.pending(), 0);
    }
}
