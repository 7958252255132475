//! Bounded byte queues bridging the core to the external stream.
//!
//! The core carries two of these: a transmit queue between the core's
//! byte-emit handshake and the external transmit handshake, and a receive
//! queue in the opposite direction. Each side of a queue is gated by its own
//! handshake pair, so overflow and underflow are structurally impossible: a
//! full queue simply withholds acceptance and an empty one withholds
//! availability, and the requester retries. No byte is ever dropped or
//! duplicated by the queue itself.
//!
//! At most one push and one pop land on a queue per clock edge. When both
//! land on the same edge, the pop applies first, as in a synchronous FIFO
//! with simultaneous read and write.

/// Queue capacity in bytes. Both queues are four deep.
pub const QUEUE_DEPTH: usize = 4;

/// A bounded FIFO of bytes with strict ordering.
#[derive(Debug, Clone, Default)]
pub struct ByteQueue {
    buf: Vec<u8>,
}

impl ByteQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(QUEUE_DEPTH),
        }
    }

    /// Queue holds no bytes (pop side withholds availability).
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Queue is at capacity (push side withholds acceptance).
    pub fn is_full(&self) -> bool {
        self.buf.len() >= QUEUE_DEPTH
    }

    /// Number of bytes currently queued.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Oldest byte without consuming it (the combinational read-data view).
    pub fn peek(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    /// Accept one byte. Returns false (and drops nothing in) when full.
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.buf.push(byte);
        true
    }

    /// Consume the oldest byte, if any.
    pub fn pop(&mut self) -> Option<u8> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.remove(0))
        }
    }

    /// Drop all queued bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
