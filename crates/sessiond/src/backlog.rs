//! Bounded output history for replay on reattach.

use std::collections::VecDeque;

/// A byte ring over a session's output stream. Offsets are absolute
/// positions in the stream since session start, so a viewer can resume
/// from where it last read even after the ring has evicted old bytes.
#[derive(Debug)]
pub struct Backlog {
    bytes: VecDeque<u8>,
    /// Stream offset of the first retained byte.
    base_offset: u64,
    limit: usize,
    truncated: bool,
}

impl Backlog {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            base_offset: 0,
            limit,
            truncated: false,
        }
    }

    /// Append a chunk, evicting from the head once over the limit.
    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend(data.iter().copied());
        while self.bytes.len() > self.limit {
            let excess = self.bytes.len() - self.limit;
            self.bytes.drain(..excess);
            self.base_offset += excess as u64;
            self.truncated = true;
        }
    }

    /// Stream offset just past the last byte seen.
    pub fn end_offset(&self) -> u64 {
        self.base_offset + self.bytes.len() as u64
    }

    /// Stream offset of the oldest retained byte.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Whether any bytes have ever been evicted.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Bytes from `offset` to the end, and whether the reader lost
    /// history: a request below the base means the gap was evicted and
    /// the reader gets everything retained instead.
    pub fn read_from(&self, offset: u64) -> (Vec<u8>, bool) {
        if offset >= self.end_offset() {
            return (Vec::new(), false);
        }
        if offset < self.base_offset {
            return (self.bytes.iter().copied().collect(), true);
        }
        let skip = (offset - self.base_offset) as usize;
        (self.bytes.iter().copied().skip(skip).collect(), false)
    }
}
