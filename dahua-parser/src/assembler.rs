//! Reassembly of lines split across network reads

use bytes::{Bytes, BytesMut};

/// Upper bound on buffered bytes without a line terminator
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Buffers the incomplete trailing line of a chunk until its CRLF arrives.
///
/// Each push hands back everything up to and including the last CRLF seen
/// so far, so [`crate::parse_chunk`] only ever sees whole lines. If more than
/// [`MAX_PENDING_BYTES`] accumulate without a terminator the buffer is
/// released as-is rather than growing without bound.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: BytesMut,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and take the complete lines available, if any
    pub fn push(&mut self, chunk: &[u8]) -> Option<Bytes> {
        self.pending.extend_from_slice(chunk);

        match last_crlf_end(&self.pending) {
            Some(end) => Some(self.pending.split_to(end).freeze()),
            None if self.pending.len() > MAX_PENDING_BYTES => {
                Some(self.pending.split().freeze())
            }
            None => None,
        }
    }

    /// Number of bytes waiting for a line terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take whatever is buffered, terminated or not. Used when the stream ends.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.split().freeze())
        }
    }

    /// Drop any partial line, e.g. when its connection is gone
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

fn last_crlf_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).rposition(|w| w == b"\r\n").map(|pos| pos + 2)
}
