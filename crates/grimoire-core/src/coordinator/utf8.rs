//! Incremental UTF-8 decoding for the token stream.
//!
//! Engine tokens are raw byte fragments that may end mid-way through a
//! multi-byte sequence. The accumulator holds undecodable trailing bytes
//! until the rest arrives, so emitted chunks always end on a character
//! boundary — a merely-incomplete sequence never turns into a replacement
//! character. Genuinely invalid bytes are skipped.

/// Buffers incomplete trailing bytes between pushes.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and return every newly decodable character.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    // This slice is valid by construction.
                    if let Ok(valid) = std::str::from_utf8(&self.pending[..valid_up_to]) {
                        out.push_str(valid);
                    }
                    match err.error_len() {
                        // Incomplete trailing sequence: keep it for later.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        // Invalid bytes: skip them and keep decoding.
                        Some(len) => {
                            self.pending.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }

    /// True when undecodable bytes are still buffered.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
