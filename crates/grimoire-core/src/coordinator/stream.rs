//! Streaming delivery loop.
//!
//! While a blocking generation call is in flight on one task, this loop
//! concurrently polls the engine's token buffer on another and yields
//! decodable text as it becomes available. The consumer (the HTTP adapter)
//! frames the chunks per dialect; this module only guarantees cadence and
//! character-boundary correctness.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use tracing::warn;

use super::utf8::Utf8Accumulator;
use crate::ports::TextEngine;

/// Delay before the first poll, so the check cannot overtake the blocking
/// generate call that populates the buffer.
const STREAM_STARTUP_DELAY: Duration = Duration::from_millis(250);

/// Idle wait between polls when no new token is available. Trades
/// responsiveness against busy-polling overhead.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Poll the engine's token buffer and yield newly decodable text.
///
/// The cursor over delivered tokens is monotone; token bytes that end inside
/// a multi-byte character are buffered until the remainder arrives. The
/// stream ends once the engine reports finished and the buffer is drained.
pub fn token_stream(engine: Arc<dyn TextEngine>) -> impl Stream<Item = String> {
    stream! {
        tokio::time::sleep(STREAM_STARTUP_DELAY).await;
        let mut cursor = 0usize;
        let mut decoder = Utf8Accumulator::new();
        loop {
            // Sample the finished flag before draining, so tokens that land
            // between the drain and the check are picked up next iteration.
            let finished = engine.has_finished();

            let mut chunk = String::new();
            let available = engine.stream_token_count();
            while cursor < available {
                let Some(bytes) = engine.stream_token(cursor) else {
                    // Token slot not ready yet.
                    break;
                };
                cursor += 1;
                chunk.push_str(&decoder.push(&bytes));
            }

            if chunk.is_empty() {
                if finished {
                    break;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            } else {
                yield chunk;
                if finished {
                    break;
                }
            }
        }
    }
}

/// Aborts the engine if dropped before [`AbortGuard::disarm`] is called.
///
/// The HTTP adapter arms one of these around a streaming response body; a
/// client disconnect drops the body mid-stream, and the guard turns that
/// into an engine abort so computation is not wasted.
pub struct AbortGuard {
    engine: Arc<dyn TextEngine>,
    armed: bool,
}

impl AbortGuard {
    #[must_use]
    pub fn new(engine: Arc<dyn TextEngine>) -> Self {
        Self {
            engine,
            armed: true,
        }
    }

    /// Mark the stream as completed normally; dropping no longer aborts.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("token stream dropped mid-generation, aborting engine");
            self.engine.abort();
        }
    }
}
