//! SSE frame encoding.
//!
//! Two framing styles are in play: the kobold style sends a named `message`
//! event per token, while the OpenAI style sends bare `data:` lines and
//! terminates with a literal `[DONE]` frame that carries no trailing blank
//! line. Both are byte-exact contracts, so frames are assembled here rather
//! than through an SSE abstraction.

use bytes::Bytes;
use serde_json::Value;

use crate::models::Dialect;

/// Terminal frame for OpenAI-style streams. Deliberately not newline
/// terminated.
pub const DONE_FRAME: &[u8] = b"data: [DONE]";

/// Encode one token payload as an SSE frame for the dialect.
#[must_use]
pub fn encode_frame(dialect: Dialect, payload: &Value) -> Bytes {
    let body = match dialect {
        Dialect::OaiCompletions | Dialect::OaiChat => format!("data: {payload}\n\n"),
        Dialect::Basic | Dialect::Kobold => format!("event: message\ndata: {payload}\n\n"),
    };
    Bytes::from(body)
}
