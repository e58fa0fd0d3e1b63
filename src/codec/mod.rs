//! Byte-level handling of upstream responses for the display pipeline.
//!
//! | Component             | Input                           | Output                    |
//! |-----------------------|---------------------------------|---------------------------|
//! | [`StreamClassifier`]  | `content-type`, `transfer-encoding` | buffered or streaming |
//! | [`SseFramer`]         | raw deliveries, in order        | [`SseFrame`]s             |
//! | [`BodyDecoder`]       | buffered body + [`ContentEncoding`] | decoded copy          |
//!
//! Everything here operates on copies. Forwarded bytes never pass through
//! this module.

mod classify;
mod decode;
mod sse;

pub use classify::{StreamClassifier, DEFAULT_STREAMING_CONTENT_TYPES};
pub use decode::{BodyDecoder, ContentEncoding};
pub use sse::{SseEvent, SseFrame, SseFramer, DEFAULT_MAX_LINE, DONE_MARKER};
