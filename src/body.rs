//! What a middleware leaves behind in `ctx.body`.
//!
//! Only the final value matters: the resolver reads it once the chain settles
//! and picks one branch per variant.

use std::fmt;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream of body chunks, e.g. a file being read.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// The response body as set by middleware.
///
/// ```rust
/// use ply::Body;
///
/// let _ = Body::from("hello,world");
/// let _ = Body::from(vec![0u8, 1, 2]);
/// let _ = Body::from(serde_json::json!({ "code": 200 }));
/// ```
#[derive(Default)]
pub enum Body {
    /// Nothing set. Resolves to the status reason phrase.
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    /// Length unknown ahead of time; piped into the response.
    Stream(ByteStream),
    /// Serialised as JSON.
    Json(serde_json::Value),
}

impl Body {
    /// Wraps a stream of chunks.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(Box::pin(stream))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty    => f.write_str("Empty"),
            Self::Text(s)  => f.debug_tuple("Text").field(s).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Json(v)  => f.debug_tuple("Json").field(v).finish(),
        }
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::Bytes(b) }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self { Self::Bytes(Bytes::from(b)) }
}

impl From<serde_json::Value> for Body {
    fn from(v: serde_json::Value) -> Self { Self::Json(v) }
}

impl From<ByteStream> for Body {
    fn from(s: ByteStream) -> Self { Self::Stream(s) }
}
