//! The outgoing response handle and content-type lookup.
//!
//! [`Reply`] stands in for the transport's response object: middleware and the
//! resolver set a status, headers and finally *end* it with a body. Once
//! ended it is no longer writable and every later terminal write is skipped.

use std::convert::Infallible;
use std::io;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header::{AsHeaderName, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::ext::ReasonPhrase;
use tokio::sync::watch;

use crate::body::ByteStream;
use crate::error::{Error, Result};

/// Body type handed to hyper.
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values and the extension table used by `ctx.type`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Css,          // text/css
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Gif,          // image/gif
    Html,         // text/html; charset=utf-8
    Ico,          // image/x-icon
    Javascript,   // text/javascript; charset=utf-8
    Jpeg,         // image/jpeg
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Png,          // image/png
    Svg,          // image/svg+xml
    Text,         // text/plain; charset=utf-8
    Wasm,         // application/wasm
    Woff2,        // font/woff2
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Css         => "text/css; charset=utf-8",
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Gif         => "image/gif",
            Self::Html        => "text/html; charset=utf-8",
            Self::Ico         => "image/x-icon",
            Self::Javascript  => "text/javascript; charset=utf-8",
            Self::Jpeg        => "image/jpeg",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Png         => "image/png",
            Self::Svg         => "image/svg+xml",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Wasm        => "application/wasm",
            Self::Woff2       => "font/woff2",
            Self::Xml         => "application/xml",
        }
    }

    /// Maps a bare extension (`"html"`, `".html"`) or a file name
    /// (`"index.html"`) to a content type. Case-insensitive.
    ///
    /// Anything containing a `/` is taken to be a full media type such as
    /// `"text/html"` and does not match; callers use those verbatim.
    pub fn lookup(name: &str) -> Option<Self> {
        if name.contains('/') {
            return None;
        }
        let ext = name.rsplit('.').next().unwrap_or(name);
        let found = match ext.to_ascii_lowercase().as_str() {
            "css"          => Self::Css,
            "csv"          => Self::Csv,
            "gif"          => Self::Gif,
            "htm" | "html" => Self::Html,
            "ico"          => Self::Ico,
            "js" | "mjs"   => Self::Javascript,
            "jpg" | "jpeg" => Self::Jpeg,
            "json" | "map" => Self::Json,
            "pdf"          => Self::Pdf,
            "png"          => Self::Png,
            "svg"          => Self::Svg,
            "text" | "txt" => Self::Text,
            "wasm"         => Self::Wasm,
            "woff2"        => Self::Woff2,
            "xml"          => Self::Xml,
            _              => return None,
        };
        Some(found)
    }
}

// ── Close signal ──────────────────────────────────────────────────────────────

/// Held by the transport; fires when the client connection goes away.
///
/// Dropping the handle without calling [`close`](CloseHandle::close) means
/// "never closed".
#[derive(Debug)]
pub struct CloseHandle(watch::Sender<bool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.send_replace(true);
    }
}

// ── Reply ─────────────────────────────────────────────────────────────────────

/// The per-request outgoing response.
pub struct Reply {
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    body: Option<ResponseBody>,
    ended: bool,
    closed: watch::Receiver<bool>,
}

impl Reply {
    /// A fresh `200` reply and the handle the transport uses to report a
    /// closed connection.
    pub fn new() -> (Self, CloseHandle) {
        let (tx, rx) = watch::channel(false);
        let reply = Self {
            status: 200,
            reason: None,
            headers: HeaderMap::new(),
            body: None,
            ended: false,
            closed: rx,
        };
        (reply, CloseHandle(tx))
    }

    pub fn status(&self) -> u16 { self.status }

    pub fn set_status(&mut self, code: u16) {
        self.status = code;
    }

    /// Overrides the reason phrase sent on the status line (HTTP/1 only).
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = Some(reason.into());
    }

    pub(crate) fn clear_reason(&mut self) {
        self.reason = None;
    }

    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: impl AsHeaderName) -> bool {
        self.headers.contains_key(name)
    }

    /// Sets a header, replacing any previous value.
    ///
    /// Fails with [`Error::HeadersSent`] once the reply has ended, and with
    /// [`Error::Http`] for a value that is not a valid header value.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        if self.headers_sent() {
            return Err(Error::HeadersSent);
        }
        let value = HeaderValue::from_str(value).map_err(|_| Error::Http {
            status: 500,
            message: format!("invalid value for header `{name}`"),
        })?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Inserts an already-valid header value. Callers check
    /// [`headers_sent`](Reply::headers_sent) first.
    pub(crate) fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn remove_header(&mut self, name: impl AsHeaderName) -> Result<()> {
        if self.headers_sent() {
            return Err(Error::HeadersSent);
        }
        self.headers.remove(name);
        Ok(())
    }

    /// Headers are flushed together with the terminal write.
    pub fn headers_sent(&self) -> bool {
        self.ended
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Not yet ended and the connection can still take writes.
    pub fn writable(&self) -> bool {
        !self.ended && !self.is_closed()
    }

    pub(crate) fn close_signal(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    /// Ends the reply without a body.
    pub fn end(&mut self) {
        self.finish(Empty::<Bytes>::new().map_err(never).boxed_unsync());
    }

    /// Ends the reply with `bytes` as the complete body.
    pub fn end_with(&mut self, bytes: impl Into<Bytes>) {
        self.finish(Full::new(bytes.into()).map_err(never).boxed_unsync());
    }

    /// Ends the reply by piping `stream` into it. A stream error aborts the
    /// response; the stream is dropped when the connection goes away.
    pub fn pipe(&mut self, stream: ByteStream) {
        self.finish(StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync());
    }

    fn finish(&mut self, body: ResponseBody) {
        self.body = Some(body);
        self.ended = true;
    }

    /// Converts into the response hyper writes to the wire.
    pub(crate) fn into_response(self) -> http::Response<ResponseBody> {
        let body = self
            .body
            .unwrap_or_else(|| Empty::<Bytes>::new().map_err(never).boxed_unsync());
        let mut response = http::Response::new(body);
        *response.status_mut() = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        *response.headers_mut() = self.headers;
        if let Some(phrase) = self.reason.and_then(|r| ReasonPhrase::try_from(r).ok()) {
            response.extensions_mut().insert(phrase);
        }
        response
    }
}

fn never(e: Infallible) -> io::Error {
    match e {}
}

/// Resolves once the transport reports the connection closed. Never resolves
/// if the transport dropped its [`CloseHandle`] without closing.
pub(crate) async fn closed(mut signal: watch::Receiver<bool>) {
    if signal.wait_for(|closed| *closed).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sets `Content-Type` unless one is already present.
pub(crate) fn default_content_type(reply: &mut Reply, value: &str) -> Result<()> {
    if reply.has_header(CONTENT_TYPE) {
        return Ok(());
    }
    reply.set_header(CONTENT_TYPE, value)
}

pub(crate) fn set_content_length(reply: &mut Reply, len: usize) -> Result<()> {
    reply.set_header(CONTENT_LENGTH, &len.to_string())
}
