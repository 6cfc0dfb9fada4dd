//! Per-request context.
//!
//! A [`Context`] is created fresh for every request and dropped once the
//! response is produced. It carries the request head, the decoded path, the
//! request-scoped [`State`] and everything middleware wants to say about the
//! response. Shared, immutable application data lives in [`AppContext`],
//! which every context points at.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, LOCATION};
use http::{Method, Uri};
use serde::Serialize;

use crate::body::Body;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::response::Reply;
use crate::status;

/// Named path parameters extracted by the router.
pub type Params = HashMap<String, String>;

// ── AppContext ────────────────────────────────────────────────────────────────

/// Application-level data and helpers shared by every request.
///
/// Immutable once serving starts. Helpers take the per-request [`Context`]
/// explicitly.
#[derive(Debug, Default)]
pub struct AppContext {
    config: Config,
}

impl AppContext {
    pub(crate) fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Ends `ctx`'s response with a redirect to `location`.
    ///
    /// Sets the status (`code`, default 301), a `Redirect <code>` reason
    /// phrase and the `Location` header. No body is sent.
    ///
    /// Fails with [`Error::InvalidStatusCode`] for an unregistered code and
    /// leaves the response untouched when `location` is not a valid header
    /// value.
    pub fn redirect(&self, ctx: &mut Context, location: &str, code: Option<u16>) -> Result<()> {
        let code = code.unwrap_or(301);
        if !status::is_known(code) {
            return Err(Error::InvalidStatusCode(code));
        }
        let res = ctx.res_mut();
        res.set_header(LOCATION, location)?;
        res.set_status(code);
        res.set_reason(format!("Redirect {code}"));
        res.end();
        Ok(())
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Request-scoped, string-keyed storage for arbitrary values.
#[derive(Default)]
pub struct State(HashMap<String, Box<dyn Any + Send + Sync>>);

impl State {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.0.insert(key.into(), Box::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.0.get(key)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.0.get_mut(key)?.downcast_mut()
    }

    /// Removes and returns the value under `key`. A value of another type is
    /// left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.0.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.0.remove(key)?;
        boxed.downcast::<T>().ok().map(|b| *b)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything one request's middleware chain reads and writes.
pub struct Context {
    app: Arc<AppContext>,
    head: http::request::Parts,
    request_body: Bytes,
    path: String,
    /// Request-scoped values shared between middleware.
    pub state: State,
    status: Option<u16>,
    content_type: Option<String>,
    /// The response body. Only the value left here when the chain settles is
    /// sent.
    pub body: Body,
    params: Option<Params>,
    res: Reply,
}

impl Context {
    /// Builds a context for one request. Never fails: a path that does not
    /// percent-decode cleanly is kept as close to the original as possible.
    pub fn new(app: Arc<AppContext>, head: http::request::Parts, request_body: Bytes, res: Reply) -> Self {
        let path = decode_path(head.uri.path());
        Self {
            app,
            head,
            request_body,
            path,
            state: State::default(),
            status: None,
            content_type: None,
            body: Body::Empty,
            params: None,
            res,
        }
    }

    pub fn app(&self) -> &Arc<AppContext> { &self.app }

    // ── request ───────────────────────────────────────────────────────────────

    /// Decoded, normalised request path, e.g. `/users/42`.
    pub fn path(&self) -> &str { &self.path }
    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn query(&self) -> Option<&str> { self.head.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn request_body(&self) -> &Bytes { &self.request_body }

    /// Case-insensitive request header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Route parameters, present only after a router rule matched.
    pub fn params(&self) -> Option<&Params> { self.params.as_ref() }

    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.as_ref()?.get(name).map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = Some(params);
    }

    // ── response ──────────────────────────────────────────────────────────────

    pub fn status(&self) -> Option<u16> { self.status }

    /// Last writer wins. Validated only when the response is resolved.
    pub fn set_status(&mut self, code: impl Into<u16>) {
        self.status = Some(code.into());
    }

    /// The explicit content-type override (`ctx.type`).
    pub fn content_type(&self) -> Option<&str> { self.content_type.as_deref() }

    /// Accepts an extension (`"html"`), a file name or a full media type.
    pub fn set_type(&mut self, value: impl Into<String>) {
        self.content_type = Some(value.into());
    }

    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Sets a JSON body from any serialisable value.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.body = Body::Json(serde_json::to_value(value)?);
        Ok(())
    }

    pub fn res(&self) -> &Reply { &self.res }
    pub fn res_mut(&mut self) -> &mut Reply { &mut self.res }

    pub fn writable(&self) -> bool { self.res.writable() }

    /// Redirects with `301 Moved Permanently`.
    pub fn redirect(&mut self, location: &str) -> Result<()> {
        let app = Arc::clone(&self.app);
        app.redirect(self, location, None)
    }

    /// Redirects with the given status.
    pub fn redirect_with(&mut self, location: &str, code: impl Into<u16>) -> Result<()> {
        let app = Arc::clone(&self.app);
        app.redirect(self, location, Some(code.into()))
    }

    pub(crate) fn into_reply(self) -> Reply {
        self.res
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.method())
            .field("path", &self.path)
            .field("status", &self.status)
            .field("type", &self.content_type)
            .field("body", &self.body)
            .field("params", &self.params)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ── Path decoding ─────────────────────────────────────────────────────────────

/// Resolves dot segments and percent-decodes, the way a URL parser would
/// against a `file://` base. Malformed escapes survive verbatim and invalid
/// UTF-8 is replaced, so this never fails.
pub(crate) fn decode_path(raw: &str) -> String {
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    let segments: Vec<&str> = trimmed.split('/').collect();
    let last = segments.len() - 1;

    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        match dot_segment(seg) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                out.pop();
            }
            None => {
                out.push(seg);
                continue;
            }
        }
        // A trailing dot segment leaves a trailing slash behind.
        if i == last {
            out.push("");
        }
    }

    let normalised = format!("/{}", out.join("/"));
    String::from_utf8_lossy(&urlencoding::decode_binary(normalised.as_bytes())).into_owned()
}

enum DotSegment {
    Current,
    Parent,
}

fn dot_segment(seg: &str) -> Option<DotSegment> {
    match seg.to_ascii_lowercase().as_str() {
        "." | "%2e" => Some(DotSegment::Current),
        ".." | ".%2e" | "%2e." | "%2e%2e" => Some(DotSegment::Parent),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn context(method: Method, target: &str) -> Context {
        let (head, ()) = http::Request::builder()
            .method(method)
            .uri(target)
            .body(())
            .unwrap()
            .into_parts();
        let (reply, _close) = Reply::new();
        Context::new(Arc::new(AppContext::default()), head, Bytes::new(), reply)
    }

    #[test]
    fn new_context_is_blank() {
        let ctx = context(Method::GET, "/hello?x=1");
        assert_eq!(ctx.path(), "/hello");
        assert_eq!(ctx.query(), Some("x=1"));
        assert_eq!(ctx.method(), Method::GET);
        assert!(ctx.state.is_empty());
        assert!(ctx.status().is_none());
        assert!(ctx.content_type().is_none());
        assert!(ctx.body.is_empty());
        assert!(ctx.params().is_none());
    }

    #[test]
    fn path_is_decoded_once() {
        assert_eq!(decode_path("/caf%C3%A9"), "/café");
        assert_eq!(decode_path("/a%2520b"), "/a%20b");
        assert_eq!(decode_path("/%zz"), "/%zz");
        assert_eq!(decode_path("/%FF"), "/\u{FFFD}");
    }

    #[test]
    fn dot_segments_are_resolved() {
        assert_eq!(decode_path("/"), "/");
        assert_eq!(decode_path("/a/b/../c"), "/a/c");
        assert_eq!(decode_path("/a/./b"), "/a/b");
        assert_eq!(decode_path("/a/."), "/a/");
        assert_eq!(decode_path("/a/.."), "/");
        assert_eq!(decode_path("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(decode_path("/a/%2E%2E/b"), "/b");
    }

    #[test]
    fn state_is_typed() {
        let mut state = State::default();
        state.insert("user", String::from("alice"));
        state.insert("visits", 3u32);

        assert_eq!(state.get::<String>("user").map(String::as_str), Some("alice"));
        assert_eq!(state.get::<u32>("user"), None);
        *state.get_mut::<u32>("visits").unwrap() += 1;
        assert_eq!(state.remove::<u32>("visits"), Some(4));
        assert_eq!(state.remove::<u32>("user"), None);
        assert!(state.contains_key("user"));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn redirect_ends_response() {
        let mut ctx = context(Method::GET, "/old");
        ctx.redirect("/new").unwrap();
        assert_eq!(ctx.res().status(), 301);
        assert_eq!(ctx.res().header("location"), Some("/new"));
        assert!(!ctx.writable());

        let mut ctx = context(Method::GET, "/old");
        ctx.redirect_with("/tmp", 302u16).unwrap();
        assert_eq!(ctx.res().status(), 302);
    }

    #[test]
    fn redirect_with_bad_location_leaves_response_alone() {
        let mut ctx = context(Method::GET, "/old");
        assert!(ctx.redirect("/a\nb").is_err());
        assert_eq!(ctx.res().status(), 200);
        assert!(ctx.res().header("location").is_none());
        assert!(ctx.writable());
    }

    #[test]
    fn redirect_rejects_unknown_status() {
        let mut ctx = context(Method::GET, "/old");
        let err = ctx.redirect_with("/x", 1000u16).unwrap_err();
        assert!(matches!(err, Error::InvalidStatusCode(1000)));
        assert!(ctx.res().header("location").is_none());
        assert!(ctx.writable());
    }

    #[test]
    fn json_body_from_serialisable() {
        let mut ctx = context(Method::POST, "/login");
        ctx.json(&serde_json::json!({ "code": 200, "message": "ok" })).unwrap();
        assert!(matches!(ctx.body, Body::Json(_)));
    }
}
