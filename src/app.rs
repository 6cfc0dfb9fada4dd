//! The application: middleware registration and per-request dispatch.
//!
//! ```rust,no_run
//! use ply::{App, Config, endpoint};
//!
//! #[tokio::main]
//! async fn main() {
//!     App::new(Config::from_env())
//!         .with(endpoint(|ctx| {
//!             ctx.set_body("hello,world");
//!             Ok(())
//!         }))
//!         .listen("127.0.0.1:8080")
//!         .await
//!         .unwrap();
//! }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use http_body_util::BodyExt;
use tracing::warn;

use crate::compose::{Chain, compose};
use crate::config::Config;
use crate::context::{AppContext, Context};
use crate::error::{Error, Result};
use crate::handler::{BoxedMiddleware, Middleware};
use crate::resolve;
use crate::response::{self, ContentType, Reply, ResponseBody};
use crate::server::Server;
use crate::status;

/// Application builder.
///
/// Registration happens here, before serving. [`App::callback`] and
/// [`App::listen`] consume the builder, so the middleware list cannot change
/// once requests are flowing.
pub struct App {
    context: AppContext,
    middleware: Vec<BoxedMiddleware>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { context: AppContext::new(config), middleware: Vec::new() }
    }

    /// Appends `middleware` to the chain. Order of calls is order of execution.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(middleware.boxed());
        self
    }

    pub fn context(&self) -> &AppContext { &self.context }

    /// Composes the registered middleware into the raw request handler a
    /// transport drives.
    pub fn callback(self) -> Callback {
        Callback {
            inner: Arc::new(Inner {
                context: Arc::new(self.context),
                chain: compose(self.middleware),
            }),
        }
    }

    /// Binds `addr` and serves until SIGTERM / Ctrl-C.
    pub async fn listen(self, addr: &str) -> Result<()> {
        Server::bind(addr).serve(self.callback()).await
    }
}

// ── Callback ──────────────────────────────────────────────────────────────────

struct Inner {
    context: Arc<AppContext>,
    chain: Chain,
}

/// The composed request handler. Cheap to clone; every clone shares the same
/// chain.
#[derive(Clone)]
pub struct Callback {
    inner: Arc<Inner>,
}

impl Callback {
    /// Collects the request body, builds a [`Context`] and dispatches it.
    ///
    /// A body that fails to arrive is answered with `400 Bad Request` without
    /// running any middleware.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<ResponseBody>
    where
        B: hyper::body::Body,
        B::Error: std::fmt::Display,
    {
        let (head, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(method = %head.method, uri = %head.uri, "failed to read request body: {e}");
                return bad_request();
            }
        };
        let (reply, _close) = Reply::new();
        self.dispatch(self.context(head, body, reply)).await
    }

    /// Builds the context for one request around `reply`.
    pub fn context(&self, head: http::request::Parts, body: Bytes, reply: Reply) -> Context {
        Context::new(Arc::clone(&self.inner.context), head, body, reply)
    }

    /// Drives `ctx` through the chain and produces the response.
    ///
    /// Exactly one of the resolver and the error boundary gets to write. A
    /// connection that closes first drops the chain, releasing whatever it
    /// held, and is reported to the boundary as [`Error::ConnectionClosed`].
    pub async fn dispatch(&self, mut ctx: Context) -> http::Response<ResponseBody> {
        ctx.res_mut().set_status(404);

        let closed = response::closed(ctx.res().close_signal());
        let outcome = tokio::select! {
            biased;
            () = closed => Err(Error::ConnectionClosed),
            result = self.inner.chain.run(&mut ctx, None) => result,
        };

        if let Err(err) = outcome.and_then(|()| resolve::respond(&mut ctx)) {
            resolve::fail(&mut ctx, err);
        }
        ctx.into_reply().into_response()
    }
}

fn bad_request() -> http::Response<ResponseBody> {
    let (mut reply, _close) = Reply::new();
    let message = status::message_for(400);
    reply.set_status(400);
    reply.insert_header(CONTENT_TYPE, HeaderValue::from_static(ContentType::Text.as_str()));
    reply.insert_header(CONTENT_LENGTH, HeaderValue::from(message.len()));
    reply.end_with(message);
    reply.into_response()
}
