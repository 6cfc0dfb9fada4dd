//! # ply
//!
//! A minimal HTTP application shell: an ordered middleware pipeline, a
//! per-request context and a path router, on top of hyper.
//!
//! ## The pipeline
//!
//! Every request gets a fresh [`Context`]. The middleware registered with
//! [`App::with`] run in order, each deciding whether to hand over to the rest
//! of the chain through its [`Next`]. When the chain settles the context is
//! turned into a response:
//!
//! - chain completed → the resolver writes status, headers and body from
//!   `ctx.status`, `ctx.type` and `ctx.body`
//! - chain failed → the error boundary writes an error response, with full
//!   detail only in [`Env::Development`]
//!
//! Exactly one of the two writes, and only if nothing finished the response
//! already (a redirect, say). Nothing set a body? That is a plain `404`.
//!
//! What ply leaves to others:
//!
//! - **The wire protocol** — hyper parses and writes HTTP/1.1 and HTTP/2
//! - **Conditional requests, ranges, compression** — put a proxy in front
//! - **Templates** — bring any engine behind [`middleware::ViewEngine`]
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use ply::{App, Config, Method, Router, endpoint, from_fn, middleware};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new()
//!         .add("/", endpoint(|ctx| {
//!             ctx.set_body("hello,world");
//!             Ok(())
//!         }))
//!         .route("/login", Method::POST, endpoint(|ctx| {
//!             ctx.json(&serde_json::json!({ "code": 200, "message": "ok" }))
//!         }))
//!         .get("/users/:id", endpoint(|ctx| {
//!             let id = ctx.param("id").unwrap_or("unknown").to_owned();
//!             ctx.json(&serde_json::json!({ "id": id }))
//!         }));
//!
//!     let timing = from_fn(|ctx, mut next| Box::pin(async move {
//!         ctx.state.insert("started", std::time::Instant::now());
//!         next.run(ctx).await
//!     }));
//!
//!     App::new(Config::from_env())
//!         .with(middleware::trace())
//!         .with(timing)
//!         .with(middleware::assets("public"))
//!         .with(router)
//!         .listen("0.0.0.0:3000")
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Concurrency
//!
//! Requests run concurrently on tokio; each request's [`Context`] belongs to
//! that request alone, so its fields need no locking. The middleware list and
//! route table are fixed when [`App::callback`] consumes the builder and are
//! shared read-only afterwards.

mod app;
mod body;
mod compose;
mod config;
mod context;
mod error;
mod handler;
mod resolve;
mod response;
mod router;
mod server;
mod status;

pub mod middleware;

pub use http::Method;

pub use app::{App, Callback};
pub use body::{Body, ByteStream};
pub use compose::{Chain, Next, compose};
pub use config::{Config, Env};
pub use context::{AppContext, Context, Params, State};
pub use error::{BoxError, Error, Result};
pub use handler::{BoxFuture, BoxedMiddleware, Endpoint, FromFn, Middleware, endpoint, from_fn};
pub use resolve::{fail, respond};
pub use response::{CloseHandle, ContentType, Reply, ResponseBody};
pub use router::Router;
pub use server::Server;
pub use status::{Status, is_empty_body, is_known, reason_phrase};
