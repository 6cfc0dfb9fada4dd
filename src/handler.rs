//! The middleware trait and type erasure.
//!
//! # How middleware is stored
//!
//! The application holds middleware of *different* types in one ordered list.
//! Rust collections hold one concrete type, so each middleware is erased to a
//! trait object (`Arc<dyn Middleware>`) and the list stores those.
//!
//! ```text
//! |ctx, next| Box::pin(async move { … })   ← user writes this
//!        ↓ from_fn(closure)
//! FromFn(closure)                           ← implements Middleware
//!        ↓ app.with(..) / .boxed()
//! Arc<dyn Middleware>                       ← BoxedMiddleware
//!        ↓
//! mw.call(ctx, next)  at request time       ← one vtable dispatch
//! ```
//!
//! Everything a middleware borrows (the context, the rest of the chain) lives
//! exactly as long as the call, which is what the `'a` on [`BoxFuture`]
//! expresses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::compose::Next;
use crate::context::Context;
use crate::error::Result;

/// A heap-allocated, type-erased future borrowing from the current request.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send` so
/// tokio may move the request's task between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A middleware shared by every request.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A unit of request handling that may delegate to the rest of the chain.
///
/// `call` receives the request's [`Context`] and a [`Next`] cursor. It may:
///
/// - **Pass through** — `next.run(ctx).await`.
/// - **Short-circuit** — return without running `next`; nothing registered
///   after it runs.
/// - **Wrap** — do work before and after `next.run(ctx).await`. Work after
///   the await runs on the way "out", in reverse registration order.
///
/// Returning `Err` stops the chain; the error travels back up to the
/// application's error boundary.
///
/// Closures are adapted with [`from_fn`] and [`endpoint`].
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>>;

    /// Erases the concrete type.
    fn boxed(self) -> BoxedMiddleware
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

// ── Closure adapters ──────────────────────────────────────────────────────────

/// Adapts an async closure into a [`Middleware`].
///
/// ```rust
/// use ply::from_fn;
///
/// let logger = from_fn(|ctx, mut next| Box::pin(async move {
///     let path = ctx.path().to_owned();
///     next.run(ctx).await?;
///     tracing::debug!(%path, status = ?ctx.status(), "done");
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    FromFn(f)
}

/// Middleware returned by [`from_fn`].
pub struct FromFn<F>(F);

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        (self.0)(ctx, next)
    }
}

/// Adapts a synchronous closure that never delegates.
///
/// ```rust
/// use ply::endpoint;
///
/// let hello = endpoint(|ctx| {
///     ctx.set_body("hello,world");
///     Ok(())
/// });
/// ```
pub fn endpoint<F>(f: F) -> Endpoint<F>
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
{
    Endpoint(f)
}

/// Middleware returned by [`endpoint`].
pub struct Endpoint<F>(F);

impl<F> Middleware for Endpoint<F>
where
    F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(std::future::ready((self.0)(ctx)))
    }
}
