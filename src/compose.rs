//! Middleware composition.
//!
//! [`compose`] turns an ordered list of middleware into one [`Chain`]. Running
//! the chain hands the first middleware a [`Next`] cursor pointing at the
//! second, and so on; after the last link the cursor falls through to the
//! caller-supplied tail (or simply completes).
//!
//! ```text
//! chain = [a, b, c]
//!
//! a ──next──▶ b ──next──▶ c ──next──▶ tail / done
//! a ◀──────── b ◀──────── c ◀────────
//! ```

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware};

/// Builds a single chain from `middleware`, in order.
pub fn compose(middleware: impl IntoIterator<Item = BoxedMiddleware>) -> Chain {
    Chain { links: middleware.into_iter().collect() }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered list of middleware callable as one unit.
///
/// A `Chain` is itself a [`Middleware`]: when nested, its `next` becomes the
/// tail it falls through to after its last link.
#[derive(Clone, Default)]
pub struct Chain {
    links: Vec<BoxedMiddleware>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Returns `self` for chaining.
    pub fn then(mut self, middleware: impl Middleware) -> Self {
        self.links.push(middleware.boxed());
        self
    }

    pub fn len(&self) -> usize { self.links.len() }

    pub fn is_empty(&self) -> bool { self.links.is_empty() }

    /// Runs the chain. Completes when the last link reached, and everything
    /// wrapping it, has completed; fails with the first error raised.
    pub fn run<'a>(&'a self, ctx: &'a mut Context, tail: Option<Next<'a>>) -> BoxFuture<'a, Result<()>> {
        let mut first = Next {
            links: &self.links,
            cursor: 0,
            tail: tail.map(Box::new),
            ran: false,
        };
        Box::pin(async move { first.run(ctx).await })
    }
}

impl Middleware for Chain {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        self.run(ctx, Some(next))
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// Cursor into the remainder of a chain.
///
/// Each middleware gets its own `Next`. Running it advances to the following
/// link; running the same `Next` a second time fails with
/// [`Error::DuplicateNextInvocation`] and leaves the downstream chain alone.
pub struct Next<'a> {
    links: &'a [BoxedMiddleware],
    // Index of the link this cursor runs.
    cursor: usize,
    // Where to continue after the last link.
    tail: Option<Box<Next<'a>>>,
    ran: bool,
}

impl<'a> Next<'a> {
    /// A cursor with nothing behind it; running it completes immediately.
    pub fn done() -> Self {
        Self { links: &[], cursor: 0, tail: None, ran: false }
    }

    /// Runs everything downstream of the current middleware.
    pub fn run<'b>(&'b mut self, ctx: &'b mut Context) -> BoxFuture<'b, Result<()>> {
        if self.ran {
            return Box::pin(std::future::ready(Err(Error::DuplicateNextInvocation)));
        }
        self.ran = true;

        match self.links.get(self.cursor) {
            Some(link) => {
                let next = Next {
                    links: self.links,
                    cursor: self.cursor + 1,
                    tail: self.tail.take(),
                    ran: false,
                };
                link.call(ctx, next)
            }
            None => match self.tail.as_deref_mut() {
                Some(tail) => tail.run(ctx),
                None => Box::pin(std::future::ready(Ok(()))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::Method;

    use super::*;
    use crate::context::tests::context;
    use crate::handler::{endpoint, from_fn};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, name: &'static str) -> BoxedMiddleware {
        let log = Arc::clone(log);
        from_fn(move |ctx, mut next| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(format!("{name} in"));
                next.run(ctx).await?;
                log.lock().unwrap().push(format!("{name} out"));
                Ok(())
            })
        })
        .boxed()
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn runs_in_onion_order() {
        let log = Log::default();
        let chain = compose([recorder(&log, "a"), recorder(&log, "b"), recorder(&log, "c")]);
        let mut ctx = context(Method::GET, "/");

        chain.run(&mut ctx, None).await.unwrap();

        assert_eq!(entries(&log), ["a in", "b in", "c in", "c out", "b out", "a out"]);
    }

    #[tokio::test]
    async fn empty_chain_completes() {
        let mut ctx = context(Method::GET, "/");
        compose([]).run(&mut ctx, None).await.unwrap();
    }

    #[tokio::test]
    async fn short_circuit_skips_the_rest() {
        let log = Log::default();
        let stop = endpoint(|ctx| {
            ctx.set_body("stopped");
            Ok(())
        });
        let chain = compose([recorder(&log, "a"), stop.boxed(), recorder(&log, "c")]);
        let mut ctx = context(Method::GET, "/");

        chain.run(&mut ctx, None).await.unwrap();

        assert_eq!(entries(&log), ["a in", "a out"]);
    }

    #[tokio::test]
    async fn failure_surfaces_and_stops_the_chain() {
        let log = Log::default();
        let boom = endpoint(|_| Err(Error::other("boom")));
        let chain = compose([recorder(&log, "a"), boom.boxed(), recorder(&log, "c")]);
        let mut ctx = context(Method::GET, "/");

        let err = chain.run(&mut ctx, None).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        // "a" never reaches its post-next step because `?` propagated.
        assert_eq!(entries(&log), ["a in"]);
    }

    #[tokio::test]
    async fn next_runs_at_most_once() {
        let log = Log::default();
        let twice = from_fn(|ctx, mut next| {
            Box::pin(async move {
                next.run(ctx).await?;
                next.run(ctx).await
            })
        });
        let chain = compose([twice.boxed(), recorder(&log, "b")]);
        let mut ctx = context(Method::GET, "/");

        let err = chain.run(&mut ctx, None).await.unwrap_err();

        assert!(matches!(err, Error::DuplicateNextInvocation));
        assert_eq!(entries(&log), ["b in", "b out"]);
    }

    #[tokio::test]
    async fn falls_through_to_tail() {
        let log = Log::default();
        let inner = compose([recorder(&log, "inner")]);
        let outer = compose([inner.boxed(), recorder(&log, "after")]);
        let mut ctx = context(Method::GET, "/");

        outer.run(&mut ctx, None).await.unwrap();

        assert_eq!(entries(&log), ["inner in", "after in", "after out", "inner out"]);
    }

    #[tokio::test]
    async fn done_cursor_completes_once() {
        let mut ctx = context(Method::GET, "/");
        let mut next = Next::done();
        next.run(&mut ctx).await.unwrap();
        assert!(matches!(next.run(&mut ctx).await, Err(Error::DuplicateNextInvocation)));
    }
}
