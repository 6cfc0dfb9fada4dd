use std::time::Instant;

use tracing::{info, warn};

use crate::compose::Next;
use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, Middleware};

/// Logs every request once the rest of the chain has finished.
///
/// Register it first so the latency covers everything after it.
pub fn trace() -> Trace {
    Trace
}

/// Middleware returned by [`trace`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn call<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.method().clone();
            let path = ctx.path().to_owned();

            let result = next.run(ctx).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(()) => {
                    let status = ctx
                        .status()
                        .unwrap_or(if ctx.body.is_empty() { 404 } else { 200 });
                    info!(%method, %path, status, latency_ms, "request");
                }
                Err(e) => warn!(%method, %path, latency_ms, error = %e, "request failed"),
            }
            result
        })
    }
}
