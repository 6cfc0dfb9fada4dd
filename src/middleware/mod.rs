//! Built-in middleware.
//!
//! - [`trace()`] — one log event per request with method, path, status, latency
//! - [`assets()`] — static files under a root directory, streamed
//! - [`view()`] — installs a [`ViewEngine`] so handlers can `ctx.render(..)`
//!
//! Each is an ordinary [`Middleware`](crate::Middleware); register them with
//! [`App::with`](crate::App::with) in the order they should run.

mod assets;
mod trace;
mod view;

pub use assets::{Assets, assets};
pub use trace::{Trace, trace};
pub use view::{View, ViewEngine, view};
