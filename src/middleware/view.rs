use std::sync::Arc;

use serde_json::Value;

use crate::body::Body;
use crate::compose::Next;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::{BoxFuture, Middleware};
use crate::response::ContentType;
use crate::status::Status;

const ENGINE_KEY: &str = "ply.view";

/// A template engine: renders the template `name` with `data`.
///
/// Implemented for plain closures, so a tiny engine needs no type of its own:
///
/// ```rust
/// use ply::middleware;
///
/// let view = middleware::view(|name: &str, data: &serde_json::Value| -> ply::Result<String> {
///     Ok(format!("<h1>{name}: {}</h1>", data["title"]))
/// });
/// ```
pub trait ViewEngine: Send + Sync + 'static {
    fn render(&self, name: &str, data: &Value) -> Result<String>;
}

impl<F> ViewEngine for F
where
    F: Fn(&str, &Value) -> Result<String> + Send + Sync + 'static,
{
    fn render(&self, name: &str, data: &Value) -> Result<String> {
        self(name, data)
    }
}

#[derive(Clone)]
struct Engine(Arc<dyn ViewEngine>);

/// Installs `engine` for every request passing through.
pub fn view(engine: impl ViewEngine) -> View {
    View { engine: Arc::new(engine) }
}

/// Middleware returned by [`view`].
pub struct View {
    engine: Arc<dyn ViewEngine>,
}

impl Middleware for View {
    fn call<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        ctx.state.insert(ENGINE_KEY, Engine(Arc::clone(&self.engine)));
        Box::pin(async move { next.run(ctx).await })
    }
}

impl Context {
    /// Renders `name` with the installed [`ViewEngine`] into an HTML body
    /// with status 200.
    ///
    /// Fails with [`Error::View`] when no [`view`] middleware ran before.
    pub fn render(&mut self, name: &str, data: &Value) -> Result<()> {
        let Engine(engine) = self
            .state
            .get::<Engine>(ENGINE_KEY)
            .cloned()
            .ok_or_else(|| Error::View("no view engine installed".to_owned()))?;
        let html = engine.render(name, data)?;
        self.set_type(ContentType::Html.as_str());
        self.set_status(Status::Ok);
        self.body = Body::Text(html);
        Ok(())
    }
}
