//! Path-based request router.
//!
//! A [`Router`] is an ordinary middleware. Rules are tried in registration
//! order and the first whose method and pattern both match wins; there is no
//! specificity-based reordering. A match runs the rule's handler with the
//! outer `next` as its tail, so a handler that runs `next` falls through to
//! whatever was registered after the router. No match falls straight through.

use http::Method;
use matchit::Router as MatchitRouter;
use tracing::trace;

use crate::compose::{Next, compose};
use crate::context::{Context, Params};
use crate::error::Result;
use crate::handler::{BoxFuture, BoxedMiddleware, Middleware};

/// One registered route.
struct Rule {
    method: Method,
    pattern: String,
    // Single-route tree: matchit does segment matching and parameter
    // extraction, the rule list keeps the ordering.
    matcher: MatchitRouter<()>,
    handler: BoxedMiddleware,
}

impl Rule {
    fn matches(&self, path: &str) -> Option<Params> {
        let found = self.matcher.at(path).or_else(|_| {
            let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty());
            self.matcher.at(trimmed.unwrap_or(path))
        });
        let matched = found.ok()?;
        Some(
            matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

/// The application router.
///
/// Build it once at startup and plug it in with [`App::with`](crate::App::with).
/// Every registration returns `self` so calls chain naturally.
///
/// Patterns are case-sensitive and made of literal segments, `:name`
/// parameters and an optional trailing `*name` catch-all:
///
/// ```rust
/// use ply::{Method, Middleware, Router, endpoint, from_fn};
///
/// let auth = from_fn(|ctx, mut next| Box::pin(async move { next.run(ctx).await }));
/// let files = endpoint(|ctx| { ctx.set_body("file"); Ok(()) });
/// let login = endpoint(|ctx| ctx.json(&serde_json::json!({ "code": 200, "message": "ok" })));
///
/// Router::new()
///     .add("/", endpoint(|ctx| { ctx.set_body("hello,world"); Ok(()) }))
///     .route("/login", Method::POST, login)
///     .route_chain("/files/*rest", Method::GET, [auth.boxed(), files.boxed()]);
/// ```
#[derive(Default)]
pub struct Router {
    rules: Vec<Rule>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` + `pattern`. See
    /// [`route_chain`](Router::route_chain) for several handlers.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid route pattern.
    pub fn route(mut self, pattern: &str, method: Method, handler: impl Middleware) -> Self {
        let mut matcher = MatchitRouter::new();
        matcher
            .insert(to_matchit(pattern), ())
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
        self.rules.push(Rule {
            method,
            pattern: pattern.to_owned(),
            matcher,
            handler: handler.boxed(),
        });
        self
    }

    /// Registers several handlers for one rule, run in order as a single
    /// chain whose tail is the router's own `next`.
    pub fn route_chain(
        self,
        pattern: &str,
        method: Method,
        handlers: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Self {
        self.route(pattern, method, compose(handlers))
    }

    /// Registers a `GET` route, the default method.
    pub fn add(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::GET, handler)
    }

    pub fn get(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::GET, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::POST, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::PUT, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::PATCH, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Middleware) -> Self {
        self.route(pattern, Method::DELETE, handler)
    }

    pub fn len(&self) -> usize { self.rules.len() }

    pub fn is_empty(&self) -> bool { self.rules.is_empty() }

    /// First rule, in registration order, matching `method` and `path`.
    fn lookup(&self, method: &Method, path: &str) -> Option<(&Rule, Params)> {
        self.rules
            .iter()
            .filter(|rule| rule.method == *method)
            .find_map(|rule| rule.matches(path).map(|params| (rule, params)))
    }
}

impl Middleware for Router {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        match self.lookup(ctx.method(), ctx.path()) {
            Some((rule, params)) => {
                trace!(method = %rule.method, pattern = %rule.pattern, "route matched");
                ctx.set_params(params);
                rule.handler.call(ctx, next)
            }
            None => Box::pin(async move {
                let mut next = next;
                next.run(ctx).await
            }),
        }
    }
}

/// Rewrites `:name` / `*name` segments into matchit's `{name}` / `{*name}`.
fn to_matchit(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
                format!("{{*{name}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use crate::handler::{endpoint, from_fn};

    fn body(text: &'static str) -> impl Middleware {
        endpoint(move |ctx| {
            ctx.set_body(text);
            Ok(())
        })
    }

    fn text(ctx: &Context) -> Option<&str> {
        match &ctx.body {
            crate::Body::Text(s) => Some(s),
            _ => None,
        }
    }

    #[test]
    fn pattern_rewrite() {
        assert_eq!(to_matchit("/users/:id"), "/users/{id}");
        assert_eq!(to_matchit("/a/:x/b/:y"), "/a/{x}/b/{y}");
        assert_eq!(to_matchit("/static/*path"), "/static/{*path}");
        assert_eq!(to_matchit("/"), "/");
    }

    #[tokio::test]
    async fn extracts_named_params() {
        let router = Router::new().add("/users/:id", body("user"));
        let mut ctx = context(Method::GET, "/users/42");

        router.call(&mut ctx, Next::done()).await.unwrap();

        assert_eq!(ctx.param("id"), Some("42"));
        assert_eq!(text(&ctx), Some("user"));
    }

    #[tokio::test]
    async fn first_match_wins() {
        let router = Router::new()
            .add("/users/:id", body("r1"))
            .add("/users/me", body("r2"));
        let mut ctx = context(Method::GET, "/users/me");

        router.call(&mut ctx, Next::done()).await.unwrap();

        assert_eq!(text(&ctx), Some("r1"));
    }

    #[tokio::test]
    async fn method_must_match_exactly() {
        let router = Router::new().route("/login", Method::POST, body("login"));

        let mut ctx = context(Method::GET, "/login");
        router.call(&mut ctx, Next::done()).await.unwrap();
        assert!(ctx.body.is_empty());
        assert!(ctx.params().is_none());

        let mut ctx = context(Method::POST, "/login");
        router.call(&mut ctx, Next::done()).await.unwrap();
        assert_eq!(text(&ctx), Some("login"));
    }

    #[tokio::test]
    async fn paths_are_case_sensitive() {
        let router = Router::new().add("/about", body("about"));
        let mut ctx = context(Method::GET, "/About");
        router.call(&mut ctx, Next::done()).await.unwrap();
        assert!(ctx.body.is_empty());
    }

    #[tokio::test]
    async fn trailing_slash_is_tolerated() {
        let router = Router::new().add("/login", body("login"));
        let mut ctx = context(Method::GET, "/login/");
        router.call(&mut ctx, Next::done()).await.unwrap();
        assert_eq!(text(&ctx), Some("login"));
    }

    #[tokio::test]
    async fn catch_all_captures_the_rest() {
        let router = Router::new().add("/static/*path", body("file"));
        let mut ctx = context(Method::GET, "/static/css/site.css");
        router.call(&mut ctx, Next::done()).await.unwrap();
        assert_eq!(ctx.param("path"), Some("css/site.css"));
    }

    #[tokio::test]
    async fn unmatched_calls_through() {
        let router = Router::new().add("/a", body("a"));
        let chain = compose([router.boxed(), body("fallback").boxed()]);
        let mut ctx = context(Method::GET, "/b");

        chain.run(&mut ctx, None).await.unwrap();

        assert_eq!(text(&ctx), Some("fallback"));
    }

    #[tokio::test]
    async fn matched_handler_may_fall_through() {
        let pass = from_fn(|ctx, mut next| {
            Box::pin(async move {
                ctx.state.insert("seen", true);
                next.run(ctx).await
            })
        });
        let router = Router::new().add("/", pass);
        let chain = compose([router.boxed(), body("after").boxed()]);
        let mut ctx = context(Method::GET, "/");

        chain.run(&mut ctx, None).await.unwrap();

        assert_eq!(ctx.state.get::<bool>("seen"), Some(&true));
        assert_eq!(text(&ctx), Some("after"));
    }

    #[tokio::test]
    async fn chained_handlers_run_in_order() {
        let auth = from_fn(|ctx, mut next| {
            Box::pin(async move {
                ctx.state.insert("user", String::from("alice"));
                next.run(ctx).await
            })
        });
        let greet = endpoint(|ctx| {
            let user = ctx.state.get::<String>("user").cloned().unwrap_or_default();
            ctx.set_body(format!("hi {user}"));
            Ok(())
        });
        let router = Router::new().route_chain("/me", Method::GET, [auth.boxed(), greet.boxed()]);
        let mut ctx = context(Method::GET, "/me");

        router.call(&mut ctx, Next::done()).await.unwrap();

        assert_eq!(text(&ctx), Some("hi alice"));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn invalid_pattern_panics() {
        let _ = Router::new().add("/files/*rest/more", body("x"));
    }
}
