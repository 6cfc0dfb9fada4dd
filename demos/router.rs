//! Routing example: JSON endpoints, a redirect, a rendered page and static
//! files from `./public`.
//!
//! Run with:
//!   PLY_ENV=development RUST_LOG=ply=trace,info cargo run --example router
//!
//! Try:
//!   curl http://localhost:8080/
//!   curl -X POST http://localhost:8080/login -d 'user=alice'
//!   curl http://localhost:8080/users/42
//!   curl -i http://localhost:8080/old
//!   curl http://localhost:8080/page/about
//!   curl http://localhost:8080/boom

use std::time::Instant;

use ply::{App, Config, Error, Method, Router, Status, endpoint, from_fn, middleware};
use serde_json::{Value, json};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .add("/", endpoint(|ctx| {
            ctx.set_body("hello,world");
            Ok(())
        }))
        .route("/login", Method::POST, endpoint(|ctx| {
            ctx.json(&json!({ "code": 200, "message": "ok" }))
        }))
        .get("/users/:id", endpoint(|ctx| {
            let id = ctx.param("id").unwrap_or("unknown").to_owned();
            let elapsed = ctx
                .state
                .get::<Instant>("started")
                .map(|t| t.elapsed().as_micros() as u64)
                .unwrap_or_default();
            ctx.json(&json!({ "id": id, "name": "alice", "elapsed_us": elapsed }))
        }))
        .get("/old", endpoint(|ctx| ctx.redirect_with("/", Status::Found)))
        .get("/page/:name", endpoint(|ctx| {
            let name = ctx.param("name").unwrap_or("index").to_owned();
            ctx.render(&name, &json!({ "title": name }))
        }))
        .get("/boom", endpoint(|_ctx| {
            Err(Error::http(Status::ServiceUnavailable, "database offline"))
        }));

    let started = from_fn(|ctx, mut next| {
        Box::pin(async move {
            ctx.state.insert("started", Instant::now());
            next.run(ctx).await
        })
    });

    let config = Config::from_env();
    let addr = config.addr.clone();

    App::new(config)
        .with(middleware::trace())
        .with(started)
        .with(middleware::view(render))
        .with(middleware::assets("public"))
        .with(router)
        .listen(&addr)
        .await
        .expect("server error");
}

fn render(name: &str, data: &Value) -> ply::Result<String> {
    let title = data["title"].as_str().unwrap_or(name);
    Ok(format!("<!doctype html><title>{title}</title><h1>{title}</h1>"))
}
