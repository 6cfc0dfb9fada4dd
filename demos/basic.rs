//! Minimal ply example: one endpoint answering every request.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:8080/
//!   curl -I http://localhost:8080/

use ply::{App, Config, endpoint, middleware};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    let addr = config.addr.clone();

    App::new(config)
        .with(middleware::trace())
        .with(endpoint(|ctx| {
            ctx.set_body("hello,world");
            Ok(())
        }))
        .listen(&addr)
        .await
        .expect("server error");
}
