//! Turning a settled context into the terminal write.
//!
//! [`respond`] runs when the middleware chain completed; [`fail`] when it
//! failed. Both are no-ops on a response that is no longer writable, so
//! whichever runs second (or a redirect that already ended the response)
//! never writes twice.

use http::Method;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, TRANSFER_ENCODING};
use tracing::{debug, error};

use crate::body::Body;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::response::{ContentType, default_content_type, set_content_length};
use crate::status;

/// Writes the response described by `ctx.status`, `ctx.type` and `ctx.body`.
///
/// Fails with [`Error::InvalidStatusCode`] when the resolved status is not a
/// registered one; the caller routes that to [`fail`].
pub fn respond(ctx: &mut Context) -> Result<()> {
    if !ctx.writable() {
        debug!(path = %ctx.path(), "response already finished, skipping resolve");
        return Ok(());
    }

    let body = std::mem::take(&mut ctx.body);
    let code = ctx
        .status()
        .unwrap_or(if body.is_empty() { 404 } else { 200 });

    if !status::is_known(code) {
        return Err(Error::InvalidStatusCode(code));
    }

    if status::is_empty_body(code) {
        let res = ctx.res_mut();
        res.remove_header(CONTENT_TYPE)?;
        res.remove_header(CONTENT_LENGTH)?;
        res.remove_header(TRANSFER_ENCODING)?;
        res.set_status(code);
        res.end();
        return Ok(());
    }

    ctx.res_mut().set_status(code);

    if ctx.method() == Method::HEAD {
        ctx.res_mut().end();
        return Ok(());
    }

    match body {
        Body::Empty => {
            let message = status::message_for(code);
            let res = ctx.res_mut();
            if !res.headers_sent() {
                res.set_header(CONTENT_TYPE, ContentType::Text.as_str())?;
                set_content_length(res, message.len())?;
            }
            res.end_with(message);
        }
        Body::Text(text) => {
            if !ctx.res().headers_sent() {
                let content_type = negotiated_type(ctx, ContentType::Text);
                let res = ctx.res_mut();
                default_content_type(res, &content_type)?;
                set_content_length(res, text.len())?;
            }
            ctx.res_mut().end_with(text);
        }
        Body::Bytes(bytes) => {
            let res = ctx.res_mut();
            if !res.headers_sent() {
                default_content_type(res, ContentType::OctetStream.as_str())?;
                set_content_length(res, bytes.len())?;
            }
            res.end_with(bytes);
        }
        Body::Stream(stream) => {
            if !ctx.res().headers_sent() {
                let content_type = negotiated_type(ctx, ContentType::OctetStream);
                let res = ctx.res_mut();
                default_content_type(res, &content_type)?;
                res.remove_header(CONTENT_LENGTH)?;
            }
            ctx.res_mut().pipe(stream);
        }
        Body::Json(value) => {
            let text = serde_json::to_string(&value)?;
            let res = ctx.res_mut();
            if !res.headers_sent() {
                res.set_header(CONTENT_TYPE, ContentType::Json.as_str())?;
            }
            res.end_with(text);
        }
    }
    Ok(())
}

/// The error boundary: answers `err` with a best-effort error response.
///
/// Outside development mode the body is the reason phrase of the status and
/// nothing from `err` reaches the client.
pub fn fail(ctx: &mut Context, err: Error) {
    if matches!(err, Error::ConnectionClosed) {
        debug!(method = %ctx.method(), path = %ctx.path(), "client closed the connection");
    } else {
        error!(method = %ctx.method(), path = %ctx.path(), error = %err, "request failed");
    }

    if !ctx.writable() {
        debug!(path = %ctx.path(), "response already finished, dropping error");
        return;
    }

    let code = err.status().filter(|c| status::is_known(*c)).unwrap_or(500);
    let message = if ctx.app().config().env.is_development() {
        err.diagnostic()
    } else {
        status::message_for(code)
    };

    let content_type = ctx
        .content_type()
        .unwrap_or(ContentType::Text.as_str())
        .to_owned();
    let res = ctx.res_mut();
    if !res.headers_sent() {
        if let Err(e) = default_content_type(res, &content_type) {
            debug!(content_type = %content_type, "falling back to text/plain: {e}");
            res.insert_header(CONTENT_TYPE, HeaderValue::from_static(ContentType::Text.as_str()));
        }
        res.insert_header(CONTENT_LENGTH, HeaderValue::from(message.len()));
    }
    res.set_status(code);
    res.clear_reason();
    res.end_with(message);
}

/// `ctx.type` through the extension table, else verbatim, else `fallback`.
fn negotiated_type(ctx: &Context, fallback: ContentType) -> String {
    match ctx.content_type() {
        Some(t) => ContentType::lookup(t).map_or_else(|| t.to_owned(), |c| c.as_str().to_owned()),
        None => fallback.as_str().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::BodyExt;

    use super::*;
    use crate::context::tests::context;

    async fn body_of(ctx: Context) -> (http::response::Parts, Bytes) {
        let (parts, body) = ctx.into_reply().into_response().into_parts();
        (parts, body.collect().await.unwrap().to_bytes())
    }

    #[tokio::test]
    async fn empty_body_is_not_found_with_reason() {
        let mut ctx = context(Method::GET, "/");
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 404);
        assert_eq!(body, "Not Found");
        assert_eq!(parts.headers[CONTENT_LENGTH], "9");
        assert_eq!(parts.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn no_content_statuses_strip_everything() {
        for code in [204u16, 205, 304] {
            let mut ctx = context(Method::GET, "/");
            ctx.res_mut().set_header(CONTENT_TYPE, "text/html").unwrap();
            ctx.res_mut().set_header(TRANSFER_ENCODING, "chunked").unwrap();
            ctx.set_status(code);
            ctx.set_body("ignored");
            respond(&mut ctx).unwrap();
            let (parts, body) = body_of(ctx).await;

            assert_eq!(parts.status, code);
            assert!(body.is_empty());
            assert!(!parts.headers.contains_key(CONTENT_TYPE));
            assert!(!parts.headers.contains_key(CONTENT_LENGTH));
            assert!(!parts.headers.contains_key(TRANSFER_ENCODING));
        }
    }

    #[tokio::test]
    async fn head_requests_have_no_body() {
        let mut ctx = context(Method::HEAD, "/");
        ctx.set_body("hello");
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 200);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn text_uses_type_lookup() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_type("html");
        ctx.set_body("<p>hi</p>");
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(parts.headers[CONTENT_LENGTH], "9");
        assert_eq!(body, "<p>hi</p>");
    }

    #[tokio::test]
    async fn text_keeps_unknown_type_verbatim() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_type("application/vnd.custom+json");
        ctx.set_body("{}");
        respond(&mut ctx).unwrap();
        let (parts, _) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "application/vnd.custom+json");
    }

    #[tokio::test]
    async fn bytes_default_to_octet_stream() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_body(vec![1u8, 2, 3]);
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(parts.headers[CONTENT_LENGTH], "3");
        assert_eq!(&body[..], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn bytes_keep_an_explicit_header() {
        let mut ctx = context(Method::GET, "/");
        ctx.res_mut().set_header(CONTENT_TYPE, "image/png").unwrap();
        ctx.set_body(Bytes::from_static(b"\x89PNG"));
        respond(&mut ctx).unwrap();
        let (parts, _) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "image/png");
    }

    #[tokio::test]
    async fn streams_drop_content_length() {
        let chunks = futures_util::stream::iter([
            Ok(Bytes::from_static(b"hello,")),
            Ok(Bytes::from_static(b"stream")),
        ]);
        let mut ctx = context(Method::GET, "/");
        ctx.res_mut().set_header(CONTENT_LENGTH, "99").unwrap();
        ctx.set_body(Body::stream(chunks));
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "application/octet-stream");
        assert!(!parts.headers.contains_key(CONTENT_LENGTH));
        assert_eq!(body, "hello,stream");
    }

    #[tokio::test]
    async fn structured_data_is_json() {
        let mut ctx = context(Method::POST, "/login");
        ctx.json(&serde_json::json!({ "code": 200, "message": "ok" })).unwrap();
        respond(&mut ctx).unwrap();
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 200);
        assert_eq!(parts.headers[CONTENT_TYPE], "application/json");
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({ "code": 200, "message": "ok" }));
    }

    #[tokio::test]
    async fn invalid_status_is_rejected() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_status(299u16);
        assert!(matches!(respond(&mut ctx), Err(Error::InvalidStatusCode(299))));
    }

    #[tokio::test]
    async fn respond_twice_is_a_no_op() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_body("first");
        respond(&mut ctx).unwrap();
        ctx.set_body("second");
        respond(&mut ctx).unwrap();
        let (_, body) = body_of(ctx).await;

        assert_eq!(body, "first");
    }

    #[tokio::test]
    async fn fail_hides_detail_in_production() {
        let mut ctx = context(Method::GET, "/");
        fail(&mut ctx, Error::other("secret internal detail"));
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 500);
        assert_eq!(body, "Internal Server Error");
        assert_eq!(parts.headers[CONTENT_LENGTH], "21");
    }

    #[tokio::test]
    async fn fail_uses_declared_status() {
        let mut ctx = context(Method::GET, "/admin");
        fail(&mut ctx, Error::http(crate::Status::Forbidden, "not an admin"));
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 403);
        assert_eq!(body, "Forbidden");
    }

    #[tokio::test]
    async fn fail_ignores_unknown_declared_status() {
        let mut ctx = context(Method::GET, "/");
        fail(&mut ctx, Error::Http { status: 1000, message: "nonsense".into() });
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 500);
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn fail_falls_back_from_an_unusable_type() {
        let mut ctx = context(Method::GET, "/");
        ctx.set_type("text/\nbroken");
        fail(&mut ctx, Error::other("boom"));
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(parts.headers[CONTENT_LENGTH], "21");
        assert_eq!(body, "Internal Server Error");
    }

    #[tokio::test]
    async fn fail_drops_a_custom_reason() {
        let mut ctx = context(Method::GET, "/");
        ctx.res_mut().set_reason("Redirect 301");
        fail(&mut ctx, Error::other("boom"));
        let (parts, _) = body_of(ctx).await;

        assert_eq!(parts.status, 500);
        assert!(parts.extensions.get::<hyper::ext::ReasonPhrase>().is_none());
    }

    #[tokio::test]
    async fn fail_after_finish_is_a_no_op() {
        let mut ctx = context(Method::GET, "/");
        ctx.redirect("/elsewhere").unwrap();
        fail(&mut ctx, Error::other("late"));
        let (parts, body) = body_of(ctx).await;

        assert_eq!(parts.status, 301);
        assert!(body.is_empty());
    }
}
