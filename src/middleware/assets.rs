use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use http::header::{CACHE_CONTROL, LAST_MODIFIED};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::body::Body;
use crate::compose::Next;
use crate::context::Context;
use crate::error::Result;
use crate::handler::{BoxFuture, Middleware};
use crate::response::ContentType;
use crate::status::Status;

/// Serves files below `root`.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use ply::{App, Config, middleware};
///
/// let app = App::new(Config::default())
///     .with(middleware::assets("public").max_age(Duration::from_secs(3600)));
/// ```
pub fn assets(root: impl Into<PathBuf>) -> Assets {
    Assets::new(root)
}

/// Static-file middleware returned by [`assets`].
///
/// A request whose path names a regular file is answered with the file as a
/// streamed body and its `Last-Modified` time. Directories, missing files and
/// any path with a segment starting with `.` fall through to the next
/// middleware. A file that exists but cannot be opened answers 404 or 500
/// with the plain reason phrase.
#[derive(Clone, Debug)]
pub struct Assets {
    root: PathBuf,
    max_age: Option<Duration>,
}

impl Assets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), max_age: None }
    }

    /// Adds `Cache-Control: max-age=<secs>` to served files.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age).filter(|d| !d.is_zero());
        self
    }

    /// The file `path` refers to, unless it is hidden.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|segment| segment.starts_with('.')) {
            return None;
        }
        Some(self.root.join(relative))
    }

    async fn serve(&self, ctx: &mut Context, file_path: &Path, modified: Option<SystemTime>) -> Result<()> {
        let file = match tokio::fs::File::open(file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!(path = %file_path.display(), "failed to open asset: {e}");
                ctx.set_status(open_failure_status(&e));
                return Ok(());
            }
        };

        if let Some(modified) = modified {
            ctx.res_mut().set_header(LAST_MODIFIED, &http_date(modified))?;
        }
        if let Some(max_age) = self.max_age {
            ctx.res_mut()
                .set_header(CACHE_CONTROL, &format!("max-age={}", max_age.as_secs()))?;
        }
        if let Some(content_type) = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ContentType::lookup)
        {
            ctx.set_type(content_type.as_str());
        }
        ctx.set_status(Status::Ok);
        ctx.body = Body::stream(ReaderStream::new(file));
        Ok(())
    }
}

impl Middleware for Assets {
    fn call<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some(file_path) = self.resolve(ctx.path()) else {
                return next.run(ctx).await;
            };
            match tokio::fs::metadata(&file_path).await {
                Ok(meta) if meta.is_file() => {
                    self.serve(ctx, &file_path, meta.modified().ok()).await
                }
                _ => next.run(ctx).await,
            }
        })
    }
}

fn open_failure_status(e: &io::Error) -> Status {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Status::NotFound,
        _ => Status::InternalServerError,
    }
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
