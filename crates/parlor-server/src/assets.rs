//! Static asset serving.

use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};

/// Routes serving `index.html` at `/` and any other file in `static_dir`
/// as the fallback. Missing files yield 404.
pub fn routes<S>(static_dir: &Path) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .fallback_service(ServeDir::new(static_dir))
}
