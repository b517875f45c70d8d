use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::any;
use tower_http::trace::TraceLayer;

/// Build the service router.
///
/// | Route                        | Handler                 |
/// |------------------------------|-------------------------|
/// | `/`                          | listing page            |
/// | `/upload`                    | store a file            |
/// | `/delete?url=…`              | remove a file           |
/// | `<download prefix>…`         | stream a file           |
/// | anything else                | 404 `Not Found`         |
///
/// Routes accept any method; handlers enforce their own method rules.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let download = format!("{}*path", state.download_prefix);
    Router::new()
        .route("/", any(handlers::list))
        .route("/upload", any(handlers::upload).layer(DefaultBodyLimit::max(max_upload_bytes)))
        .route("/delete", any(handlers::delete))
        .route(&download, any(handlers::download))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
