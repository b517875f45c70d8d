use super::HandlerResult;
use crate::error::ErrorKind;
use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use exn::ResultExt;
use strata_render::Listed;
use tracing::instrument;

/// `/`: the listing page, one row per index entry in insertion order.
#[instrument(skip_all)]
pub(crate) async fn list(State(state): State<AppState>) -> HandlerResult<impl IntoResponse> {
    let entries = state.index.get_all().await.or_raise(ErrorKind::internal)?;
    let listed = entries
        .iter()
        .map(|info| Listed { info, tier: state.store.tier_of(&info.storage_path) })
        .collect::<Vec<_>>();
    let html = state.renderer.render(&listed, &state.public_url).or_raise(ErrorKind::internal)?;
    tracing::debug!(files = listed.len(), "Rendered listing");
    Ok(([(header::CONTENT_TYPE, "text/html;charset=utf-8")], html))
}
