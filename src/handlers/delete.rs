use crate::error::{ErrorKind, Rejection, Result};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use strata_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteParams {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Outcome {
    #[serde(skip)]
    code: StatusCode,
    status: &'static str,
    message: &'static str,
}
impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match serde_json::to_string(&self) {
            Ok(body) => (self.code, [(header::CONTENT_TYPE, "application/json;charset=utf-8")], body).into_response(),
            Err(_) => self.code.into_response(),
        }
    }
}
const DELETED: Outcome = Outcome {
    code: StatusCode::OK,
    status: "success",
    message: "file deleted",
};
const FAILED: Outcome = Outcome {
    code: StatusCode::INTERNAL_SERVER_ERROR,
    status: "error",
    message: "file deletion failed",
};

/// Drop the index entry for `url`, then unlink its file.
///
/// The entry goes first: a crash in between leaves an orphaned file rather
/// than an entry promising bytes that no longer exist. A file that is
/// already gone counts as removed.
async fn remove_entry(state: &AppState, url: &str) -> Result<bool> {
    let Some(info) = state.index.get_one_by_url(url).await.or_raise(ErrorKind::internal)? else {
        tracing::info!("No index entry");
        return Ok(false);
    };
    if !state.index.delete_by_url(url).await.or_raise(ErrorKind::internal)? {
        tracing::warn!("Index entry vanished before it could be removed");
        return Ok(false);
    }
    match state.store.remove(&info.storage_path).await {
        Ok(()) => Ok(true),
        Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
            tracing::warn!(path = %info.storage_path.display(), "File was already missing");
            Ok(true)
        },
        Err(err) => Err(err.raise(ErrorKind::internal())),
    }
}

/// `/delete?url=<url>` (POST only).
#[instrument(skip_all, fields(url))]
pub(crate) async fn delete(
    State(state): State<AppState>,
    method: Method,
    params: Option<Query<DeleteParams>>,
) -> std::result::Result<Response, Rejection> {
    if method != Method::POST {
        return Err(ErrorKind::bad_request("Bad Request: Method not allowed").into());
    }
    let Some(url) = params.and_then(|Query(params)| params.url).filter(|url| !url.is_empty()) else {
        return Err(ErrorKind::bad_request("Bad Request: Missing file URL").into());
    };
    tracing::Span::current().record("url", url.as_str());

    let outcome = match remove_entry(&state, &url).await {
        Ok(true) => {
            tracing::info!("File deleted");
            DELETED
        },
        Ok(false) => FAILED,
        Err(err) => {
            tracing::error!(error = ?err, "Delete failed");
            FAILED
        },
    };
    Ok(outcome.into_response())
}
