use super::HandlerResult;
use crate::error::ErrorKind;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use exn::ResultExt;
use strata_storage::Tier;
use strata_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;

const FILENAME_HEADER: &str = "FileName";
const STORAGE_TYPE_HEADER: &str = "StorageType";

/// Decode the base64 `FileName` header into the original filename.
fn filename(headers: &HeaderMap) -> HandlerResult<String> {
    let encoded = headers
        .get(FILENAME_HEADER)
        .ok_or_else(|| ErrorKind::bad_request("Missing FileName header"))?;
    let decoded = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|_| ErrorKind::bad_request("Invalid FileName header"))?;
    Ok(String::from_utf8(decoded).map_err(|_| ErrorKind::bad_request("Invalid FileName header"))?)
}

fn tier(headers: &HeaderMap) -> HandlerResult<Tier> {
    let value = headers.get(STORAGE_TYPE_HEADER).and_then(|value| value.to_str().ok()).unwrap_or_default();
    Ok(value.parse::<Tier>().map_err(|_| ErrorKind::bad_request("Illegal storage type"))?)
}

/// `/upload`: store the body in the requested tier, then index it.
///
/// Validation happens before anything touches the filesystem, and the index
/// is only updated once the artifact is fully written.
#[instrument(skip_all, fields(bytes = body.len(), filename, tier))]
pub(crate) async fn upload(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> HandlerResult<&'static str> {
    if body.is_empty() {
        return Err(ErrorKind::bad_request("file empty").into());
    }
    let filename = filename(&headers)?;
    let tier = tier(&headers)?;
    tracing::Span::current().record("filename", filename.as_str()).record("tier", tier.as_str());

    let path = match state.store.place(tier, &filename).await {
        Ok(path) => path,
        Err(err) if matches!(&*err, StorageErrorKind::InvalidFilename(_)) => {
            return Err(ErrorKind::bad_request("Invalid filename").into());
        },
        Err(err) => Err(err).or_raise(ErrorKind::internal)?,
    };
    state.store.write(&path, body, tier).await.or_raise(ErrorKind::internal)?;
    let info = state.store.describe(&path, &state.download_prefix).await.or_raise(ErrorKind::internal)?;
    let url = info.url.clone();
    state.index.insert(info).await.or_raise(ErrorKind::internal)?;

    tracing::info!(%url, path = %path.display(), "Upload stored");
    Ok("Success")
}
