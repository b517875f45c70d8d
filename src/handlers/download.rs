use super::HandlerResult;
use crate::error::ErrorKind;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use exn::ResultExt;
use strata_storage::error::ErrorKind as StorageErrorKind;
use strata_storage::{StorageInfo, Tier};
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Whether the client's `If-Range` validator matches the entry's current tag.
fn is_resumed(headers: &HeaderMap, etag: &str) -> bool {
    headers.get(header::IF_RANGE).is_some_and(|value| value.as_bytes() == etag.as_bytes())
}

/// Map a failed open onto the client-visible outcome.
///
/// A missing low-tier file (or an entry pointing outside both tiers) means
/// the index is stale: the client asked for something that isn't there. A
/// missing or undecodable deep-tier artifact means the index promised bytes
/// we can't produce.
fn classify(info: &StorageInfo, tier: Option<Tier>, err: &StorageErrorKind) -> ErrorKind {
    match (tier, err) {
        (Some(Tier::Low), StorageErrorKind::NotFound(_)) | (None, _) => {
            tracing::warn!(url = %info.url, path = %info.storage_path.display(), "Index entry has no low-tier file");
            ErrorKind::bad_request("file not exists")
        },
        (Some(Tier::Deep), StorageErrorKind::NotFound(_)) => {
            tracing::warn!(url = %info.url, path = %info.storage_path.display(), "Index entry has no deep-tier artifact");
            ErrorKind::internal()
        },
        _ => ErrorKind::internal(),
    }
}

/// `<download prefix><path>`: stream a stored file.
///
/// The whole file is sent in every case; a matching `If-Range` only turns the
/// status into 206.
#[instrument(skip_all, fields(url))]
pub(crate) async fn download(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> HandlerResult<Response> {
    let url = urlencoding::decode(uri.path()).map_err(|_| ErrorKind::bad_request("Invalid URL encoding"))?;
    tracing::Span::current().record("url", url.as_ref());

    let Some(info) = state.index.get_one_by_url(&url).await.or_raise(ErrorKind::internal)? else {
        tracing::info!("No index entry");
        return Err(ErrorKind::NotFound(format!("{url} not exists")).into());
    };
    let tier = state.store.tier_of(&info.storage_path);
    let opened = match state.store.open(&info.storage_path).await {
        Ok(opened) => opened,
        Err(err) => {
            let kind = classify(&info, tier, &err);
            return Err(err.raise(kind).into());
        },
    };

    let etag = info.etag();
    let resumed = is_resumed(&headers, &etag);
    let size = opened.size();
    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    match HeaderValue::from_bytes(etag.as_bytes()) {
        Ok(value) => {
            response_headers.insert(header::ETAG, value);
        },
        Err(_) => tracing::warn!(%etag, "ETag is not a valid header value, omitting it"),
    }

    let status = match resumed {
        true => StatusCode::PARTIAL_CONTENT,
        false => StatusCode::OK,
    };
    tracing::info!(?tier, size, resumed, "Serving file");
    let body = Body::from_stream(ReaderStream::new(opened.into_file()));
    Ok((status, response_headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;
    use time::UtcDateTime;

    fn info() -> StorageInfo {
        StorageInfo::new("/download/a.txt", "/srv/low/a.txt", 11, UtcDateTime::from_unix_timestamp(0).unwrap())
    }

    #[rstest]
    #[case(Some("a.txt-11-0"), true)]
    #[case(Some("\"a.txt-11-0\""), false)]
    #[case(Some("a.txt-12-0"), false)]
    #[case(None, false)]
    fn test_if_range(#[case] header_value: Option<&str>, #[case] expected: bool) {
        let mut headers = HeaderMap::new();
        if let Some(value) = header_value {
            headers.insert(header::IF_RANGE, HeaderValue::from_str(value).unwrap());
        }
        assert_eq!(is_resumed(&headers, &info().etag()), expected);
    }

    #[rstest]
    #[case(Some(Tier::Low), StorageErrorKind::NotFound(PathBuf::new()), StatusCode::BAD_REQUEST)]
    #[case(Some(Tier::Deep), StorageErrorKind::NotFound(PathBuf::new()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(None, StorageErrorKind::OutsideTiers(PathBuf::new()), StatusCode::BAD_REQUEST)]
    #[case(Some(Tier::Low), StorageErrorKind::PermissionDenied(PathBuf::new()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Some(Tier::Deep), StorageErrorKind::Task, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_open_failures(#[case] tier: Option<Tier>, #[case] err: StorageErrorKind, #[case] expected: StatusCode) {
        assert_eq!(classify(&info(), tier, &err).status(), expected);
    }
}
