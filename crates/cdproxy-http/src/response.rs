//! Response construction and error formatting.
//!
//! Error bodies follow the upstream API gateway conventions: `400`, `404` and
//! `500` are empty, while `401`, `403` and `405` carry a JSON `detail`:
//!
//! ```json
//! {"detail": "Required scope not given."}
//! ```

use cdproxy_backend::FetchedObject;
use cdproxy_core::{ProxyError, SCOPE_DENIED_MESSAGE};
use http::header::{self, HeaderValue};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::body::ProxyResponseBody;

/// Content type for JSON responses.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Characters allowed unescaped in an RFC 5987 `filename*` value.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Serialize a `{"detail": ...}` error body.
#[must_use]
pub fn detail_json(detail: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({ "detail": detail }))
        .expect("JSON serialization of a string cannot fail")
}

/// Convert a [`ProxyError`] into a complete HTTP error response.
#[must_use]
pub fn error_to_response(err: &ProxyError) -> http::Response<ProxyResponseBody> {
    let detail = match err {
        ProxyError::Unauthorized(msg) => Some(msg.clone()),
        ProxyError::Forbidden => Some(SCOPE_DENIED_MESSAGE.to_owned()),
        ProxyError::MethodNotAllowed(method) => Some(format!("Method \"{method}\" not allowed.")),
        _ => None,
    };

    let mut builder = http::Response::builder().status(err.status_code());
    if matches!(err, ProxyError::MethodNotAllowed(_)) {
        builder = builder.header(header::ALLOW, "GET");
    }

    let body = match detail {
        Some(detail) => {
            builder = builder.header(header::CONTENT_TYPE, JSON_CONTENT_TYPE);
            ProxyResponseBody::from_bytes(detail_json(&detail))
        }
        None => ProxyResponseBody::empty(),
    };

    builder.body(body).unwrap_or_else(|_| {
        http::Response::builder()
            .status(http::StatusCode::INTERNAL_SERVER_ERROR)
            .body(ProxyResponseBody::empty())
            .expect("static response should be valid")
    })
}

/// Liveness response for `GET /status/`.
#[must_use]
pub fn status_response() -> http::Response<ProxyResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(ProxyResponseBody::from_string(r#"{"status":"online"}"#))
        .expect("static status response should be valid")
}

/// Build the download response for a fetched object.
///
/// The backend's success status and relayed headers are kept, and
/// `Content-Disposition` always marks the body as an attachment named
/// `filename`.
#[must_use]
pub fn attachment_response(
    object: FetchedObject,
    filename: &str,
) -> http::Response<ProxyResponseBody> {
    let FetchedObject {
        status,
        body,
        headers,
    } = object;

    let mut response = http::Response::new(ProxyResponseBody::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, content_disposition(filename));
    response
}

/// Format a `Content-Disposition: attachment` header value.
///
/// Printable ASCII names are quoted; anything else is sent as an RFC 5987
/// `filename*` parameter.
#[must_use]
pub fn content_disposition(filename: &str) -> HeaderValue {
    if filename.is_empty() {
        return HeaderValue::from_static("attachment");
    }

    let value = if filename.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) {
        let escaped = filename.replace('\\', "\\\\").replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(filename, ATTR_CHAR)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
