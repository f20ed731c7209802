use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use epidemic_mesh::GossipError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    #[serde(rename = "type")]
    error_type: &'static str,
    code: &'a str,
    message: &'a str,
}

pub const HEADER_X_EPIDEMIC_ERROR_CODE: &str = "X-Epidemic-Error-Code";

pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_REQUEST, code, message)
}

pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::BAD_GATEWAY, code, message)
}

pub fn service_unavailable(code: impl Into<String>, message: impl Into<String>) -> Response {
    create_error(StatusCode::SERVICE_UNAVAILABLE, code, message)
}

pub fn create_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
) -> Response {
    let code_str = code.into();
    let message_str = message.into();

    let mut headers = HeaderMap::with_capacity(1);
    if let Ok(val) = HeaderValue::from_str(&code_str) {
        headers.insert(HEADER_X_EPIDEMIC_ERROR_CODE, val);
    }

    (
        status,
        headers,
        Json(ErrorResponse {
            error: ErrorDetail {
                error_type: status
                    .canonical_reason()
                    .unwrap_or("Unknown Status Code"),
                code: &code_str,
                message: &message_str,
            },
        }),
    )
        .into_response()
}

/// Map a gossip failure to its HTTP response.
pub fn from_gossip_error(err: &GossipError) -> Response {
    match err {
        GossipError::NoPeerAvailable => service_unavailable("no_peer_available", err.to_string()),
        GossipError::DeliveryFailure { .. } => bad_gateway("delivery_failed", err.to_string()),
        GossipError::MalformedMessage(_) => bad_request("malformed_message", err.to_string()),
    }
}

pub fn extract_error_code_from_response<B>(response: &Response<B>) -> &str {
    response
        .headers()
        .get(HEADER_X_EPIDEMIC_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
