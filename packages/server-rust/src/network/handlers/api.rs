//! REST handlers: one correlated topic request per HTTP call.

use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use dossier_core::{ApiResponse, CorrelationError};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::debug;

use super::AppState;
use crate::network::routes::Route;
use crate::network::HealthState;

/// [`ApiResponse`] rendered with its own status code.
#[derive(Debug)]
pub struct ApiReply(pub ApiResponse);

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

fn bad_request(uri: &Uri, message: String) -> ApiReply {
    ApiReply(ApiResponse::failure(
        uri.path(),
        StatusCode::BAD_REQUEST.as_u16(),
        vec![message],
    ))
}

/// Path ids must be positive integers.
fn parse_id(raw: &str) -> Result<u64, String> {
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(format!("'{raw}' is not a valid id")),
    }
}

/// Request bodies must be JSON objects. An empty body reads as `{}`.
fn parse_body(raw: &[u8]) -> Result<Map<String, Value>, String> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("request body must be a JSON object".to_string()),
        Err(e) => Err(format!("malformed JSON body: {e}")),
    }
}

/// Validates the HTTP input, performs the topic request, and wraps the
/// outcome in the uniform envelope.
pub async fn call_topic(
    state: AppState,
    route: &Route,
    uri: Uri,
    raw_id: Option<String>,
    body: Bytes,
) -> ApiReply {
    if matches!(
        state.shutdown.health_state(),
        HealthState::Draining | HealthState::Stopped
    ) {
        let err = CorrelationError::TransportFailure {
            cause: "gateway is shutting down".to_string(),
        };
        return ApiReply(ApiResponse::from_error(uri.path(), &err));
    }
    let _guard = state.shutdown.in_flight_guard();

    let id = match raw_id.as_deref().map(parse_id).transpose() {
        Ok(id) => id,
        Err(message) => return bad_request(&uri, message),
    };
    let fields = if route.action.takes_body() {
        match parse_body(&body) {
            Ok(fields) => fields,
            Err(message) => return bad_request(&uri, message),
        }
    } else {
        Map::new()
    };

    let payload = route.action.payload(id, fields);
    let started = Instant::now();
    let outcome = tokio::time::timeout(
        state.config.request_timeout,
        state.client.request(&route.topic, payload, None),
    )
    .await
    .unwrap_or_else(|_elapsed| {
        Err(CorrelationError::Timeout {
            topic: route.topic.to_string(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    });
    match outcome {
        Ok(reply) => ApiReply(ApiResponse::ok(
            uri.path(),
            route.action.success_status().as_u16(),
            reply.body,
        )),
        Err(err) => {
            debug!(topic = %route.topic, status = err.status_code(), error = %err, "request failed");
            ApiReply(ApiResponse::from_error(uri.path(), &err))
        }
    }
}

/// Answers paths outside the route table.
pub async fn route_not_found(uri: Uri) -> ApiReply {
    ApiReply(ApiResponse::failure(
        uri.path(),
        StatusCode::NOT_FOUND.as_u16(),
        vec![format!("no route for '{}'", uri.path())],
    ))
}

/// Answers known paths called with a verb they do not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> ApiReply {
    ApiReply(ApiResponse::failure(
        uri.path(),
        StatusCode::METHOD_NOT_ALLOWED.as_u16(),
        vec![format!("{method} is not allowed on '{}'", uri.path())],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_positive_integers() {
        assert_eq!(parse_id("42"), Ok(42));
        assert!(parse_id("0").is_err());
        assert!(parse_id("abc").is_err());
        assert!(parse_id("-1").is_err());
    }

    #[test]
    fn bodies_must_be_objects() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert_eq!(parse_body(br#"{"name":"Acme"}"#).unwrap()["name"], "Acme");
        assert!(parse_body(b"[1]").is_err());
        assert!(parse_body(b"{not json").unwrap_err().starts_with("malformed JSON"));
    }

    #[test]
    fn reply_uses_envelope_status() {
        let reply = ApiReply(ApiResponse::failure("/api/x", 409, vec!["dup".to_string()]));
        assert_eq!(reply.into_response().status(), StatusCode::CONFLICT);
    }
}
