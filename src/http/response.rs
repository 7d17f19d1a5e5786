//! Default response encoding.
//!
//! # Responsibilities
//! - Serialize handler results and pipeline errors
//! - Pick a content type when the handler set none
//! - Terminate every body except `HEAD` with one `\n`
//!
//! # Design Decisions
//! - Error bodies are `{"code": <status>, "message": "..."}`
//! - `x-request-id` is added by `PropagateRequestIdLayer`, not here

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use serde_json::json;

use crate::pipeline::error::PipelineError;
use crate::pipeline::handler::{Answer, HandlerResult};
use crate::pipeline::method::Verb;

const JSON_CONTENT_TYPE: &str = "application/json";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Encode a successful handler result.
pub fn encode_result(result: HandlerResult, method: &Verb) -> Response<Body> {
    let (payload, content_type) = match result.answer {
        Answer::Empty => (String::new(), JSON_CONTENT_TYPE),
        Answer::Text(text) => (text, TEXT_CONTENT_TYPE),
        Answer::Json(value) => (value.to_string(), JSON_CONTENT_TYPE),
    };
    finish(result.status, result.headers, content_type, payload, method)
}

/// Encode a terminal pipeline error.
pub fn encode_error(err: &PipelineError, method: &Verb) -> Response<Body> {
    let status = err.status();
    let payload = json!({ "code": status.as_u16(), "message": err.message() }).to_string();
    finish(status, HeaderMap::new(), JSON_CONTENT_TYPE, payload, method)
}

fn finish(
    status: StatusCode,
    headers: HeaderMap,
    default_content_type: &'static str,
    mut payload: String,
    method: &Verb,
) -> Response<Body> {
    let body = if *method == Verb::Head {
        Body::empty()
    } else {
        payload.push('\n');
        Body::from(payload)
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let response_headers = response.headers_mut();
    response_headers.extend(headers);
    if !response_headers.contains_key(header::CONTENT_TYPE) {
        response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(default_content_type),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderName;
    use serde_json::Value;

    use super::*;
    use crate::pipeline::error::StageError;

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn json_answer_gets_newline_and_json_type() {
        let response = encode_result(HandlerResult::ok(json!({"ok": true})), &Verb::Post);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            JSON_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, "{\"ok\":true}\n");
    }

    #[tokio::test]
    async fn text_answer_defaults_to_plain_text() {
        let response = encode_result(HandlerResult::ok("hello"), &Verb::Get);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            TEXT_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, "hello\n");
    }

    #[tokio::test]
    async fn handler_headers_override_defaults() {
        let result = HandlerResult::new(StatusCode::CREATED, "<p>hi</p>")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/html"))
            .with_header(
                HeaderName::from_static("x-custom"),
                HeaderValue::from_static("1"),
            );
        let response = encode_result(result, &Verb::Put);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()["x-custom"], "1");
    }

    #[tokio::test]
    async fn head_responses_have_no_body() {
        let response = encode_result(HandlerResult::ok("ignored"), &Verb::Head);
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn errors_carry_code_and_message() {
        let err = PipelineError::validation(StageError::new("nope"));
        let response = encode_error(&err, &Verb::Post);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = body_string(response).await;
        assert!(body.ends_with('\n'));
        let value: Value = serde_json::from_str(body.trim_end()).unwrap();
        assert_eq!(value, json!({"code": 403, "message": "nope"}));
    }
}
