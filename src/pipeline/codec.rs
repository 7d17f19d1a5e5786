//! Body codecs keyed by content type.
//!
//! The registry picks a codec from the media type of the `content-type`
//! header (parameters such as `charset` are ignored). A request without a
//! content type is treated as JSON. Unknown media types fall back to the
//! text codec.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

pub const JSON: &str = "application/json";
pub const FORM: &str = "application/x-www-form-urlencoded";
pub const TEXT: &str = "text/plain";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("{0}")]
    Custom(String),
}

/// Turns a raw request body into a structured value.
pub trait Codec: Send + Sync + 'static {
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        Ok(serde_json::from_slice(raw)?)
    }
}

/// Delivers the body as a JSON string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        Ok(Value::String(std::str::from_utf8(raw)?.to_string()))
    }
}

/// URL-encoded forms. Repeated keys collect into an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormCodec;

impl Codec for FormCodec {
    fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
        let mut fields = Map::new();
        for (key, value) in url::form_urlencoded::parse(raw) {
            let value = Value::String(value.into_owned());
            match fields.get_mut(key.as_ref()) {
                Some(Value::Array(values)) => values.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    fields.insert(key.into_owned(), value);
                }
            }
        }
        Ok(Value::Object(fields))
    }
}

/// Media type → codec lookup.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
    fallback: Arc<dyn Codec>,
}

impl CodecRegistry {
    /// JSON, form and text codecs, text as fallback.
    pub fn with_defaults() -> Self {
        let mut codecs: HashMap<String, Arc<dyn Codec>> = HashMap::new();
        codecs.insert(JSON.to_string(), Arc::new(JsonCodec));
        codecs.insert(FORM.to_string(), Arc::new(FormCodec));
        codecs.insert(TEXT.to_string(), Arc::new(TextCodec));
        Self {
            codecs,
            fallback: Arc::new(TextCodec),
        }
    }

    /// Register or replace the codec for a media type.
    pub fn register(&mut self, media_type: &str, codec: Arc<dyn Codec>) {
        self.codecs.insert(media_type_of(media_type), codec);
    }

    /// Decode `raw` according to the request's content type.
    pub fn decode(&self, content_type: Option<&str>, raw: &[u8]) -> Result<Value, DecodeError> {
        let media_type = content_type.map_or_else(|| JSON.to_string(), media_type_of);
        let codec = self.codecs.get(&media_type).unwrap_or(&self.fallback);
        codec.decode(raw)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.codecs.keys().collect();
        types.sort();
        f.debug_struct("CodecRegistry").field("types", &types).finish()
    }
}

fn media_type_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_content_type_means_json() {
        let registry = CodecRegistry::with_defaults();
        let value = registry.decode(None, br#"{"a":[1,2,{"b":null}]}"#).unwrap();
        assert_eq!(value, json!({"a": [1, 2, {"b": null}]}));
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        let registry = CodecRegistry::with_defaults();
        let value = registry
            .decode(Some("Application/JSON; charset=utf-8"), b"[true]")
            .unwrap();
        assert_eq!(value, json!([true]));
    }

    #[test]
    fn malformed_json_reports_parser_message() {
        let registry = CodecRegistry::with_defaults();
        let err = registry.decode(Some(JSON), b"{\"a\":").unwrap_err();
        assert!(err.to_string().contains("EOF"), "{err}");
    }

    #[test]
    fn forms_collect_repeated_keys() {
        let registry = CodecRegistry::with_defaults();
        let value = registry
            .decode(Some(FORM), b"name=ada+lovelace&tag=a&tag=b&tag=c")
            .unwrap();
        assert_eq!(
            value,
            json!({"name": "ada lovelace", "tag": ["a", "b", "c"]})
        );
    }

    #[test]
    fn unknown_types_fall_back_to_text() {
        let registry = CodecRegistry::with_defaults();
        assert_eq!(
            registry.decode(Some("text/csv"), b"a,b").unwrap(),
            json!("a,b")
        );
        assert!(matches!(
            registry.decode(Some("application/octet-stream"), &[0xff, 0xfe]),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn custom_codecs_can_be_registered() {
        struct Length;
        impl Codec for Length {
            fn decode(&self, raw: &[u8]) -> Result<Value, DecodeError> {
                Ok(json!(raw.len()))
            }
        }

        let mut registry = CodecRegistry::with_defaults();
        registry.register("Application/Octet-Stream", Arc::new(Length));
        assert_eq!(
            registry
                .decode(Some("application/octet-stream"), &[1, 2, 3])
                .unwrap(),
            json!(3)
        );
    }
}
