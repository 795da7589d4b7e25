use serde_json::Value;
use std::collections::BTreeMap;

use super::form::{FormData, decode_form};
use crate::error::MicrolightError;

pub const JSON: &str = "application/json";
pub const FORM_DATA: &str = "application/x-www-form-urlencoded";
pub const MULTIPART: &str = "multipart/form-data";

/// Content types the client knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    FormData,
    Multipart,
    Other,
}

impl ContentType {
    /// Classify a `Content-Type` header value by its essence, ignoring
    /// parameters such as `charset`.
    pub fn from_header(value: Option<&str>) -> Self {
        let essence = value
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase());
        match essence.as_deref() {
            Some(JSON) => ContentType::Json,
            Some(FORM_DATA) => ContentType::FormData,
            Some(MULTIPART) => ContentType::Multipart,
            _ => ContentType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Form(FormData),
    Text(String),
}

impl ResponseBody {
    pub fn decode(content_type: ContentType, raw: String) -> Result<Self, MicrolightError> {
        match content_type {
            ContentType::Json => serde_json::from_str(&raw)
                .map(ResponseBody::Json)
                .map_err(|e| MicrolightError::InvalidResponse(format!("malformed JSON body: {e}"))),
            ContentType::FormData => Ok(ResponseBody::Form(decode_form(&raw))),
            ContentType::Multipart | ContentType::Other => Ok(ResponseBody::Text(raw)),
        }
    }

    /// Look up a top-level string field in a JSON or form body.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            ResponseBody::Json(value) => value.get(name).and_then(Value::as_str),
            ResponseBody::Form(form) => form.get(name),
            ResponseBody::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Fold raw header lines into a map keyed by lower-cased name. Each line is
/// split at its first colon; lines without a value are skipped and a
/// repeated header overwrites the earlier one.
pub fn fold_header_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, String> {
    lines
        .into_iter()
        .fold(BTreeMap::new(), |mut headers, line| {
            let (name, value) = line.split_once(':').unwrap_or((line, ""));
            let (name, value) = (name.trim().to_ascii_lowercase(), value.trim());
            if !name.is_empty() && !value.is_empty() {
                headers.insert(name, value.to_string());
            }
            headers
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_header_last_wins() {
        let headers = fold_header_lines(["X-Test: 1", "X-Test: 2"]);
        assert_eq!(headers.get("x-test").map(String::as_str), Some("2"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn header_value_keeps_later_colons() {
        let headers = fold_header_lines(["Location:  https://example.com:8443/a ", "HTTP/1.1 200 OK", ""]);
        assert_eq!(
            headers.get("location").map(String::as_str),
            Some("https://example.com:8443/a")
        );
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn content_type_ignores_parameters() {
        assert_eq!(
            ContentType::from_header(Some("application/json; charset=utf-8")),
            ContentType::Json
        );
        assert_eq!(
            ContentType::from_header(Some("Application/X-WWW-Form-Urlencoded")),
            ContentType::FormData
        );
        assert_eq!(ContentType::from_header(Some("text/html")), ContentType::Other);
        assert_eq!(ContentType::from_header(None), ContentType::Other);
    }

    #[test]
    fn body_decoding_follows_content_type() {
        let json_body = ResponseBody::decode(ContentType::Json, r#"{"me":"https://a.example/"}"#.into())
            .expect("valid json");
        assert_eq!(json_body, ResponseBody::Json(json!({"me": "https://a.example/"})));
        assert_eq!(json_body.field("me"), Some("https://a.example/"));

        let form_body = ResponseBody::decode(ContentType::FormData, "me=https%3A%2F%2Fa.example%2F".into())
            .expect("form never fails");
        assert_eq!(form_body.field("me"), Some("https://a.example/"));

        let text = ResponseBody::decode(ContentType::Other, "{\"me\":1}".into()).expect("text");
        assert_eq!(text, ResponseBody::Text("{\"me\":1}".to_string()));

        assert!(matches!(
            ResponseBody::decode(ContentType::Json, "{not json".into()),
            Err(MicrolightError::InvalidResponse(_))
        ));
    }
}
