use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{HeaderMap, Method, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};

use crate::client::{ContentType, decode_form_pairs};
use crate::error::MicrolightError;

/// Decoded request fields: a JSON object, or form fields where a `key[]`
/// repeated key collects into an array under `key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    fields: Map<String, Value>,
}

impl RequestBody {
    pub fn from_json(value: Value) -> Result<Self, MicrolightError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Ok(Self::default()),
            _ => Err(MicrolightError::InvalidRequest(
                "JSON body must be an object".to_string(),
            )),
        }
    }

    pub fn from_form(raw: &str) -> Self {
        Self::from_pairs(decode_form_pairs(raw))
    }

    /// Build from decoded name/value pairs, as carried by urlencoded or
    /// multipart bodies.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Option<String>)>) -> Self {
        let mut fields = Map::new();
        for (key, value) in pairs {
            let value = value.map_or(Value::Null, Value::String);
            match key.strip_suffix("[]") {
                Some(base) => {
                    let entry = fields
                        .entry(base.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    match entry {
                        Value::Array(items) => items.push(value),
                        other => *other = Value::Array(vec![other.take(), value]),
                    }
                }
                None => {
                    fields.insert(key, value);
                }
            }
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Non-empty string value. A one-element array (the JSON microformats
    /// shape) counts as its element.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        first_str(self.fields.get(key)?)
    }

    /// All string values under a key, in order.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        string_list(self.fields.get(key))
    }
}

pub(crate) fn first_str(value: &Value) -> Option<&str> {
    let s = match value {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items.first().and_then(Value::as_str)?,
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// The request context handed to Micropub handlers: headers plus the body,
/// decoded exactly once.
#[derive(Debug, Clone)]
pub struct MicropubRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl<S> FromRequest<S> for MicropubRequest
where
    S: Send + Sync,
{
    type Rejection = MicrolightError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let method = req.method().clone();
        let headers = req.headers().clone();
        let content_type = ContentType::from_header(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
        );

        if content_type == ContentType::Multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| MicrolightError::InvalidRequest(e.body_text()))?;
            let body = RequestBody::from_pairs(multipart_text_fields(multipart).await?);
            return Ok(MicropubRequest {
                method,
                headers,
                body,
            });
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| MicrolightError::InvalidRequest(e.body_text()))?;

        let body = if bytes.is_empty() {
            RequestBody::default()
        } else {
            match content_type {
                ContentType::Json => RequestBody::from_json(serde_json::from_slice(&bytes)?)?,
                ContentType::FormData => RequestBody::from_form(&String::from_utf8_lossy(&bytes)),
                ContentType::Multipart | ContentType::Other => {
                    return Err(MicrolightError::InvalidRequest(
                        "unsupported content type; send JSON, form or multipart data".to_string(),
                    ));
                }
            }
        };

        Ok(MicropubRequest {
            method,
            headers,
            body,
        })
    }
}

/// Text fields of a multipart body. File parts are skipped; media uploads
/// are not accepted here.
async fn multipart_text_fields(mut multipart: Multipart) -> Result<Vec<(String, Option<String>)>, MicrolightError> {
    let mut pairs = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MicrolightError::InvalidRequest(e.body_text()))?
    {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let value = field
            .text()
            .await
            .map_err(|e| MicrolightError::InvalidRequest(e.body_text()))?;
        pairs.push((name, Some(value)));
    }
    Ok(pairs)
}
