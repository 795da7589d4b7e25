//! `application/x-www-form-urlencoded` coding.

use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;

/// Decoded form body. Duplicate keys keep the last value; a key given
/// without `=` maps to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData(BTreeMap<String, Option<String>>);

impl FormData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

impl FromIterator<(String, Option<String>)> for FormData {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Decode a form body into a last-wins mapping.
pub fn decode_form(body: &str) -> FormData {
    decode_form_pairs(body).into_iter().collect()
}

/// Decode a form body into its ordered `(key, value)` pairs, keeping
/// duplicates. Callers that need repeated keys (`category[]=a&category[]=b`)
/// use this instead of [`decode_form`].
pub fn decode_form_pairs(body: &str) -> Vec<(String, Option<String>)> {
    body.split('&')
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| match chunk.split_once('=') {
            Some((key, value)) => (decode_component(key), Some(decode_component(value))),
            None => (decode_component(chunk), None),
        })
        .collect()
}

/// Encode pairs the way `http_build_query` does for flat values.
pub fn encode_form<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_without_equals_is_absent() {
        let form = decode_form("a=1&b=&c");
        assert_eq!(form.get("a"), Some("1"));
        assert_eq!(form.get("b"), Some(""));
        assert!(form.contains_key("c"));
        assert_eq!(form.get("c"), None);
        assert_eq!(form.len(), 3);
    }

    #[test]
    fn splits_on_first_equals_and_decodes_each_side() {
        let form = decode_form("redirect%5Furi=https%3A%2F%2Fa.example%2F%3Fx%3D1&q=a+b=c");
        assert_eq!(form.get("redirect_uri"), Some("https://a.example/?x=1"));
        assert_eq!(form.get("q"), Some("a b=c"));
    }

    #[test]
    fn duplicate_keys_last_wins() {
        let form = decode_form("me=one&me=two");
        assert_eq!(form.get("me"), Some("two"));
        assert_eq!(decode_form_pairs("me=one&me=two").len(), 2);
    }

    #[test]
    fn encode_escapes_reserved_characters() {
        let body = encode_form([("content", "hi & bye"), ("h", "entry")]);
        assert_eq!(body, "content=hi+%26+bye&h=entry");
    }
}
