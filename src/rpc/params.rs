//! Decoding of urlencoded calls.
//!
//! A call is a flat mapping: every key appears once and every value is a
//! plain string. Input that cannot be read that way is rejected rather than
//! guessed at.

use std::collections::HashSet;

use thiserror::Error;
use url::form_urlencoded;

/// Why a query string or body is not a flat urlencoded mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("input is not valid UTF-8")]
    NotUtf8,

    #[error("malformed percent escape at byte {0}")]
    BadEscape(usize),

    #[error("parameter '{0}' appears more than once")]
    RepeatedKey(String),

    #[error("request body could not be read: {0}")]
    Body(String),
}

/// Ordered parameter mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Decode `application/x-www-form-urlencoded` input.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
        check_escapes(text)?;

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for (key, value) in form_urlencoded::parse(text.as_bytes()) {
            if !seen.insert(key.clone()) {
                return Err(DecodeError::RepeatedKey(key.into_owned()));
            }
            pairs.push((key.into_owned(), value.into_owned()));
        }

        Ok(Self { pairs })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn check_escapes(text: &str) -> Result<(), DecodeError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(DecodeError::BadEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// One parsed inbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    method: Option<String>,
    params: Params,
}

impl Call {
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl From<Params> for Call {
    fn from(params: Params) -> Self {
        let method = params.get("method").map(str::to_owned);
        Self { method, params }
    }
}
