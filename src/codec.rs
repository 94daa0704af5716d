//! Serializable stand-ins for transport errors and HTTP responses.
//!
//! Neither [`TransportError`] (arbitrary JSON metadata) nor
//! [`TransportResponse`] (an `http::HeaderMap`) can travel through the launch
//! channel as-is. [`StubError`] and [`StubHttpResponse`] keep the parts that
//! fit a string-keyed, string-valued shape and rebuild the native value on
//! demand.

use crate::stub::StubTarget;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A simulated transport failure, delivered to the host instead of a response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{domain} error {code}")]
pub struct TransportError {
    /// Error source, e.g. `std::io` or `dns`
    pub domain: String,
    /// Domain-specific error code
    pub code: i64,
    /// Free-form metadata
    pub user_info: BTreeMap<String, serde_json::Value>,
}

impl TransportError {
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            user_info: BTreeMap::new(),
        }
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }
}

impl From<&std::io::Error> for TransportError {
    fn from(err: &std::io::Error) -> Self {
        TransportError::new("std::io", err.raw_os_error().map(i64::from).unwrap_or(-1))
            .with_info("kind", format!("{:?}", err.kind()))
            .with_info("description", err.to_string())
    }
}

/// An HTTP response head as the host transport sees it.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl TransportResponse {
    pub fn new(url: impl Into<String>, status: StatusCode) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Append a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Capture the head of an `http::Response` served for `url`.
    pub fn from_http<B>(url: impl Into<String>, response: &http::Response<B>) -> Self {
        Self {
            url: url.into(),
            status: response.status(),
            headers: response.headers().clone(),
        }
    }

    /// Convert into an `http::Response` with an empty body.
    pub fn into_http(self) -> http::Response<()> {
        let mut response = http::Response::new(());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Serializable projection of a [`TransportError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubError {
    pub domain: String,
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<BTreeMap<String, String>>,
}

impl StubError {
    pub fn new(domain: impl Into<String>, code: i64) -> Self {
        Self {
            domain: domain.into(),
            code,
            user_info: None,
        }
    }

    /// Rebuild the native error with the preserved string metadata.
    pub fn to_native(&self) -> TransportError {
        let user_info = self
            .user_info
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        TransportError {
            domain: self.domain.clone(),
            code: self.code,
            user_info,
        }
    }
}

impl From<&TransportError> for StubError {
    fn from(err: &TransportError) -> Self {
        // Non-string metadata values are dropped
        let strings: BTreeMap<String, String> = err
            .user_info
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();

        Self {
            domain: err.domain.clone(),
            code: err.code,
            user_info: (!strings.is_empty()).then_some(strings),
        }
    }
}

impl From<TransportError> for StubError {
    fn from(err: TransportError) -> Self {
        Self::from(&err)
    }
}

/// Map a wire status code onto an HTTP status, if it fits the 100..=999 range.
pub(crate) fn http_status(code: i64) -> Option<StatusCode> {
    let code = u16::try_from(code).ok()?;
    StatusCode::from_u16(code).ok()
}

/// Serializable projection of a [`TransportResponse`] head. The body travels separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubHttpResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<StubTarget>,
    /// Kept as any integer; only 100..=999 rebuilds into a response
    pub status_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fields: Option<BTreeMap<String, String>>,
}

impl StubHttpResponse {
    /// Rebuild the native response.
    ///
    /// Returns `None` without a url or with a status outside the HTTP range.
    pub fn to_native(&self) -> Option<TransportResponse> {
        let url = self.url.as_ref()?;
        let status = http_status(self.status_code)?;

        let mut response = TransportResponse::new(url.as_str(), status);
        for (name, value) in self.header_fields.iter().flatten() {
            response = response.with_header(name, value);
        }
        Some(response)
    }
}

impl From<&TransportResponse> for StubHttpResponse {
    fn from(response: &TransportResponse) -> Self {
        let mut header_fields = BTreeMap::new();
        for name in response.headers.keys() {
            // First value wins for repeated headers
            if let Some(value) = response.headers.get(name).and_then(|v| v.to_str().ok()) {
                header_fields.insert(name.as_str().to_string(), value.to_string());
            }
        }

        Self {
            url: Some(StubTarget::new(response.url.clone())),
            status_code: i64::from(response.status.as_u16()),
            header_fields: Some(header_fields),
        }
    }
}
