//! Stub definitions.
//!
//! A [`Stub`] pairs a target URL with exactly one response shape. The shape is
//! picked from the payloads handed to [`Stub::new`] by a fixed precedence:
//! error, then full response, then status+body data, otherwise empty.

use crate::codec::{self, StubError, StubHttpResponse, TransportError, TransportResponse};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Registry key: an absolute URL kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StubTarget(String);

impl StubTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this target is a string prefix of `request_target`.
    pub fn is_prefix_of(&self, request_target: &str) -> bool {
        request_target.starts_with(self.0.as_str())
    }
}

impl fmt::Display for StubTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StubTarget {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for StubTarget {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl AsRef<str> for StubTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The response shape a stub produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StubVariant {
    Error,
    Data,
    Response,
    Empty,
}

impl fmt::Display for StubVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StubVariant::Error => "error",
            StubVariant::Data => "data",
            StubVariant::Response => "response",
            StubVariant::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Status code and body, without headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubData {
    /// Any integer is accepted and carried through the launch payload, but
    /// only 100..=999 can be served; other codes make the request stall.
    pub status_code: i64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// Body was produced by serializing a value rather than given as bytes
    #[serde(default)]
    pub is_codable: bool,
}

impl StubData {
    pub fn new(status_code: i64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code,
            data: data.into(),
            is_codable: false,
        }
    }

    /// Serialize `value` as the JSON body.
    pub fn from_codable<T: Serialize + ?Sized>(
        status_code: i64,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            status_code,
            data: serde_json::to_vec(value)?,
            is_codable: true,
        })
    }

    /// The status as an HTTP code, if it is one that can be served.
    pub fn status(&self) -> Option<StatusCode> {
        codec::http_status(self.status_code)
    }

    /// Body as UTF-8 text, or `"Binary Data"`.
    pub fn debug_string(&self) -> Cow<'_, str> {
        debug_body(&self.data)
    }
}

/// Full response head plus body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubResponse {
    pub response: StubHttpResponse,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub is_codable: bool,
}

impl StubResponse {
    pub fn new(response: &TransportResponse, data: impl Into<Vec<u8>>) -> Self {
        Self {
            response: StubHttpResponse::from(response),
            data: data.into(),
            is_codable: false,
        }
    }

    pub fn from_codable<T: Serialize + ?Sized>(
        response: &TransportResponse,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            response: StubHttpResponse::from(response),
            data: serde_json::to_vec(value)?,
            is_codable: true,
        })
    }

    pub fn debug_string(&self) -> Cow<'_, str> {
        debug_body(&self.data)
    }
}

fn debug_body(data: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(data) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Borrowed("Binary Data"),
    }
}

/// Payload of a stub; exactly one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubKind {
    Error(StubError),
    Data(StubData),
    Response(StubResponse),
    Empty,
}

impl StubKind {
    pub fn variant(&self) -> StubVariant {
        match self {
            StubKind::Error(_) => StubVariant::Error,
            StubKind::Data(_) => StubVariant::Data,
            StubKind::Response(_) => StubVariant::Response,
            StubKind::Empty => StubVariant::Empty,
        }
    }
}

/// A pre-declared answer for requests to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StubRecord", from = "StubRecord")]
pub struct Stub {
    target: StubTarget,
    kind: StubKind,
}

impl Stub {
    /// Build a stub from whichever payloads are supplied.
    ///
    /// Precedence is error, then response, then data; with none the stub is
    /// empty. Payloads that lose are discarded.
    pub fn new(
        target: impl Into<StubTarget>,
        error: Option<StubError>,
        data: Option<StubData>,
        response: Option<StubResponse>,
    ) -> Self {
        let kind = match (error, response, data) {
            (Some(error), _, _) => StubKind::Error(error),
            (None, Some(response), _) => StubKind::Response(response),
            (None, None, Some(data)) => StubKind::Data(data),
            (None, None, None) => StubKind::Empty,
        };

        Self {
            target: target.into(),
            kind,
        }
    }

    pub fn error(target: impl Into<StubTarget>, error: impl Into<StubError>) -> Self {
        Self::new(target, Some(error.into()), None, None)
    }

    /// Stub a simulated failure from a native error.
    pub fn failure(target: impl Into<StubTarget>, error: &TransportError) -> Self {
        Self::error(target, StubError::from(error))
    }

    pub fn data(target: impl Into<StubTarget>, data: StubData) -> Self {
        Self::new(target, None, Some(data), None)
    }

    pub fn response(target: impl Into<StubTarget>, response: StubResponse) -> Self {
        Self::new(target, None, None, Some(response))
    }

    pub fn empty(target: impl Into<StubTarget>) -> Self {
        Self::new(target, None, None, None)
    }

    pub fn target(&self) -> &StubTarget {
        &self.target
    }

    pub fn kind(&self) -> &StubKind {
        &self.kind
    }

    pub fn variant(&self) -> StubVariant {
        self.kind.variant()
    }

    pub fn error_payload(&self) -> Option<&StubError> {
        match &self.kind {
            StubKind::Error(error) => Some(error),
            _ => None,
        }
    }

    pub fn data_payload(&self) -> Option<&StubData> {
        match &self.kind {
            StubKind::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn response_payload(&self) -> Option<&StubResponse> {
        match &self.kind {
            StubKind::Response(response) => Some(response),
            _ => None,
        }
    }
}

/// Wire shape of a stub: every payload optional, plus the variant tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StubRecord {
    url: StubTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<StubError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<StubData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<StubResponse>,
    // Informational; the variant is re-derived from the payloads on read.
    #[serde(rename = "type", default)]
    variant: Option<StubVariant>,
}

impl From<Stub> for StubRecord {
    fn from(stub: Stub) -> Self {
        let variant = Some(stub.variant());
        let mut record = StubRecord {
            url: stub.target,
            error: None,
            data: None,
            response: None,
            variant,
        };
        match stub.kind {
            StubKind::Error(error) => record.error = Some(error),
            StubKind::Data(data) => record.data = Some(data),
            StubKind::Response(response) => record.response = Some(response),
            StubKind::Empty => {}
        }
        record
    }
}

impl From<StubRecord> for Stub {
    fn from(record: StubRecord) -> Self {
        Stub::new(record.url, record.error, record.data, record.response)
    }
}

/// Byte bodies travel as standard base64 strings.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
