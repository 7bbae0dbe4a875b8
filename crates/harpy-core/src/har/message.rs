use super::schema::{Field, FieldKind, HarEntity, KeyValue, Schema, find};
use super::timestamp::Timestamp;
use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Value of `encoding` / `_encoding` for bodies stored as base64.
pub const BASE64_ENCODING: &str = "base64";

pub(crate) static REQUEST: Schema = Schema {
    entity: "Request",
    fields: &[
        Field::required("method", FieldKind::String),
        Field::required("url", FieldKind::String),
        Field::required("httpVersion", FieldKind::String),
        Field::required("cookies", FieldKind::List(&COOKIE)),
        Field::required("headers", FieldKind::List(&HEADER)),
        Field::required("queryString", FieldKind::List(&QUERY_PARAM)),
        Field::optional("postData", FieldKind::Entity(&POST_DATA)),
        Field::required("headersSize", FieldKind::Integer),
        Field::required("bodySize", FieldKind::Integer),
        Field::optional("comment", FieldKind::String),
        Field::optional("_sequence", FieldKind::Integer),
        Field::optional("_serverIPAddress", FieldKind::String),
    ],
};

pub(crate) static RESPONSE: Schema = Schema {
    entity: "Response",
    fields: &[
        Field::required("status", FieldKind::Integer),
        Field::required("statusText", FieldKind::String),
        Field::required("httpVersion", FieldKind::String),
        Field::required("cookies", FieldKind::List(&COOKIE)),
        Field::required("headers", FieldKind::List(&HEADER)),
        Field::required("content", FieldKind::Entity(&CONTENT)),
        Field::required("redirectURL", FieldKind::String),
        Field::required("headersSize", FieldKind::Integer),
        Field::required("bodySize", FieldKind::Integer),
        Field::optional("comment", FieldKind::String),
        Field::optional("_sequence", FieldKind::Integer),
    ],
};

pub(crate) static COOKIE: Schema = Schema {
    entity: "Cookie",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::required("value", FieldKind::String),
        Field::optional("path", FieldKind::String),
        Field::optional("domain", FieldKind::String),
        Field::optional("expires", FieldKind::Timestamp),
        Field::optional("httpOnly", FieldKind::Boolean),
        Field::optional("secure", FieldKind::Boolean),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static HEADER: Schema = Schema {
    entity: "Header",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::required("value", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static QUERY_PARAM: Schema = Schema {
    entity: "QueryParam",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::required("value", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static POST_DATA: Schema = Schema {
    entity: "PostData",
    fields: &[
        Field::required("mimeType", FieldKind::String),
        Field::optional("params", FieldKind::List(&PARAM)),
        Field::optional("text", FieldKind::String),
        Field::optional("comment", FieldKind::String),
        Field::optional("_encoding", FieldKind::String),
    ],
};

pub(crate) static PARAM: Schema = Schema {
    entity: "Param",
    fields: &[
        Field::required("name", FieldKind::String),
        Field::optional("value", FieldKind::String),
        Field::optional("fileName", FieldKind::String),
        Field::optional("contentType", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

pub(crate) static CONTENT: Schema = Schema {
    entity: "Content",
    fields: &[
        Field::required("size", FieldKind::Integer),
        Field::optional("compression", FieldKind::Integer),
        Field::required("mimeType", FieldKind::String),
        Field::optional("text", FieldKind::String),
        Field::optional("encoding", FieldKind::String),
        Field::optional("comment", FieldKind::String),
    ],
};

/// HTTP request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "httpVersion", skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    #[serde(rename = "queryString", skip_serializing_if = "Option::is_none")]
    pub query_string: Option<Vec<QueryParam>>,
    #[serde(rename = "postData", skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    #[serde(rename = "headersSize", skip_serializing_if = "Option::is_none")]
    pub headers_size: Option<i64>,
    #[serde(rename = "bodySize", skip_serializing_if = "Option::is_none")]
    pub body_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Caller-supplied correlation id, copied onto the response.
    #[serde(rename = "_sequence", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
    /// Connect here instead of resolving the URL's host.
    #[serde(rename = "_serverIPAddress", skip_serializing_if = "Option::is_none")]
    pub server_ip_address: Option<String>,
}

impl Request {
    pub fn method(&self) -> &str {
        self.method.as_deref().unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn http_version(&self) -> &str {
        self.http_version.as_deref().unwrap_or_default()
    }

    pub fn headers(&self) -> &[Header] {
        self.headers.as_deref().unwrap_or(&[])
    }

    pub fn cookies(&self) -> &[Cookie] {
        self.cookies.as_deref().unwrap_or(&[])
    }

    pub fn query_string(&self) -> &[QueryParam] {
        self.query_string.as_deref().unwrap_or(&[])
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find(self.headers(), name).map(|h| h.value())
    }

    pub fn headers_size(&self) -> i64 {
        self.headers_size.unwrap_or(-1)
    }

    pub fn body_size(&self) -> i64 {
        self.body_size.unwrap_or(-1)
    }
}

impl HarEntity for Request {
    fn schema() -> &'static Schema {
        &REQUEST
    }

    fn with_defaults() -> Self {
        Self {
            method: Some("GET".to_string()),
            url: Some("http://localhost/".to_string()),
            http_version: Some("HTTP/1.1".to_string()),
            cookies: Some(Vec::new()),
            headers: Some(Vec::new()),
            query_string: Some(Vec::new()),
            headers_size: Some(-1),
            body_size: Some(-1),
            ..Default::default()
        }
    }

    fn label(&self) -> String {
        match (&self.method, &self.url) {
            (Some(method), Some(url)) => format!("Request {} {}", method, url),
            _ => "Request".to_string(),
        }
    }

    fn check(&self) -> Result<()> {
        match &self.post_data {
            Some(post_data) => post_data.check(),
            None => Ok(()),
        }
    }
}

/// HTTP response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(rename = "statusText", skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(rename = "httpVersion", skip_serializing_if = "Option::is_none")]
    pub http_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Vec<Cookie>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(rename = "redirectURL", skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(rename = "headersSize", skip_serializing_if = "Option::is_none")]
    pub headers_size: Option<i64>,
    #[serde(rename = "bodySize", skip_serializing_if = "Option::is_none")]
    pub body_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "_sequence", skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

impl Response {
    /// Status code, or -1 when unset.
    pub fn status(&self) -> i64 {
        self.status.unwrap_or(-1)
    }

    pub fn status_text(&self) -> &str {
        self.status_text.as_deref().unwrap_or_default()
    }

    pub fn http_version(&self) -> &str {
        self.http_version.as_deref().unwrap_or_default()
    }

    pub fn headers(&self) -> &[Header] {
        self.headers.as_deref().unwrap_or(&[])
    }

    pub fn cookies(&self) -> &[Cookie] {
        self.cookies.as_deref().unwrap_or(&[])
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find(self.headers(), name).map(|h| h.value())
    }

    pub fn redirect_url(&self) -> &str {
        self.redirect_url.as_deref().unwrap_or_default()
    }

    pub fn headers_size(&self) -> i64 {
        self.headers_size.unwrap_or(-1)
    }

    pub fn body_size(&self) -> i64 {
        self.body_size.unwrap_or(-1)
    }
}

impl HarEntity for Response {
    fn schema() -> &'static Schema {
        &RESPONSE
    }

    fn with_defaults() -> Self {
        Self {
            status: Some(0),
            status_text: Some(String::new()),
            http_version: Some("HTTP/1.1".to_string()),
            cookies: Some(Vec::new()),
            headers: Some(Vec::new()),
            content: Some(Content::with_defaults()),
            redirect_url: Some(String::new()),
            headers_size: Some(-1),
            body_size: Some(-1),
            ..Default::default()
        }
    }

    fn label(&self) -> String {
        match self.status {
            Some(status) => format!("Response {} {}", status, self.status_text()),
            None => "Response".to_string(),
        }
    }
}

/// Cookie
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<Timestamp>,
    #[serde(rename = "httpOnly", skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Cookie {
    fn schema() -> &'static Schema {
        &COOKIE
    }

    fn with_defaults() -> Self {
        Self::pair("", "")
    }

    fn label(&self) -> String {
        format!("Cookie '{}'", self.key())
    }
}

impl KeyValue for Cookie {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// HTTP header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Header {
    fn schema() -> &'static Schema {
        &HEADER
    }

    fn with_defaults() -> Self {
        Self::pair("", "")
    }
}

impl KeyValue for Header {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            value: Some(value.into()),
            comment: None,
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Query parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for QueryParam {
    fn schema() -> &'static Schema {
        &QUERY_PARAM
    }

    fn with_defaults() -> Self {
        Self::pair("", "")
    }
}

impl KeyValue for QueryParam {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            value: Some(value.into()),
            comment: None,
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// POST data
///
/// Exactly one of `text` and `params` carries the body. `_encoding` is
/// `"base64"` when `text` holds a binary body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostData {
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Param>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "_encoding", skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl PostData {
    /// Body from raw bytes: text when UTF-8, base64 otherwise.
    pub fn from_bytes(mime_type: impl Into<String>, body: &[u8]) -> Self {
        let (text, encoding) = encode_body(body);
        Self {
            mime_type: Some(mime_type.into()),
            text: Some(text),
            encoding,
            ..Default::default()
        }
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or_default()
    }

    /// Bytes to put on the wire.
    pub fn body(&self) -> Result<Vec<u8>> {
        if let Some(text) = &self.text {
            return decode_body("PostData", text, self.encoding.as_deref());
        }

        let mut form = form_urlencoded::Serializer::new(String::new());
        for param in self.params.as_deref().unwrap_or(&[]) {
            form.append_pair(param.key(), param.value());
        }
        Ok(form.finish().into_bytes())
    }
}

impl HarEntity for PostData {
    fn schema() -> &'static Schema {
        &POST_DATA
    }

    fn with_defaults() -> Self {
        Self::from_bytes("application/octet-stream", b"")
    }

    fn check(&self) -> Result<()> {
        match (&self.text, &self.params) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (Some(_), Some(_)) => Err(Error::validation(
                "PostData",
                "params",
                "either text or params",
                "both",
            )),
            (None, None) => Err(Error::validation(
                "PostData",
                "text",
                "either text or params",
                "neither",
            )),
        }
    }
}

/// POST parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "fileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl HarEntity for Param {
    fn schema() -> &'static Schema {
        &PARAM
    }

    fn with_defaults() -> Self {
        Self::pair("", "")
    }
}

impl KeyValue for Param {
    fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(key.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    fn key(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Response content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression: Option<i64>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Content {
    pub fn from_bytes(mime_type: impl Into<String>, body: &[u8]) -> Self {
        let (text, encoding) = encode_body(body);
        Self {
            size: Some(body.len() as i64),
            mime_type: Some(mime_type.into()),
            text: (!body.is_empty()).then_some(text),
            encoding,
            ..Default::default()
        }
    }

    pub fn size(&self) -> i64 {
        self.size.unwrap_or(-1)
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or_default()
    }

    pub fn body(&self) -> Result<Vec<u8>> {
        match &self.text {
            Some(text) => decode_body("Content", text, self.encoding.as_deref()),
            None => Ok(Vec::new()),
        }
    }
}

impl HarEntity for Content {
    fn schema() -> &'static Schema {
        &CONTENT
    }

    fn with_defaults() -> Self {
        Self {
            size: Some(0),
            mime_type: Some("x-unknown".to_string()),
            ..Default::default()
        }
    }
}

fn encode_body(body: &[u8]) -> (String, Option<String>) {
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), None),
        Err(_) => (STANDARD.encode(body), Some(BASE64_ENCODING.to_string())),
    }
}

fn decode_body(entity: &'static str, text: &str, encoding: Option<&str>) -> Result<Vec<u8>> {
    match encoding {
        Some(enc) if enc.eq_ignore_ascii_case(BASE64_ENCODING) => STANDARD
            .decode(text)
            .map_err(|e| Error::validation(entity, "text", "base64 text", e.to_string())),
        _ => Ok(text.as_bytes().to_vec()),
    }
}
