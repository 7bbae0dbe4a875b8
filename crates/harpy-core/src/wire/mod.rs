//! HTTP/1.x wire codec for [`Request`] and [`Response`].
//!
//! `ingest` parses raw message bytes into a validated entity, `emit` writes
//! the entity back out. For well-formed origin-form requests with CRLF line
//! endings, `emit(ingest(x))` reproduces `x` byte for byte.

mod cookie;
mod head;
mod request;
mod response;

use crate::har::{HarEntity, Request, Response};
use crate::{Error, Result};
use std::fmt::Write as _;

/// Bodies longer than this are cut short by `render`.
const RENDER_LIMIT: usize = 1024;

/// Knobs for [`WireMessage::ingest_with`].
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Scheme used to build absolute URLs from origin-form targets.
    pub scheme: String,
    /// Comment attached to the produced entity.
    pub comment: Option<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            comment: None,
        }
    }
}

/// Conversion between an entity and its HTTP/1.x wire form.
pub trait WireMessage: HarEntity {
    /// Parse raw bytes into a validated entity.
    fn ingest_with(raw: &[u8], options: &IngestOptions) -> Result<Self>;

    fn ingest(raw: &[u8]) -> Result<Self> {
        Self::ingest_with(raw, &IngestOptions::default())
    }

    /// Start line, headers in stored order, blank line and body.
    fn emit(&self) -> Result<Vec<u8>>;

    /// Human-readable form for diagnostics.
    fn render(&self) -> String;

    /// Overwrite the first header named `name` (ignoring case), or append one.
    /// The recorded header size no longer applies afterwards.
    fn set_header(&mut self, name: &str, value: &str);

    /// Fill absent format-mandated fields with their sentinels.
    fn set_defaults(&mut self);
}

/// Either kind of HTTP message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn emit(&self) -> Result<Vec<u8>> {
        match self {
            Message::Request(request) => request.emit(),
            Message::Response(response) => response.emit(),
        }
    }

    pub fn render(&self) -> String {
        match self {
            Message::Request(request) => request.render(),
            Message::Response(response) => response.render(),
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            Message::Request(request) => serde_json::to_value(request)?,
            Message::Response(response) => serde_json::to_value(response)?,
        };
        Ok(value)
    }
}

/// Ingest a message, telling requests and responses apart by the start line.
pub fn ingest(raw: &[u8]) -> Result<Message> {
    ingest_with(raw, &IngestOptions::default())
}

pub fn ingest_with(raw: &[u8], options: &IngestOptions) -> Result<Message> {
    if raw.starts_with(b"HTTP/") {
        Response::ingest_with(raw, options).map(Message::Response)
    } else {
        Request::ingest_with(raw, options).map(Message::Request)
    }
}

/// Whether `buf` holds a complete response.
///
/// Complete means the head has ended and the body is framed: the status
/// carries no body (1xx, 204, 304), a chunked body has its last chunk, or
/// `Content-Length` bytes have arrived. A response with no framing is only
/// complete once the peer closes the connection.
pub fn response_complete(buf: &[u8]) -> bool {
    let Ok((parsed, body)) = head::split_message(buf) else {
        return false;
    };
    if parsed.size == buf.len() && !buf.ends_with(b"\r\n\r\n") {
        return false;
    }

    let status: u16 = parsed
        .start_line
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or_default();
    if (100..200).contains(&status) || status == 204 || status == 304 {
        return true;
    }

    if parsed.is_chunked() {
        return head::chunked_length(body).is_some();
    }

    match parsed.content_length() {
        Some(len) => body.len() >= len,
        None => false,
    }
}

/// Normalize HTTP version strings to the `HTTP/x.y` form.
pub fn normalize_http_version(version: &str) -> String {
    match version.to_lowercase().as_str() {
        "h2" | "http/2" | "http/2.0" => "HTTP/2.0".to_string(),
        "h3" | "http/3" | "http/3.0" => "HTTP/3.0".to_string(),
        "http/1.0" => "HTTP/1.0".to_string(),
        "http/1.1" => "HTTP/1.1".to_string(),
        _ => version.to_string(),
    }
}

fn required<'a>(
    value: &'a Option<String>,
    entity: &'static str,
    field: &'static str,
) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or(Error::MissingValue { entity, field })
}

fn is_textual(mime_type: &str) -> bool {
    let Ok(mime) = mime_type.parse::<mime::Mime>() else {
        return false;
    };
    mime.type_() == mime::TEXT
        || matches!(
            mime.subtype().as_str(),
            "json" | "xml" | "javascript" | "x-www-form-urlencoded"
        )
        || mime.suffix().is_some_and(|s| s == mime::JSON || s == mime::XML)
}

fn render_body(out: &mut String, mime_type: &str, body: &[u8]) {
    if body.is_empty() {
        return;
    }

    let _ = writeln!(out, "  [{} bytes {}]", body.len(), mime_type);
    match std::str::from_utf8(body) {
        Ok(text) if is_textual(mime_type) || mime_type.is_empty() => {
            let shown: String = text.chars().take(RENDER_LIMIT).collect();
            for line in shown.lines() {
                let _ = writeln!(out, "  {}", line);
            }
            if text.chars().count() > RENDER_LIMIT {
                let _ = writeln!(out, "  ...");
            }
        }
        _ => {}
    }
}
