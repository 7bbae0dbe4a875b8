//! Start line, header block and body framing shared by requests and responses.

use crate::har::{Header, KeyValue, find};
use crate::{Error, Result};
use std::borrow::Cow;

const CRLF: &[u8] = b"\r\n";
const BLANK_LINE: &[u8] = b"\r\n\r\n";

/// The parsed head of an HTTP/1.x message.
#[derive(Debug)]
pub(crate) struct Head {
    pub start_line: String,
    pub headers: Vec<Header>,
    /// Bytes from the start of the message through the blank line.
    pub size: usize,
}

impl Head {
    pub fn header(&self, name: &str) -> Option<&str> {
        find(&self.headers, name).map(|h| h.value())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.key().eq_ignore_ascii_case(name))
            .map(|h| h.value())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"))
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|len| len.trim().parse().ok())
    }
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(BLANK_LINE.len())
        .position(|w| w == BLANK_LINE)
        .map(|pos| pos + BLANK_LINE.len())
}

/// Split a raw message into its head and body.
///
/// A message without a blank line is treated as all head. Header lines
/// without a colon are skipped; lines starting with whitespace continue the
/// previous header's value.
pub(crate) fn split_message(raw: &[u8]) -> Result<(Head, &[u8])> {
    let head_end = find_head_end(raw).unwrap_or(raw.len());
    let (head_bytes, body) = raw.split_at(head_end);

    let text = match std::str::from_utf8(head_bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            tracing::debug!("Header block is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(head_bytes)
        }
    };

    let mut lines = text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line));

    let start_line = lines
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| Error::Wire("missing start line".to_string()))?
        .to_string();

    let mut headers: Vec<Header> = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(last) = headers.last_mut() {
                let value = last.value.get_or_insert_with(String::new);
                value.push(' ');
                value.push_str(line.trim());
                continue;
            }
        }

        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                headers.push(Header::pair(name.trim(), value.trim()));
            }
            _ => tracing::debug!("Skipping malformed header line: {:?}", line),
        }
    }

    Ok((
        Head {
            start_line,
            headers,
            size: head_end,
        },
        body,
    ))
}

/// Write a start line, headers and the blank line.
pub(crate) fn write_head(out: &mut Vec<u8>, start_line: &str, headers: &[Header]) {
    out.extend_from_slice(start_line.as_bytes());
    out.extend_from_slice(CRLF);
    for header in headers {
        // HTTP/2 pseudo-headers recorded by browsers have no HTTP/1.x form
        if header.key().starts_with(':') {
            continue;
        }
        out.extend_from_slice(header.key().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(header.value().as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
}

/// Set `name` on the first matching header, or append it.
pub(crate) fn upsert_header(headers: &mut Vec<Header>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|h| h.key().eq_ignore_ascii_case(name))
    {
        Some(existing) => existing.value = Some(value.to_string()),
        None => headers.push(Header::pair(name, value)),
    }
}

/// Length of a complete chunked body, including the last chunk and trailers.
pub(crate) fn chunked_length(body: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        let line_end = pos + body[pos..].windows(2).position(|w| w == CRLF)?;
        let size_line = std::str::from_utf8(&body[pos..line_end]).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        pos = line_end + 2;

        if size == 0 {
            // trailer section ends with an empty line
            loop {
                let end = pos + body[pos..].windows(2).position(|w| w == CRLF)?;
                let empty = end == pos;
                pos = end + 2;
                if empty {
                    return Some(pos);
                }
            }
        }

        pos = pos.checked_add(size)?.checked_add(2)?;
        if pos > body.len() {
            return None;
        }
    }
}

/// Decode a chunked body, tolerating a missing last chunk.
pub(crate) fn decode_chunked(body: &[u8]) -> Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(body.len());
    let mut pos = 0;

    while pos < body.len() {
        let Some(offset) = body[pos..].windows(2).position(|w| w == CRLF) else {
            break;
        };
        let line_end = pos + offset;
        let size_line = String::from_utf8_lossy(&body[pos..line_end]);
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| Error::Wire(format!("invalid chunk size '{}'", size_hex)))?;
        pos = line_end + 2;

        if size == 0 {
            break;
        }

        let end = pos
            .checked_add(size)
            .filter(|end| *end <= body.len())
            .ok_or_else(|| Error::Wire("chunk size exceeds body".to_string()))?;
        decoded.extend_from_slice(&body[pos..end]);
        pos = end + 2;
    }

    Ok(decoded)
}

/// Encode a body as a single chunk followed by the last chunk.
pub(crate) fn encode_chunked(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 16);
    if !body.is_empty() {
        out.extend_from_slice(format!("{:x}\r\n", body.len()).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}
