use super::cookie::parse_set_cookie;
use super::head::{decode_chunked, encode_chunked, split_message, upsert_header, write_head};
use super::{IngestOptions, WireMessage, render_body, required};
use crate::har::{Content, HarEntity, KeyValue, Response};
use crate::{Error, Result};
use std::fmt::Write as _;

const UNKNOWN_MIME: &str = "x-unknown";

impl WireMessage for Response {
    fn ingest_with(raw: &[u8], options: &IngestOptions) -> Result<Self> {
        let (head, body) = split_message(raw)?;

        let mut parts = head.start_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(Error::Wire(format!(
                "malformed status line '{}'",
                head.start_line
            )));
        }
        let status: u16 = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| Error::Wire(format!("malformed status line '{}'", head.start_line)))?;
        let status_text = parts.next().unwrap_or_default();

        let body = match head.content_length() {
            Some(len) if !head.is_chunked() && len < body.len() => &body[..len],
            _ => body,
        };
        let decoded = if head.is_chunked() {
            decode_chunked(body)?
        } else {
            body.to_vec()
        };

        let content = Content::from_bytes(head.header("Content-Type").unwrap_or(UNKNOWN_MIME), &decoded);
        let cookies = head
            .header_values("Set-Cookie")
            .filter_map(parse_set_cookie)
            .collect();

        let response = Response {
            status: Some(i64::from(status)),
            status_text: Some(status_text.to_string()),
            http_version: Some(version.to_string()),
            cookies: Some(cookies),
            content: Some(content),
            redirect_url: Some(head.header("Location").unwrap_or_default().to_string()),
            headers_size: Some(head.size as i64),
            body_size: Some(body.len() as i64),
            comment: options.comment.clone(),
            headers: Some(head.headers),
            ..Default::default()
        };

        response.validate()?;
        Ok(response)
    }

    fn emit(&self) -> Result<Vec<u8>> {
        let version = required(&self.http_version, "Response", "httpVersion")?;
        let status = self.status.ok_or(Error::MissingValue {
            entity: "Response",
            field: "status",
        })?;

        let body = match &self.content {
            Some(content) => content.body()?,
            None => Vec::new(),
        };
        let chunked = self
            .header("Transfer-Encoding")
            .is_some_and(|te| te.to_ascii_lowercase().contains("chunked"));

        let start_line = format!("{} {} {}", version, status, self.status_text());
        let mut out = Vec::with_capacity(start_line.len() + body.len() + 256);
        write_head(&mut out, &start_line, self.headers());
        if chunked {
            out.extend_from_slice(&encode_chunked(&body));
        } else {
            out.extend_from_slice(&body);
        }
        Ok(out)
    }

    fn render(&self) -> String {
        let mut out = format!(
            "{} {} {}\n",
            self.http_version(),
            self.status(),
            self.status_text()
        );
        for header in self.headers() {
            let _ = writeln!(out, "  {}: {}", header.key(), header.value());
        }
        if let Some(content) = &self.content {
            match content.body() {
                Ok(body) => render_body(&mut out, content.mime_type(), &body),
                Err(e) => {
                    let _ = writeln!(out, "  [unreadable content: {}]", e);
                }
            }
        }
        out
    }

    fn set_header(&mut self, name: &str, value: &str) {
        upsert_header(self.headers.get_or_insert_with(Vec::new), name, value);
        self.headers_size = Some(-1);
    }

    fn set_defaults(&mut self) {
        self.status_text.get_or_insert_with(String::new);
        self.http_version.get_or_insert_with(|| "HTTP/1.1".to_string());
        self.cookies.get_or_insert_with(Vec::new);
        self.headers.get_or_insert_with(Vec::new);
        self.content.get_or_insert_with(Content::with_defaults);
        self.redirect_url.get_or_insert_with(String::new);
        self.headers_size.get_or_insert(-1);
        self.body_size.get_or_insert(-1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/html; charset=utf-8\r\n\
Content-Length: 21\r\n\
Set-Cookie: session=xyz; Path=/; HttpOnly\r\n\
\r\n\
<html>hi there</html>";

    const CHUNKED: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/plain\r\n\
Transfer-Encoding: chunked\r\n\
\r\n\
5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n";

    #[test]
    fn test_ingest_response() {
        let response = Response::ingest(OK).unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.status_text(), "OK");
        assert_eq!(response.http_version(), "HTTP/1.1");
        assert_eq!(response.body_size(), 21);
        assert_eq!(response.headers_size(), (OK.len() - 21) as i64);

        let content = response.content.as_ref().unwrap();
        assert_eq!(content.mime_type(), "text/html; charset=utf-8");
        assert_eq!(content.size(), 21);
        assert_eq!(content.text.as_deref(), Some("<html>hi there</html>"));

        let cookie = &response.cookies()[0];
        assert_eq!(cookie.key(), "session");
        assert_eq!(cookie.http_only, Some(true));
    }

    #[test]
    fn test_chunked_body_is_decoded() {
        let response = Response::ingest(CHUNKED).unwrap();
        let content = response.content.as_ref().unwrap();
        assert_eq!(content.text.as_deref(), Some("hello world"));
        assert_eq!(content.size(), 11);
        assert_eq!(response.body_size(), 26);
    }

    #[test]
    fn test_oversized_chunk_is_rejected() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
ffffffffffffffff\r\nabc\r\n0\r\n\r\n";
        assert!(matches!(Response::ingest(raw), Err(Error::Wire(_))));
    }

    #[test]
    fn test_emit_reencodes_chunked() {
        let response = Response::ingest(CHUNKED).unwrap();
        let emitted = response.emit().unwrap();
        assert!(emitted.ends_with(b"\r\n\r\nb\r\nhello world\r\n0\r\n\r\n"));
    }

    #[test]
    fn test_round_trip_with_length() {
        let response = Response::ingest(OK).unwrap();
        assert_eq!(response.emit().unwrap(), OK.to_vec());
    }

    #[test]
    fn test_redirect_and_empty_body() {
        let raw = b"HTTP/1.1 301 Moved Permanently\r\nLocation: https://example.com/\r\n\r\n";
        let response = Response::ingest(raw).unwrap();
        assert_eq!(response.redirect_url(), "https://example.com/");
        assert_eq!(response.body_size(), 0);

        let content = response.content.as_ref().unwrap();
        assert_eq!(content.mime_type(), UNKNOWN_MIME);
        assert!(content.text.is_none());
        assert_eq!(response.emit().unwrap(), raw.to_vec());
    }

    #[test]
    fn test_status_without_reason() {
        let response = Response::ingest(b"HTTP/1.1 204 \r\n\r\n").unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(response.status_text(), "");
    }

    #[test]
    fn test_malformed_status_line() {
        assert!(matches!(
            Response::ingest(b"HTTP/1.1 abc OK\r\n\r\n"),
            Err(Error::Wire(_))
        ));
        assert!(matches!(
            Response::ingest(b"GET / HTTP/1.1\r\n\r\n"),
            Err(Error::Wire(_))
        ));
    }

    #[test]
    fn test_set_defaults_makes_valid_response() {
        let mut response = Response {
            status: Some(200),
            ..Default::default()
        };
        response.set_defaults();
        assert!(response.validate().is_ok());
        assert_eq!(response.content.as_ref().map(|c| c.size()), Some(0));
    }

    #[test]
    fn test_render() {
        let rendered = Response::ingest(OK).unwrap().render();
        assert!(rendered.starts_with("HTTP/1.1 200 OK\n"));
        assert!(rendered.contains("  Set-Cookie: session=xyz; Path=/; HttpOnly\n"));
        assert!(rendered.contains("[21 bytes text/html; charset=utf-8]"));
    }
}
