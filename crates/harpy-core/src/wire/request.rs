use super::cookie::parse_cookie_header;
use super::head::{split_message, upsert_header, write_head};
use super::{IngestOptions, WireMessage, render_body, required};
use crate::har::{HarEntity, KeyValue, PostData, QueryParam, Request};
use crate::{Error, Result};
use std::fmt::Write as _;
use url::form_urlencoded;

/// MIME type recorded for request bodies sent without a Content-Type.
const DEFAULT_BODY_MIME: &str = "application/octet-stream";

impl WireMessage for Request {
    fn ingest_with(raw: &[u8], options: &IngestOptions) -> Result<Self> {
        let (head, body) = split_message(raw)?;

        let mut parts = head.start_line.splitn(3, ' ');
        let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Wire(format!(
                "malformed request line '{}'",
                head.start_line
            )));
        };
        if method.is_empty() || target.is_empty() || !version.starts_with("HTTP/") {
            return Err(Error::Wire(format!(
                "malformed request line '{}'",
                head.start_line
            )));
        }

        let url = absolute_url(target, head.header("Host"), &options.scheme);
        let query_string = parse_query(target);
        let cookies = head
            .header_values("Cookie")
            .flat_map(parse_cookie_header)
            .collect();
        let post_data = (!body.is_empty()).then(|| {
            PostData::from_bytes(head.header("Content-Type").unwrap_or(DEFAULT_BODY_MIME), body)
        });

        let request = Request {
            method: Some(method.to_string()),
            url: Some(url),
            http_version: Some(version.to_string()),
            cookies: Some(cookies),
            query_string: Some(query_string),
            post_data,
            headers_size: Some(head.size as i64),
            body_size: Some(body.len() as i64),
            comment: options.comment.clone(),
            headers: Some(head.headers),
            ..Default::default()
        };

        request.validate()?;
        Ok(request)
    }

    fn emit(&self) -> Result<Vec<u8>> {
        let method = required(&self.method, "Request", "method")?;
        let url = required(&self.url, "Request", "url")?;
        let version = required(&self.http_version, "Request", "httpVersion")?;

        let body = match &self.post_data {
            Some(post_data) => post_data.body()?,
            None => Vec::new(),
        };

        let start_line = format!("{} {} {}", method, request_target(method, url), version);
        let mut out = Vec::with_capacity(start_line.len() + body.len() + 256);
        write_head(&mut out, &start_line, self.headers());
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn render(&self) -> String {
        let mut out = format!("{} {} {}\n", self.method(), self.url(), self.http_version());
        for header in self.headers() {
            let _ = writeln!(out, "  {}: {}", header.key(), header.value());
        }
        if let Some(post_data) = &self.post_data {
            match post_data.body() {
                Ok(body) => render_body(&mut out, post_data.mime_type(), &body),
                Err(e) => {
                    let _ = writeln!(out, "  [unreadable body: {}]", e);
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
        self.http_version.get_or_insert_with(|| "HTTP/1.1".to_string());
        self.cookies.get_or_insert_with(Vec::new);
        self.headers.get_or_insert_with(Vec::new);
        self.query_string.get_or_insert_with(Vec::new);
        self.headers_size.get_or_insert(-1);
        self.body_size.get_or_insert(-1);
    }
}

/// Full URL for a request target.
fn absolute_url(target: &str, host: Option<&str>, scheme: &str) -> String {
    if target.contains("://") {
        return target.to_string();
    }
    match host {
        Some(host) if target.starts_with('/') => format!("{}://{}{}", scheme, host, target),
        Some(host) if target == "*" => format!("{}://{}", scheme, host),
        _ => target.to_string(),
    }
}

/// Origin-form target of a URL: path and query, `/` when there is no path.
/// An `OPTIONS` request for a bare authority targets the whole server (`*`).
fn request_target<'a>(method: &str, url: &'a str) -> &'a str {
    let Some(scheme_end) = url.find("://") else {
        return url;
    };
    let rest = &url[scheme_end + 3..];
    match rest.find(['/', '?']) {
        Some(start) => {
            let target = &rest[start..];
            target.split('#').next().unwrap_or(target)
        }
        None if method.eq_ignore_ascii_case("OPTIONS") => "*",
        None => "/",
    }
}

fn parse_query(target: &str) -> Vec<QueryParam> {
    let Some((_, query)) = target.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| QueryParam::pair(name, value))
        .collect()
}
