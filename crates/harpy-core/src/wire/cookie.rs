use crate::har::{Cookie, KeyValue, Timestamp};

/// Cookies from a request's `Cookie` header: `a=1; b=2`.
pub(crate) fn parse_cookie_header(value: &str) -> Vec<Cookie> {
    value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => Cookie::pair(name.trim(), value.trim()),
            None => Cookie::pair(pair, ""),
        })
        .collect()
}

/// A cookie from a response's `Set-Cookie` header, with its attributes.
pub(crate) fn parse_set_cookie(value: &str) -> Option<Cookie> {
    let mut parts = value.split(';').map(str::trim);

    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::pair(name, value.trim());
    for attribute in parts {
        let (key, val) = match attribute.split_once('=') {
            Some((key, val)) => (key.trim(), val.trim()),
            None => (attribute, ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "path" => cookie.path = Some(val.to_string()),
            "domain" => cookie.domain = Some(val.to_string()),
            "expires" => match Timestamp::parse_http_date(val) {
                Some(expires) => cookie.expires = Some(expires),
                None => tracing::debug!("Ignoring unparseable cookie expiry: {:?}", val),
            },
            "httponly" => cookie.http_only = Some(true),
            "secure" => cookie.secure = Some(true),
            _ => {}
        }
    }

    Some(cookie)
}
