use super::read_input;
use anyhow::{Context, Result, bail};
use harpy_core::har::{Container, HarEntity, Request, Response};
use harpy_core::wire::{Message, WireMessage};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// Which message of a HAR archive to emit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selection {
    /// Zero-based entry index.
    pub entry: usize,
    /// Emit the entry's response instead of its request.
    pub response: bool,
}

/// Pick the message to emit from a JSON document.
///
/// A HAR archive yields the selected entry's request or response; a bare
/// request or response object is used as is.
pub fn load_message(content: &[u8], selection: Selection) -> Result<Message> {
    let text = std::str::from_utf8(content).context("Input is not UTF-8 JSON")?;
    let value: Value = serde_json::from_str(text).context("Input is not JSON")?;

    if value.get("log").is_some() {
        let har = Container::from_value(&value)?;
        let count = har.entries().len();
        let Some(entry) = har.entries().get(selection.entry) else {
            bail!("Entry {} out of range ({} entries)", selection.entry, count);
        };

        let message = if selection.response {
            entry.response.clone().map(Message::Response)
        } else {
            entry.request.clone().map(Message::Request)
        };
        return message.with_context(|| {
            format!(
                "Entry {} has no {}",
                selection.entry,
                if selection.response { "response" } else { "request" }
            )
        });
    }

    if value.get("status").is_some() {
        Ok(Message::Response(Response::from_value(&value)?))
    } else {
        Ok(Message::Request(Request::from_value(&value)?))
    }
}

pub fn execute(input: Option<&Path>, selection: Selection) -> Result<()> {
    let content = read_input(input)?;
    let mut message = load_message(&content, selection)?;

    match &mut message {
        Message::Request(request) => request.set_defaults(),
        Message::Response(response) => response.set_defaults(),
    }

    let raw = message.emit()?;
    tracing::debug!("Emitting {} bytes", raw.len());

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&raw)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harpy_core::har::{EncodeOptions, Entry, HarWriter, Log};

    fn archive() -> Vec<u8> {
        let mut log = Log::with_defaults();
        log.push_entry(Entry::with_defaults());
        HarWriter::to_string(&Container::new(log), &EncodeOptions::default())
            .unwrap()
            .into_bytes()
    }

    #[test]
    fn test_select_request_from_archive() {
        let message = load_message(&archive(), Selection::default()).unwrap();
        assert_eq!(
            message.emit().unwrap(),
            b"GET / HTTP/1.1\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_select_response_from_archive() {
        let selection = Selection {
            entry: 0,
            response: true,
        };
        let message = load_message(&archive(), selection).unwrap();
        assert!(matches!(message, Message::Response(_)));
    }

    #[test]
    fn test_entry_out_of_range() {
        let selection = Selection {
            entry: 3,
            response: false,
        };
        let err = load_message(&archive(), selection).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_bare_request_object() {
        let json = br#"{"method": "HEAD", "url": "http://a.test/x?y=1", "httpVersion": "HTTP/1.0",
            "cookies": [], "headers": [{"name": "Host", "value": "a.test"}], "queryString": [],
            "headersSize": -1, "bodySize": 0}"#;
        let message = load_message(json, Selection::default()).unwrap();
        assert_eq!(
            message.emit().unwrap(),
            b"HEAD /x?y=1 HTTP/1.0\r\nHost: a.test\r\n\r\n".to_vec()
        );
    }
}
