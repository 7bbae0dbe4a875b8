use super::read_input;
use crate::OutputFormat;
use anyhow::{Context, Result};
use harpy_core::har::{EncodeOptions, HarWriter};
use harpy_core::wire::{self, IngestOptions, Message};
use serde_json::Value;
use std::path::Path;

/// Parse raw HTTP bytes into a request or response entity.
pub fn ingest_message(raw: &[u8], scheme: &str, comment: Option<String>) -> Result<Message> {
    let options = IngestOptions {
        scheme: scheme.to_string(),
        comment,
    };
    let message = wire::ingest_with(raw, &options).context("Failed to parse HTTP message")?;
    Ok(message)
}

/// The message's JSON form with timestamps pinned to `encode`'s offset.
pub fn encode_message(message: &Message, encode: &EncodeOptions) -> Result<Value> {
    let value = match message {
        Message::Request(request) => HarWriter::encode(request, encode)?,
        Message::Response(response) => HarWriter::encode(response, encode)?,
    };
    Ok(value)
}

pub fn execute(
    input: Option<&Path>,
    scheme: &str,
    comment: Option<String>,
    render: bool,
    format: OutputFormat,
    encode: &EncodeOptions,
) -> Result<()> {
    let raw = read_input(input)?;
    tracing::debug!("Ingesting {} bytes", raw.len());

    let message = ingest_message(&raw, scheme, comment)?;

    if render {
        print!("{}", message.render());
        return Ok(());
    }

    let value = encode_message(&message, encode)?;
    match format {
        OutputFormat::Json | OutputFormat::Table => println!("{}", serde_json::to_string(&value)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(&value)?),
    }

    Ok(())
}
