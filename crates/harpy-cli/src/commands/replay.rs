use super::read_input;
use crate::OutputFormat;
use anyhow::{Context, Result, bail};
use console::style;
use futures::StreamExt;
use harpy_core::analysis::{Analyzer, TimingAnalyzer};
use harpy_core::har::{
    Container, EncodeOptions, Entry, HarEntity, HarWriter, Log, Request, Timings,
};
use harpy_core::wire::{IngestOptions, WireMessage};
use harpy_engine::{Driver, EngineConfig, Outcome};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What `harpy replay` was asked to do.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// HAR archive, JSON lines or raw request; stdin when absent.
    pub input: Option<PathBuf>,
    /// Treat the input as one raw HTTP request.
    pub raw: bool,
    /// Scheme for raw requests with an origin-form target.
    pub scheme: String,
    /// Connect here instead of resolving each request's host.
    pub server_ip: Option<String>,
    /// Write the replayed entries to this HAR file.
    pub output: Option<PathBuf>,
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_response_bytes: usize,
}

/// Load the requests to replay from any of the supported input forms.
pub fn load_requests(content: &[u8], raw: bool, scheme: &str) -> Result<Vec<Request>> {
    if raw {
        let options = IngestOptions {
            scheme: scheme.to_string(),
            comment: None,
        };
        let request = Request::ingest_with(content, &options).context("Invalid raw request")?;
        return Ok(vec![request]);
    }

    let text = std::str::from_utf8(content).context("Input is not UTF-8 JSON")?;

    // a whole HAR archive
    if let Ok(value) = serde_json::from_str::<Value>(text)
        && value.get("log").is_some()
    {
        let har = Container::from_value(&value).context("Invalid HAR archive")?;
        return Ok(har
            .entries()
            .iter()
            .filter_map(|entry| entry.request.clone())
            .collect());
    }

    // one request object per line
    let mut requests = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match Request::from_json(line) {
            Ok(request) => requests.push(request),
            Err(e) => eprintln!(
                "{} line {}: {}",
                style("✗ Skipping").yellow(),
                line_no + 1,
                e
            ),
        }
    }
    Ok(requests)
}

pub async fn execute(
    options: &ReplayOptions,
    format: OutputFormat,
    encode: &EncodeOptions,
) -> Result<()> {
    let content = read_input(options.input.as_deref())?;
    let mut requests = load_requests(&content, options.raw, &options.scheme)?;

    if requests.is_empty() {
        bail!("No requests to replay");
    }

    if let Some(ip) = &options.server_ip {
        for request in &mut requests {
            request.server_ip_address.get_or_insert_with(|| ip.clone());
        }
    }

    tracing::info!("Replaying {} requests", requests.len());

    let config = EngineConfig::default()
        .with_timeout(options.timeout)
        .with_max_in_flight(options.concurrency)
        .with_max_response_bytes(options.max_response_bytes);
    let driver = Driver::tokio(config);

    let total = requests.len();
    let mut entries: Vec<(usize, Entry)> = Vec::new();
    let mut failed = 0;

    let mut outcomes = std::pin::pin!(driver.run(requests));
    while let Some(outcome) = outcomes.next().await {
        report(&outcome, format)?;
        match outcome.result {
            Ok(entry) => entries.push((outcome.index, entry)),
            Err(_) => failed += 1,
        }
    }

    entries.sort_by_key(|(index, _)| *index);
    let mut log = Log::with_defaults();
    for (_, entry) in entries {
        log.push_entry(entry);
    }
    let har = Container::new(log);

    if let Some(path) = &options.output {
        write_har(&har, path, encode)?;
        if format == OutputFormat::Pretty {
            println!(
                "{} Wrote {} entries to {}",
                style("✓").green(),
                har.entries().len(),
                path.display()
            );
        }
    }

    if format == OutputFormat::Pretty {
        print_summary(&har, total, failed)?;
    }

    if failed > 0 {
        bail!("{} of {} requests failed", failed, total);
    }
    Ok(())
}

fn write_har(har: &Container, path: &Path, encode: &EncodeOptions) -> Result<()> {
    HarWriter::to_file(har, path, encode)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn label(outcome: &Outcome) -> String {
    match outcome.sequence {
        Some(sequence) => format!("[{}]", sequence),
        None => format!("#{}", outcome.index + 1),
    }
}

fn phases(timings: &Timings) -> String {
    [
        ("dns", timings.dns),
        ("connect", timings.connect),
        ("send", timings.send),
        ("wait", timings.wait),
    ]
    .into_iter()
    .filter_map(|(name, ms)| {
        ms.filter(|ms| *ms >= 0.0)
            .map(|ms| format!("{} {:.3}", name, ms))
    })
    .collect::<Vec<_>>()
    .join(", ")
}

/// One line per finished request: stdout for successes, stderr for failures.
fn report(outcome: &Outcome, format: OutputFormat) -> Result<()> {
    match (&outcome.result, format) {
        (Ok(entry), OutputFormat::Json) => {
            let line = json!({
                "index": outcome.index,
                "sequence": outcome.sequence,
                "status": entry.response.as_ref().map(|r| r.status()),
                "time": entry.time(),
                "timings": entry.timings,
            });
            println!("{}", serde_json::to_string(&line)?);
        }
        (Ok(entry), OutputFormat::Table) => {
            let timings = entry.timings.clone().unwrap_or_default();
            println!(
                "{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3}",
                outcome.index,
                outcome.sequence.map(|s| s.to_string()).unwrap_or_default(),
                entry.response.as_ref().map(|r| r.status()).unwrap_or(-1),
                entry.time(),
                timings.dns.unwrap_or(-1.0),
                timings.connect.unwrap_or(-1.0),
                timings.send.unwrap_or(-1.0),
                timings.wait.unwrap_or(-1.0),
            );
        }
        (Ok(entry), OutputFormat::Pretty) => {
            let (status, status_text) = entry
                .response
                .as_ref()
                .map(|r| (r.status(), r.status_text().to_string()))
                .unwrap_or((-1, String::new()));
            let (method, url) = entry
                .request
                .as_ref()
                .map(|r| (r.method().to_string(), r.url().to_string()))
                .unwrap_or_default();
            let status = format!("{} {}", status, status_text);
            let ok = entry
                .response
                .as_ref()
                .is_some_and(|r| (200..400).contains(&r.status()));
            let styled = if ok {
                style(status).green()
            } else {
                style(status).yellow()
            };

            println!(
                "{} {} {} {} {}",
                style("✓").green(),
                style(label(outcome)).dim(),
                styled,
                method,
                url
            );
            if let Some(timings) = &entry.timings {
                println!("    {:.3} ms ({})", entry.time(), phases(timings));
            }
        }
        (Err(e), OutputFormat::Json) => {
            let line = json!({
                "index": outcome.index,
                "sequence": outcome.sequence,
                "error": e.to_string(),
            });
            eprintln!("{}", serde_json::to_string(&line)?);
        }
        (Err(e), _) => {
            eprintln!("{} {} {}", style("✗").red(), style(label(outcome)).dim(), e);
        }
    }
    Ok(())
}

fn print_summary(har: &Container, total: usize, failed: usize) -> Result<()> {
    println!();
    println!(
        "{} {} of {} requests completed",
        style("Replay:").bold(),
        total - failed,
        total
    );

    let timing = TimingAnalyzer::new(3).analyze(har)?;
    if har.entries().is_empty() {
        return Ok(());
    }

    println!(
        "  Average: {:.3} ms   Median: {:.3} ms",
        timing.average_time, timing.median_time
    );
    for phase in &timing.phase_averages {
        println!(
            "  {:<8} {:.3} ms ({} samples)",
            phase.phase, phase.average, phase.samples
        );
    }
    Ok(())
}
