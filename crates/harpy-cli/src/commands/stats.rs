use crate::OutputFormat;
use anyhow::Result;
use console::style;
use harpy_core::analysis::{AnalysisReport, Analyzer, SummaryAnalyzer, TimingAnalyzer};
use harpy_core::har::HarReader;
use std::path::Path;

/// Analyze a HAR file and return structured results
pub fn analyze_har(file: &Path, top: usize) -> Result<AnalysisReport> {
    tracing::debug!("Reading HAR file: {}", file.display());

    let har = HarReader::from_file(file)?;

    let summary = SummaryAnalyzer.analyze(&har)?;
    let timing = TimingAnalyzer::new(top).analyze(&har)?;

    Ok(AnalysisReport { summary, timing })
}

pub fn execute(file: &Path, top: usize, format: OutputFormat) -> Result<()> {
    tracing::info!("Extracting statistics from HAR file: {}", file.display());

    let report = analyze_har(file, top)?;

    match format {
        OutputFormat::Json => output_json(&report)?,
        OutputFormat::Table => output_table(&report),
        OutputFormat::Pretty => output_pretty(&report),
    }

    Ok(())
}

fn output_pretty(report: &AnalysisReport) {
    println!("\n{}", style("HAR Statistics").bold().cyan());
    println!("{}", style("==============").cyan());

    println!("\n{}", style("Summary:").bold());
    println!("  Total Entries:      {}", report.summary.total_entries);
    println!("  Unique Hosts:       {}", report.summary.unique_hosts);
    println!("  Response Body Size: {} bytes", report.summary.total_size);

    if !report.summary.http_versions.is_empty() {
        println!(
            "  HTTP Versions:      {}",
            report.summary.http_versions.join(", ")
        );
    }

    if !report.summary.status_classes.is_empty() {
        let classes: Vec<String> = report
            .summary
            .status_classes
            .iter()
            .map(|(class, count)| format!("{} {}", class, count))
            .collect();
        println!("  Status:             {}", classes.join(", "));
    }

    println!("\n{}", style("Timings:").bold());
    println!("  Total Time:   {:.2} ms", report.timing.total_time);
    println!("  Average Time: {:.2} ms", report.timing.average_time);
    println!("  Median Time:  {:.2} ms", report.timing.median_time);

    for phase in &report.timing.phase_averages {
        println!(
            "    {:<8} {:>10.2} ms  ({} samples)",
            phase.phase, phase.average, phase.samples
        );
    }

    if !report.timing.slowest_requests.is_empty() {
        println!("\n{}", style("Slowest Requests:").bold());
        for (i, req) in report.timing.slowest_requests.iter().enumerate() {
            println!(
                "  {}. [{:.2} ms] {} {} - {}",
                i + 1,
                req.time,
                req.method,
                req.status,
                req.url
            );
        }
    }

    println!();
}

fn output_json(report: &AnalysisReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{}", json);
    Ok(())
}

fn output_table(report: &AnalysisReport) {
    println!("Metric,Value");
    println!("Total Entries,{}", report.summary.total_entries);
    println!("Unique Hosts,{}", report.summary.unique_hosts);
    println!("Response Body Size (bytes),{}", report.summary.total_size);
    println!("Total Time (ms),{:.2}", report.timing.total_time);
    println!("Average Time (ms),{:.2}", report.timing.average_time);
    println!("Median Time (ms),{:.2}", report.timing.median_time);

    for phase in &report.timing.phase_averages {
        println!("Average {} (ms),{:.2}", phase.phase, phase.average);
    }
}
