use crate::OutputFormat;
use anyhow::Result;
use console::style;
use harpy_core::har::HarReader;
use serde::Serialize;
use std::path::Path;

/// What a successful validation found.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub file: String,
    pub version: String,
    pub creator: String,
    pub pages: usize,
    pub entries: usize,
}

/// Read a HAR file, check it against the format and summarize it.
pub fn validate_har(file: &Path) -> Result<ValidationReport> {
    let har = HarReader::from_file(file)?;
    HarReader::validate(&har)?;

    let log = har.log.unwrap_or_default();
    let creator = log
        .creator
        .as_ref()
        .map(|c| {
            format!(
                "{} {}",
                c.name.as_deref().unwrap_or_default(),
                c.version.as_deref().unwrap_or_default()
            )
        })
        .unwrap_or_default();

    Ok(ValidationReport {
        file: file.display().to_string(),
        version: log.version().to_string(),
        creator: creator.trim().to_string(),
        pages: log.pages().len(),
        entries: log.entries().len(),
    })
}

pub fn execute(file: &Path, format: OutputFormat) -> Result<()> {
    tracing::info!("Validating HAR file: {}", file.display());

    let report = match validate_har(file) {
        Ok(report) => report,
        Err(e) => {
            if format == OutputFormat::Pretty {
                eprintln!("{} {}", style("✗ Invalid:").red().bold(), file.display());
            }
            return Err(e);
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            println!("File,Version,Creator,Pages,Entries");
            println!(
                "{},{},{},{},{}",
                report.file, report.version, report.creator, report.pages, report.entries
            );
        }
        OutputFormat::Pretty => {
            println!("{} {}", style("✓ Valid:").green().bold(), report.file);
            println!("  HAR Version: {}", report.version);
            println!("  Creator:     {}", report.creator);
            println!("  Pages:       {}", report.pages);
            println!("  Entries:     {}", report.entries);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harpy_core::har::{Container, EncodeOptions, Entry, HarEntity, HarWriter, Log};

    #[test]
    fn test_validate_written_archive() {
        let mut log = Log::with_defaults();
        log.push_entry(Entry::with_defaults());
        let har = Container::new(log);

        let file = tempfile::NamedTempFile::new().unwrap();
        HarWriter::to_file(&har, file.path(), &EncodeOptions::default()).unwrap();

        let report = validate_har(file.path()).unwrap();
        assert_eq!(report.version, "1.2");
        assert_eq!(report.entries, 1);
        assert!(report.creator.starts_with("Harpy"));
    }

    #[test]
    fn test_validate_rejects_missing_log() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{}").unwrap();
        assert!(validate_har(file.path()).is_err());
    }
}
