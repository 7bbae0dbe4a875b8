pub mod emit;
pub mod ingest;
pub mod replay;
pub mod stats;
pub mod validate;

use anyhow::{Context, Result, bail};
use chrono::FixedOffset;
use harpy_core::har::EncodeOptions;
use std::io::Read;
use std::path::Path;

/// Read a whole input file, or stdin when no path (or `-`) is given.
pub fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    match path {
        Some(path) if path != Path::new("-") => {
            content = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
        }
        _ => {
            std::io::stdin()
                .read_to_end(&mut content)
                .context("Failed to read stdin")?;
        }
    }
    Ok(content)
}

/// Parse a UTC offset such as `+02:00`, `-0530`, `Z` or `UTC`.
pub fn parse_utc_offset(text: &str) -> Result<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).context("zero offset");
    }

    let (sign, rest) = match text.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => bail!("UTC offset '{}' must start with + or -", text),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("UTC offset '{}' must look like +HH:MM", text);
    }

    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = digits[2..].parse()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("UTC offset '{}' is out of range", text))
}

pub fn encode_options(utc_offset: &str) -> Result<EncodeOptions> {
    Ok(EncodeOptions::with_offset(parse_utc_offset(utc_offset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+02:00").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_utc_offset("-0530").unwrap().local_minus_utc(), -19800);
        assert!(parse_utc_offset("0200").is_err());
        assert!(parse_utc_offset("+2").is_err());
        assert!(parse_utc_offset("+99:00").is_err());
    }
}
