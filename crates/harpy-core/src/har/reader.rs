use super::schema::HarEntity;
use super::types::Container;
use crate::{Error, Result};
use std::fs;
use std::path::Path;

pub struct HarReader;

impl HarReader {
    /// Read, parse and validate a HAR file from the given path
    pub fn from_file(path: &Path) -> Result<Container> {
        tracing::debug!("Reading HAR file from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let har = Self::from_str(&content)?;

        tracing::info!(
            "Successfully parsed HAR file with {} entries",
            har.entries().len()
        );

        Ok(har)
    }

    /// Parse and validate a HAR document from a JSON string
    pub fn from_str(content: &str) -> Result<Container> {
        tracing::debug!("Parsing HAR from string");

        let har = Container::from_json(content)?;

        tracing::debug!(
            "Successfully parsed HAR from string with {} entries",
            har.entries().len()
        );

        Ok(har)
    }

    /// Re-check a HAR structure that may have been modified after parsing
    pub fn validate(har: &Container) -> Result<()> {
        tracing::debug!("Validating HAR structure");

        har.validate()?;

        let Some(log) = &har.log else {
            return Err(Error::InvalidStructure("Missing log".to_string()));
        };

        if log.version().is_empty() {
            return Err(Error::InvalidStructure("Missing HAR version".to_string()));
        }

        if log.entries().is_empty() {
            tracing::warn!("HAR file contains no entries");
        }

        for (idx, entry) in log.entries().iter().enumerate() {
            let request = entry.request.as_ref();
            if request.is_none_or(|r| r.method().is_empty()) {
                return Err(Error::InvalidStructure(format!(
                    "Entry {} has empty request method",
                    idx
                )));
            }
            if request.is_none_or(|r| r.url().is_empty()) {
                return Err(Error::InvalidStructure(format!(
                    "Entry {} has empty request URL",
                    idx
                )));
            }
        }

        tracing::debug!("HAR structure is valid");
        Ok(())
    }
}
