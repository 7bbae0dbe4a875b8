use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read HAR file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to parse HTTP message: {0}")]
    Wire(String),

    #[error("{entity} is missing required field '{field}'")]
    MissingValue {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity}.{field}: expected {expected}, found {found}")]
    Validation {
        entity: &'static str,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("Invalid HAR structure: {0}")]
    InvalidStructure(String),
}

impl Error {
    /// True for failures raised while decoding JSON or raw HTTP text.
    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse(_) | Error::Wire(_))
    }

    pub(crate) fn validation(
        entity: &'static str,
        field: &'static str,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Error::Validation {
            entity,
            field,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
