use crate::machine::Phase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Socket error during {phase}: {source}")]
    Socket {
        phase: Phase,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out during {phase}")]
    Timeout { phase: Phase },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Core(#[from] harpy_core::Error),
}

impl Error {
    /// Phase a network failure happened in.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Error::Socket { phase, .. } | Error::Timeout { phase } => Some(*phase),
            _ => None,
        }
    }

    pub fn is_socket(&self) -> bool {
        matches!(self, Error::Socket { .. } | Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
