//! Command implementations behind the `harpy` binary.

use clap::ValueEnum;

pub mod commands;

/// How command results are printed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Styled text for terminals
    #[default]
    Pretty,
    /// JSON documents, or one JSON object per line for streamed results
    Json,
    /// Comma-separated rows
    Table,
}
