mod summary;
mod timing;

pub use summary::SummaryAnalyzer;
pub use timing::TimingAnalyzer;

use crate::har::Container;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: SummaryStats,
    pub timing: TimingStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_entries: usize,
    pub total_size: u64,
    pub unique_hosts: usize,
    /// Entries per status class ("2xx", "4xx", ...), sorted by class.
    pub status_classes: Vec<(String, usize)>,
    pub http_versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingStats {
    pub total_time: f64,
    pub average_time: f64,
    pub median_time: f64,
    /// Mean of each measured phase; phases never measured are absent.
    pub phase_averages: Vec<PhaseAverage>,
    pub slowest_requests: Vec<SlowRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseAverage {
    pub phase: String,
    pub average: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowRequest {
    pub url: String,
    pub time: f64,
    pub method: String,
    pub status: i64,
}

pub trait Analyzer {
    type Output;

    fn analyze(&self, har: &Container) -> crate::Result<Self::Output>;
}
