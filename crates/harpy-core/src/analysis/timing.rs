use super::{Analyzer, PhaseAverage, SlowRequest, TimingStats};
use crate::Result;
use crate::har::{Container, Timings};

pub struct TimingAnalyzer {
    top_n: usize,
}

impl TimingAnalyzer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }
}

impl Default for TimingAnalyzer {
    fn default() -> Self {
        Self::new(10)
    }
}

const PHASES: [(&str, fn(&Timings) -> Option<f64>); 7] = [
    ("blocked", |t| t.blocked),
    ("dns", |t| t.dns),
    ("connect", |t| t.connect),
    ("ssl", |t| t.ssl),
    ("send", |t| t.send),
    ("wait", |t| t.wait),
    ("receive", |t| t.receive),
];

impl Analyzer for TimingAnalyzer {
    type Output = TimingStats;

    fn analyze(&self, har: &Container) -> Result<Self::Output> {
        tracing::debug!("Analyzing HAR timing statistics");

        let entries = har.entries();

        if entries.is_empty() {
            return Ok(TimingStats {
                total_time: 0.0,
                average_time: 0.0,
                median_time: 0.0,
                phase_averages: vec![],
                slowest_requests: vec![],
            });
        }

        let mut times: Vec<f64> = entries.iter().map(|e| e.time().max(0.0)).collect();
        let total_time: f64 = times.iter().sum();
        let average_time = total_time / entries.len() as f64;

        times.sort_by(f64::total_cmp);
        let median_time = if times.len().is_multiple_of(2) {
            let mid = times.len() / 2;
            (times[mid - 1] + times[mid]) / 2.0
        } else {
            times[times.len() / 2]
        };

        // -1 marks a phase that was not measured
        let phase_averages = PHASES
            .iter()
            .filter_map(|(phase, get)| {
                let samples: Vec<f64> = entries
                    .iter()
                    .filter_map(|e| e.timings.as_ref().and_then(get))
                    .filter(|ms| *ms >= 0.0)
                    .collect();
                (!samples.is_empty()).then(|| PhaseAverage {
                    phase: phase.to_string(),
                    average: samples.iter().sum::<f64>() / samples.len() as f64,
                    samples: samples.len(),
                })
            })
            .collect();

        let mut slow_requests: Vec<_> = entries
            .iter()
            .map(|e| {
                let request = e.request.clone().unwrap_or_default();
                SlowRequest {
                    url: request.url().to_string(),
                    time: e.time(),
                    method: request.method().to_string(),
                    status: e.response.as_ref().map_or(-1, |r| r.status()),
                }
            })
            .collect();

        slow_requests.sort_by(|a, b| b.time.total_cmp(&a.time));
        slow_requests.truncate(self.top_n);

        tracing::info!(
            "Timing analysis complete: avg={:.2}ms, median={:.2}ms",
            average_time,
            median_time
        );

        Ok(TimingStats {
            total_time,
            average_time,
            median_time,
            phase_averages,
            slowest_requests: slow_requests,
        })
    }
}
