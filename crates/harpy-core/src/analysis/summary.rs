use super::{Analyzer, SummaryStats};
use crate::Result;
use crate::har::Container;
use crate::wire::normalize_http_version;
use std::collections::{BTreeMap, HashSet};
use url::Url;

pub struct SummaryAnalyzer;

impl Analyzer for SummaryAnalyzer {
    type Output = SummaryStats;

    fn analyze(&self, har: &Container) -> Result<Self::Output> {
        tracing::debug!("Analyzing HAR summary statistics");

        let entries = har.entries();
        let total_entries = entries.len();

        let responses = entries.iter().filter_map(|e| e.response.as_ref());

        let total_size: u64 = responses
            .clone()
            .map(|r| r.body_size().max(0) as u64)
            .sum();

        let mut status_classes = BTreeMap::new();
        for response in responses {
            let class = match response.status() {
                status @ 100..=599 => format!("{}xx", status / 100),
                _ => "no response".to_string(),
            };
            *status_classes.entry(class).or_insert(0) += 1;
        }

        let mut hosts = HashSet::new();
        let mut http_versions = HashSet::new();
        for request in entries.iter().filter_map(|e| e.request.as_ref()) {
            if let Ok(url) = Url::parse(request.url())
                && let Some(host) = url.host_str()
            {
                hosts.insert(host.to_string());
            }

            let normalized = normalize_http_version(request.http_version());
            if !normalized.is_empty() {
                http_versions.insert(normalized);
            }
        }

        let mut http_versions: Vec<String> = http_versions.into_iter().collect();
        http_versions.sort();

        tracing::info!(
            "Summary analysis complete: {} entries, {} hosts",
            total_entries,
            hosts.len()
        );

        Ok(SummaryStats {
            total_entries,
            total_size,
            unique_hosts: hosts.len(),
            status_classes: status_classes.into_iter().collect(),
            http_versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::har::{Entry, HarEntity, Log};

    fn entry(url: &str, version: &str, status: i64, body_size: i64) -> Entry {
        let mut entry = Entry::with_defaults();
        let request = entry.request.as_mut().unwrap();
        request.url = Some(url.to_string());
        request.http_version = Some(version.to_string());
        let response = entry.response.as_mut().unwrap();
        response.status = Some(status);
        response.body_size = Some(body_size);
        entry
    }

    #[test]
    fn test_summary_counts() {
        let mut log = Log::with_defaults();
        log.push_entry(entry("http://a.example/", "http/1.1", 200, 100));
        log.push_entry(entry("http://b.example/x", "h2", 404, -1));
        log.push_entry(entry("http://a.example/y", "HTTP/1.1", 204, 0));

        let stats = SummaryAnalyzer.analyze(&Container::new(log)).unwrap();

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.total_size, 100);
        assert_eq!(stats.unique_hosts, 2);
        assert_eq!(
            stats.status_classes,
            vec![("2xx".to_string(), 2), ("4xx".to_string(), 1)]
        );
        assert_eq!(stats.http_versions, vec!["HTTP/1.1", "HTTP/2.0"]);
    }
}
