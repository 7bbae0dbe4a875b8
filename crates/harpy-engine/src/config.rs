use crate::scheduler::DEFAULT_MAX_RESPONSE_BYTES;
use std::time::Duration;

/// Limits applied to every replayed request.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub resolve_timeout: Duration,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
    /// Time allowed for the whole response to arrive.
    pub wait_timeout: Duration,
    /// Machines polled at once by the driver.
    pub max_in_flight: usize,
    /// Responses larger than this fail in the wait phase.
    pub max_response_bytes: usize,
}

impl EngineConfig {
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Apply the same limit to every phase.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self.connect_timeout = timeout;
        self.send_timeout = timeout;
        self.wait_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(30),
            max_in_flight: 32,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = EngineConfig::default()
            .with_max_in_flight(0)
            .with_timeout(Duration::from_millis(250))
            .with_max_response_bytes(1024);
        assert_eq!(config.max_in_flight, 1);
        assert_eq!(config.max_response_bytes, 1024);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.wait_timeout, Duration::from_millis(250));
    }
}
