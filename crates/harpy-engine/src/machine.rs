use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use harpy_core::har::{Cache, Entry, HarEntity, Request, Response, Timestamp, Timings};
use harpy_core::wire::{WireMessage, normalize_http_version};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use url::Url;

/// Network phase of a replay, named in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolve,
    Connect,
    Send,
    Wait,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Resolve => "resolve",
            Phase::Connect => "connect",
            Phase::Send => "send",
            Phase::Wait => "wait",
        };
        f.write_str(name)
    }
}

/// Where a machine is, with the data that phase owns.
enum State<C> {
    Resolving { host: String, port: u16 },
    Connecting { addr: IpAddr, port: u16 },
    Sending { conn: C, addr: IpAddr },
    Waiting { conn: C, addr: IpAddr },
    Closed(Box<Entry>),
    Errored(Error),
}

impl<C> State<C> {
    fn name(&self) -> &'static str {
        match self {
            State::Resolving { .. } => "resolving",
            State::Connecting { .. } => "connecting",
            State::Sending { .. } => "sending",
            State::Waiting { .. } => "waiting",
            State::Closed(_) => "closed",
            State::Errored(_) => "errored",
        }
    }
}

/// Replays one request and records how long each phase took.
///
/// A machine owns its request, timings and connection. Whatever goes wrong
/// ends in `Errored` and is handed back from [`Machine::run`]; nothing is
/// shared with other machines.
pub struct Machine<'a, S: Scheduler> {
    scheduler: &'a S,
    config: &'a EngineConfig,
    request: Request,
    sequence: Option<i64>,
    started: Timestamp,
    timings: Timings,
}

impl<'a, S: Scheduler> Machine<'a, S> {
    pub fn new(scheduler: &'a S, config: &'a EngineConfig, request: Request) -> Self {
        Self {
            scheduler,
            config,
            sequence: request.sequence,
            request,
            started: Timestamp::now(),
            timings: Timings::with_defaults(),
        }
    }

    pub fn sequence(&self) -> Option<i64> {
        self.sequence
    }

    /// Drive the request until it is closed or has failed.
    pub async fn run(mut self) -> Result<Entry> {
        let url = self.request.url().to_string();
        let mut state = self.prepare().unwrap_or_else(State::Errored);

        loop {
            state = match state {
                State::Closed(entry) => {
                    tracing::debug!(
                        "{} completed in {:.3} ms (sequence {:?})",
                        url,
                        entry.time(),
                        self.sequence
                    );
                    return Ok(*entry);
                }
                State::Errored(err) => {
                    tracing::warn!("Request to {} failed: {}", url, err);
                    return Err(err);
                }
                live => {
                    tracing::trace!("{}: {}", url, live.name());
                    self.advance(live).await.unwrap_or_else(State::Errored)
                }
            };
        }
    }

    /// Validate the request, make it ready for the wire and pick the first state.
    fn prepare(&mut self) -> Result<State<S::Conn>> {
        self.request.validate()?;

        let url = Url::parse(self.request.url())
            .map_err(|e| Error::InvalidTarget(format!("'{}': {}", self.request.url(), e)))?;
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::InvalidTarget(format!("no host in '{}'", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidTarget(format!("no port for '{}'", url)))?;

        if self.request.header("Host").is_none() {
            let authority = match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            self.request.set_header("Host", &authority);
        }

        let version = normalize_http_version(self.request.http_version());
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            tracing::debug!("Sending {} request as HTTP/1.1", version);
            self.request.http_version = Some("HTTP/1.1".to_string());
        }
        self.request.set_header("Connection", "close");

        match self.request.server_ip_address.as_deref() {
            Some(ip) => {
                let addr = ip.parse::<IpAddr>().map_err(|_| {
                    Error::InvalidTarget(format!("_serverIPAddress '{}' is not an IP address", ip))
                })?;
                Ok(State::Connecting { addr, port })
            }
            None => Ok(State::Resolving {
                host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                port,
            }),
        }
    }

    async fn advance(&mut self, state: State<S::Conn>) -> Result<State<S::Conn>> {
        match state {
            State::Resolving { host, port } => {
                let started = Instant::now();
                let addr = limit(
                    Phase::Resolve,
                    self.config.resolve_timeout,
                    self.scheduler.resolve(&host),
                )
                .await?;
                self.timings.dns = Some(elapsed_ms(started));
                tracing::debug!("Resolved {} to {}", host, addr);
                Ok(State::Connecting { addr, port })
            }

            State::Connecting { addr, port } => {
                let started = Instant::now();
                let conn = limit(
                    Phase::Connect,
                    self.config.connect_timeout,
                    self.scheduler.connect(addr, port),
                )
                .await?;
                self.timings.connect = Some(elapsed_ms(started));
                Ok(State::Sending { conn, addr })
            }

            State::Sending { mut conn, addr } => match self.send(&mut conn).await {
                Ok(()) => Ok(State::Waiting { conn, addr }),
                Err(e) => {
                    self.release(conn).await;
                    Err(e)
                }
            },

            State::Waiting { mut conn, addr } => {
                let response = match self.wait(&mut conn).await {
                    Ok(response) => response,
                    Err(e) => {
                        self.release(conn).await;
                        return Err(e);
                    }
                };
                self.release(conn).await;
                Ok(State::Closed(Box::new(self.finish(response, addr))))
            }

            terminal => Ok(terminal),
        }
    }

    async fn send(&mut self, conn: &mut S::Conn) -> Result<()> {
        let raw = self.request.emit()?;
        let body_len = match &self.request.post_data {
            Some(post_data) => post_data.body()?.len(),
            None => 0,
        };
        self.request.headers_size = Some((raw.len() - body_len) as i64);
        self.request.body_size = Some(body_len as i64);

        let started = Instant::now();
        limit(
            Phase::Send,
            self.config.send_timeout,
            self.scheduler.write(conn, &raw),
        )
        .await?;
        self.timings.send = Some(elapsed_ms(started));
        tracing::debug!("Sent {} bytes to {}", raw.len(), self.request.url());
        Ok(())
    }

    async fn wait(&mut self, conn: &mut S::Conn) -> Result<Response> {
        let started = Instant::now();
        let raw = limit(
            Phase::Wait,
            self.config.wait_timeout,
            self.scheduler.read(conn),
        )
        .await?;
        self.timings.wait = Some(elapsed_ms(started));
        // transfer time is folded into wait
        self.timings.receive = Some(0.0);

        let mut response = Response::ingest(&raw)?;
        response.sequence = self.sequence;
        Ok(response)
    }

    fn finish(&mut self, response: Response, addr: IpAddr) -> Entry {
        let timings = std::mem::take(&mut self.timings);
        Entry {
            started_date_time: Some(self.started),
            time: Some(timings.total()),
            request: Some(std::mem::take(&mut self.request)),
            response: Some(response),
            cache: Some(Cache::with_defaults()),
            timings: Some(timings),
            server_ip_address: Some(addr.to_string()),
            ..Default::default()
        }
    }

    /// Close a connection, logging rather than returning failures.
    async fn release(&self, conn: S::Conn) {
        if let Err(e) = self.scheduler.close(conn).await {
            tracing::debug!("Error closing connection: {}", e);
        }
    }
}

/// Run one scheduler call under a deadline, tagging failures with the phase.
async fn limit<T>(
    phase: Phase,
    deadline: Duration,
    op: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(Error::Socket { phase, source }),
        Err(_) => Err(Error::Timeout { phase }),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use harpy_core::har::KeyValue;

    /// Fails every operation; only `prepare` is exercised here.
    struct Offline;

    #[async_trait]
    impl Scheduler for Offline {
        type Conn = ();

        async fn resolve(&self, _host: &str) -> io::Result<IpAddr> {
            Err(io::ErrorKind::NotFound.into())
        }

        async fn connect(&self, _addr: IpAddr, _port: u16) -> io::Result<()> {
            Err(io::ErrorKind::ConnectionRefused.into())
        }

        async fn write(&self, _conn: &mut (), _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }

        async fn read(&self, _conn: &mut ()) -> io::Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn close(&self, _conn: ()) -> io::Result<()> {
            Ok(())
        }
    }

    fn request(url: &str) -> Request {
        let mut request = Request::with_defaults();
        request.url = Some(url.to_string());
        request
    }

    #[test]
    fn test_prepare_adds_host_and_connection() {
        let config = EngineConfig::default();
        let mut machine = Machine::new(&Offline, &config, request("http://example.com:8080/a"));

        let state = machine.prepare().unwrap();
        assert!(matches!(state, State::Resolving { ref host, port: 8080 } if host == "example.com"));
        assert_eq!(machine.request.header("Host"), Some("example.com:8080"));
        assert_eq!(machine.request.header("connection"), Some("close"));
    }

    #[test]
    fn test_prepare_default_ports() {
        let config = EngineConfig::default();

        let mut machine = Machine::new(&Offline, &config, request("https://example.com/"));
        assert!(matches!(machine.prepare().unwrap(), State::Resolving { port: 443, .. }));
        assert_eq!(machine.request.header("Host"), Some("example.com"));

        let mut machine = Machine::new(&Offline, &config, request("http://example.com/"));
        assert!(matches!(machine.prepare().unwrap(), State::Resolving { port: 80, .. }));
    }

    #[test]
    fn test_prepare_keeps_existing_host_and_downgrades_h2() {
        let config = EngineConfig::default();
        let mut req = request("http://example.com/");
        req.http_version = Some("h2".to_string());
        req.headers = Some(vec![harpy_core::har::Header::pair("host", "virtual.test")]);

        let mut machine = Machine::new(&Offline, &config, req);
        machine.prepare().unwrap();
        assert_eq!(machine.request.http_version(), "HTTP/1.1");
        assert_eq!(machine.request.header("Host"), Some("virtual.test"));
    }

    #[test]
    fn test_ip_override_skips_resolve() {
        let config = EngineConfig::default();
        let mut req = request("http://example.com/");
        req.server_ip_address = Some("10.0.0.7".to_string());

        let mut machine = Machine::new(&Offline, &config, req);
        let state = machine.prepare().unwrap();
        assert!(matches!(state, State::Connecting { addr, port: 80 } if addr.to_string() == "10.0.0.7"));
    }

    #[test]
    fn test_invalid_targets() {
        let config = EngineConfig::default();

        let mut machine = Machine::new(&Offline, &config, request("/relative/only"));
        assert!(matches!(machine.prepare(), Err(Error::InvalidTarget(_))));

        let mut req = request("http://example.com/");
        req.server_ip_address = Some("not-an-ip".to_string());
        let mut machine = Machine::new(&Offline, &config, req);
        assert!(matches!(machine.prepare(), Err(Error::InvalidTarget(_))));

        let mut machine = Machine::new(&Offline, &config, Request::default());
        assert!(matches!(machine.prepare(), Err(Error::Core(_))));
    }

    #[tokio::test]
    async fn test_resolve_failure_is_socket_error() {
        let config = EngineConfig::default();
        let machine = Machine::new(&Offline, &config, request("http://nowhere.invalid/"));

        let err = machine.run().await.unwrap_err();
        assert!(err.is_socket());
        assert_eq!(err.phase(), Some(Phase::Resolve));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Resolve.to_string(), "resolve");
        assert_eq!(Phase::Wait.to_string(), "wait");
    }
}
