use async_trait::async_trait;
use harpy_core::har::{HarEntity, Request};
use harpy_engine::{Driver, EngineConfig, Error, Phase, Scheduler};
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const GARBAGE: [u8; 4] = [10, 0, 0, 4];
const BAD_CHUNKS: [u8; 4] = [10, 0, 0, 5];
const BROKEN_PIPE: [u8; 4] = [10, 0, 0, 6];

/// In-memory scheduler: known hosts resolve, every address answers with a
/// canned response after an optional delay. A few fixed addresses misbehave
/// once connected.
struct MockScheduler {
    hosts: HashMap<&'static str, IpAddr>,
    delays: HashMap<IpAddr, Duration>,
}

struct MockConn {
    addr: IpAddr,
    sent: Vec<u8>,
}

impl MockScheduler {
    fn new() -> Self {
        let hosts = HashMap::from([
            ("one.test", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            ("three.test", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3))),
            ("garbage.test", IpAddr::from(GARBAGE)),
            ("chunks.test", IpAddr::from(BAD_CHUNKS)),
            ("broken.test", IpAddr::from(BROKEN_PIPE)),
        ]);
        Self {
            hosts,
            delays: HashMap::new(),
        }
    }

    fn with_delay(mut self, addr: [u8; 4], delay: Duration) -> Self {
        self.delays.insert(IpAddr::from(addr), delay);
        self
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    type Conn = MockConn;

    async fn resolve(&self, host: &str) -> io::Result<IpAddr> {
        self.hosts
            .get(host)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {}", host)))
    }

    async fn connect(&self, addr: IpAddr, _port: u16) -> io::Result<MockConn> {
        Ok(MockConn {
            addr,
            sent: Vec::new(),
        })
    }

    async fn write(&self, conn: &mut MockConn, bytes: &[u8]) -> io::Result<()> {
        if conn.addr == IpAddr::from(BROKEN_PIPE) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        conn.sent.extend_from_slice(bytes);
        Ok(())
    }

    async fn read(&self, conn: &mut MockConn) -> io::Result<Vec<u8>> {
        if let Some(delay) = self.delays.get(&conn.addr) {
            tokio::time::sleep(*delay).await;
        }
        if conn.addr == IpAddr::from(GARBAGE) {
            return Ok(b"garbage\r\n\r\n".to_vec());
        }
        if conn.addr == IpAddr::from(BAD_CHUNKS) {
            return Ok(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
ffffffffffffffff\r\nabc\r\n0\r\n\r\n"
                .to_vec());
        }

        // echo the request line back as the body
        let sent = String::from_utf8_lossy(&conn.sent);
        let body = sent.lines().next().unwrap_or_default().to_string();
        Ok(format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes())
    }

    async fn close(&self, _conn: MockConn) -> io::Result<()> {
        Ok(())
    }
}

fn request(url: &str, sequence: i64) -> Request {
    let mut request = Request::with_defaults();
    request.url = Some(url.to_string());
    request.sequence = Some(sequence);
    request
}

#[tokio::test]
async fn test_unresolvable_request_does_not_stop_the_batch() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let requests = vec![
        request("http://one.test/a", 1),
        request("http://two.test/b", 2),
        request("http://three.test/c", 3),
    ];

    let mut outcomes = driver.run_to_completion(requests).await;
    outcomes.sort_by_key(|o| o.index);

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);

    let failed = &outcomes[1];
    assert_eq!(failed.sequence, Some(2));
    match &failed.result {
        Err(Error::Socket { phase, source }) => {
            assert_eq!(*phase, Phase::Resolve);
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("expected a resolve failure, got {:?}", other),
    }

    for (outcome, path) in [(&outcomes[0], "/a"), (&outcomes[2], "/c")] {
        let entry = outcome.result.as_ref().unwrap();
        let response = entry.response.as_ref().unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.sequence, outcome.sequence);
        assert_eq!(
            response.content.as_ref().and_then(|c| c.text.as_deref()),
            Some(format!("GET {} HTTP/1.1", path).as_str())
        );
        assert!(entry.validate().is_ok());
    }
}

fn assert_echoed(outcome: &harpy_engine::Outcome, path: &str) {
    let entry = outcome.result.as_ref().unwrap();
    let response = entry.response.as_ref().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.sequence, outcome.sequence);
    assert_eq!(
        response.content.as_ref().and_then(|c| c.text.as_deref()),
        Some(format!("GET {} HTTP/1.1", path).as_str())
    );
}

#[tokio::test]
async fn test_unparseable_response_does_not_stop_the_batch() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let mut outcomes = driver
        .run_to_completion(vec![
            request("http://one.test/a", 1),
            request("http://garbage.test/b", 2),
            request("http://three.test/c", 3),
        ])
        .await;
    outcomes.sort_by_key(|o| o.index);

    assert_eq!(outcomes[1].sequence, Some(2));
    match &outcomes[1].result {
        Err(Error::Core(harpy_core::Error::Wire(_))) => {}
        other => panic!("expected a wire error, got {:?}", other),
    }
    assert_echoed(&outcomes[0], "/a");
    assert_echoed(&outcomes[2], "/c");
}

#[tokio::test]
async fn test_oversized_chunk_does_not_stop_the_batch() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let mut outcomes = driver
        .run_to_completion(vec![
            request("http://one.test/a", 1),
            request("http://chunks.test/b", 2),
            request("http://three.test/c", 3),
        ])
        .await;
    outcomes.sort_by_key(|o| o.index);

    assert!(matches!(
        outcomes[1].result,
        Err(Error::Core(harpy_core::Error::Wire(_)))
    ));
    assert_echoed(&outcomes[0], "/a");
    assert_echoed(&outcomes[2], "/c");
}

#[tokio::test]
async fn test_send_failure_does_not_stop_the_batch() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let mut outcomes = driver
        .run_to_completion(vec![
            request("http://one.test/a", 1),
            request("http://broken.test/b", 2),
            request("http://three.test/c", 3),
        ])
        .await;
    outcomes.sort_by_key(|o| o.index);

    assert_eq!(outcomes[1].sequence, Some(2));
    match &outcomes[1].result {
        Err(Error::Socket { phase, source }) => {
            assert_eq!(*phase, Phase::Send);
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        other => panic!("expected a send failure, got {:?}", other),
    }
    assert_echoed(&outcomes[0], "/a");
    assert_echoed(&outcomes[2], "/c");
}

#[tokio::test]
async fn test_completions_may_interleave() {
    let scheduler = MockScheduler::new().with_delay([10, 0, 0, 1], Duration::from_millis(100));
    let driver = Driver::new(scheduler, EngineConfig::default());

    let outcomes = driver
        .run_to_completion(vec![
            request("http://one.test/slow", 1),
            request("http://three.test/fast", 2),
        ])
        .await;

    let order: Vec<_> = outcomes.iter().map(|o| o.sequence).collect();
    assert_eq!(order, vec![Some(2), Some(1)]);
}

#[tokio::test]
async fn test_single_in_flight_preserves_order() {
    let scheduler = MockScheduler::new().with_delay([10, 0, 0, 1], Duration::from_millis(50));
    let driver = Driver::new(scheduler, EngineConfig::default().with_max_in_flight(1));

    let outcomes = driver
        .run_to_completion(vec![
            request("http://one.test/slow", 1),
            request("http://three.test/fast", 2),
        ])
        .await;

    let order: Vec<_> = outcomes.iter().map(|o| o.index).collect();
    assert_eq!(order, vec![0, 1]);
}

#[tokio::test]
async fn test_wait_timeout() {
    let scheduler = MockScheduler::new().with_delay([10, 0, 0, 1], Duration::from_secs(5));
    let mut config = EngineConfig::default();
    config.wait_timeout = Duration::from_millis(20);
    let driver = Driver::new(scheduler, config);

    let outcomes = driver
        .run_to_completion(vec![request("http://one.test/", 1)])
        .await;

    assert!(matches!(
        outcomes[0].result,
        Err(Error::Timeout {
            phase: Phase::Wait
        })
    ));
}

#[tokio::test]
async fn test_ip_override_skips_dns() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let mut req = request("http://not-in-dns.test/", 9);
    req.server_ip_address = Some("10.0.0.42".to_string());

    let outcomes = driver.run_to_completion(vec![req]).await;
    let entry = outcomes[0].result.as_ref().unwrap();
    let timings = entry.timings.as_ref().unwrap();

    assert_eq!(timings.dns, Some(-1.0));
    assert_eq!(timings.receive, Some(0.0));
    assert!(timings.connect.unwrap() >= 0.0);
    assert_eq!(entry.server_ip_address.as_deref(), Some("10.0.0.42"));
    assert_eq!(entry.time(), timings.total());
}

#[tokio::test]
async fn test_entry_records_request_as_sent() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let outcomes = driver
        .run_to_completion(vec![request("http://one.test/path?x=1", 1)])
        .await;

    let entry = outcomes[0].result.as_ref().unwrap();
    let sent = entry.request.as_ref().unwrap();
    assert_eq!(sent.header("Host"), Some("one.test"));
    assert_eq!(sent.header("Connection"), Some("close"));
    assert!(sent.headers_size() > 0);
    assert_eq!(sent.body_size(), 0);

    let json = serde_json::to_value(entry).unwrap();
    assert_eq!(json["response"]["_sequence"], 1);
    assert_eq!(json["serverIPAddress"], "10.0.0.1");
}

#[tokio::test]
async fn test_invalid_request_is_reported() {
    let driver = Driver::new(MockScheduler::new(), EngineConfig::default());
    let outcomes = driver.run_to_completion(vec![Request::default()]).await;

    assert!(matches!(outcomes[0].result, Err(Error::Core(_))));
    assert!(!outcomes[0].result.as_ref().unwrap_err().is_socket());
}
