use harpy_core::har::{HarEntity, PostData, Request};
use harpy_core::wire::WireMessage;
use harpy_engine::{Driver, EngineConfig, Error, Phase};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve each connection with `reply` after the request head (and any
/// Content-Length body) has arrived, then close. Returns the bound port.
async fn serve(reply: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buffer = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = socket.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buffer.extend_from_slice(&chunk[..n]);
                    if request_received(&buffer) {
                        break;
                    }
                }
                let _ = socket.write_all(reply).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    port
}

fn request_received(buffer: &[u8]) -> bool {
    let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buffer[..end]).to_ascii_lowercase();
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|len| len.trim().parse::<usize>().ok())
        .unwrap_or(0);
    buffer.len() >= end + 4 + length
}

fn local_request(port: u16, path: &str) -> Request {
    let mut request = Request::with_defaults();
    request.url = Some(format!("http://localhost:{}{}", port, path));
    request.server_ip_address = Some("127.0.0.1".to_string());
    request
}

#[tokio::test]
async fn test_replay_against_local_server() {
    let port = serve(b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello").await;
    let driver = Driver::tokio(EngineConfig::default());

    let mut request = local_request(port, "/hello");
    request.sequence = Some(42);

    let outcomes = driver.run_to_completion(vec![request]).await;
    let entry = outcomes[0].result.as_ref().unwrap();
    let response = entry.response.as_ref().unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.sequence, Some(42));
    assert_eq!(
        response.content.as_ref().and_then(|c| c.text.as_deref()),
        Some("hello")
    );
    assert_eq!(
        entry.request.as_ref().and_then(|r| r.header("Host")),
        Some(format!("localhost:{}", port).as_str())
    );
    assert!(entry.validate().is_ok());
}

#[tokio::test]
async fn test_chunked_and_close_delimited_responses() {
    let chunked = serve(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n",
    )
    .await;
    let until_close = serve(b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nstreamed").await;

    let driver = Driver::tokio(EngineConfig::default());
    let mut outcomes = driver
        .run_to_completion(vec![
            local_request(chunked, "/"),
            local_request(until_close, "/"),
        ])
        .await;
    outcomes.sort_by_key(|o| o.index);

    let body = |i: usize| {
        outcomes[i]
            .result
            .as_ref()
            .unwrap()
            .response
            .as_ref()
            .and_then(|r| r.content.as_ref())
            .and_then(|c| c.text.clone())
    };
    assert_eq!(body(0).as_deref(), Some("abcdef"));
    assert_eq!(body(1).as_deref(), Some("streamed"));
}

#[tokio::test]
async fn test_post_body_is_sent() {
    let port = serve(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n").await;
    let driver = Driver::tokio(EngineConfig::default());

    let mut request = local_request(port, "/items");
    request.method = Some("POST".to_string());
    request.post_data = Some(PostData::from_bytes("application/json", b"{\"a\":1}"));
    request.set_header("Content-Length", "7");

    let outcomes = driver.run_to_completion(vec![request]).await;
    let entry = outcomes[0].result.as_ref().unwrap();

    assert_eq!(entry.response.as_ref().map(|r| r.status()), Some(201));
    assert_eq!(entry.request.as_ref().map(|r| r.body_size()), Some(7));
}

#[tokio::test]
async fn test_connection_refused() {
    // bind then drop to get a port nothing listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let driver = Driver::tokio(EngineConfig::default());
    let outcomes = driver
        .run_to_completion(vec![local_request(port, "/")])
        .await;

    match &outcomes[0].result {
        Err(err @ Error::Socket { .. }) => assert_eq!(err.phase(), Some(Phase::Connect)),
        other => panic!("expected a connect failure, got {:?}", other),
    }
}


#[tokio::test]
async fn test_oversized_response_is_rejected() {
    let mut reply = b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\n".to_vec();
    reply.extend(std::iter::repeat_n(b'x', 64 * 1024));
    let port = serve(reply.leak()).await;

    let driver = Driver::tokio(EngineConfig::default().with_max_response_bytes(1024));
    let outcomes = driver
        .run_to_completion(vec![local_request(port, "/big")])
        .await;

    match &outcomes[0].result {
        Err(Error::Socket { phase, source }) => {
            assert_eq!(*phase, Phase::Wait);
            assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
        }
        other => panic!("expected an oversized response failure, got {:?}", other),
    }
}
