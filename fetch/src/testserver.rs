//! Minimal canned-response HTTP server for provider tests.
//!
//! Binds an ephemeral loopback port, answers every request from a caller
//! supplied function and counts accepted connections. Responses always close
//! the connection, so the hit count equals the upstream call count.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub(crate) struct TestServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    /// Base URL clients should be pointed at.
    pub(crate) fn url(&self) -> String {
        format!("http://{}/rates", self.addr)
    }

    /// Number of requests served so far.
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a server answering with `respond(request_target)`.
pub(crate) async fn serve<F>(respond: F) -> TestServer
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);

            let respond = respond.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) => break,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n")
                                || read == buf.len()
                            {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]);
                let target = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = respond(&target);
                let reason = match status {
                    200 => "OK",
                    302 => "Found",
                    400 => "Bad Request",
                    404 => "Not Found",
                    500 => "Internal Server Error",
                    _ => "Response",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    TestServer { addr, hits }
}

/// Pull one query parameter out of a request target, undoing the comma
/// percent-encoding reqwest applies.
pub(crate) fn decode_query_param(target: &str, name: &str) -> Option<String> {
    let query = target.split_once('?')?.1;
    query.split('&').find_map(|kv| {
        let (key, value) = kv.split_once('=')?;
        (key == name).then(|| value.replace("%2C", ",").replace("%2c", ","))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query_params() {
        let target = "/rates?q=EUR_USD%2CUSD_JPY&compact=ultra&apiKey=k";
        assert_eq!(
            decode_query_param(target, "q").as_deref(),
            Some("EUR_USD,USD_JPY")
        );
        assert_eq!(decode_query_param(target, "compact").as_deref(), Some("ultra"));
        assert_eq!(decode_query_param(target, "missing"), None);
    }

    #[tokio::test]
    async fn serves_and_counts() {
        let server = serve(|_| (200, "{}".to_string())).await;
        let client = reqwest::Client::new();

        let response = client.get(server.url()).send().await.unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(server.hits(), 1);
    }
}
