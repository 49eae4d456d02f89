use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Check whether the capture daemon accepts connections.
///
/// Connects with a short timeout and hangs up straight away; no bytes are
/// exchanged. Every failure is reported as `false`.
pub async fn probe(host: &str, port: u16, short_timeout: Duration) -> bool {
    let addr = format!("{}:{}", host, port);
    match timeout(short_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "Capture daemon not reachable");
            false
        }
        Err(_) => {
            debug!(addr = %addr, timeout = ?short_timeout, "Capture daemon probe timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_probe_open_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(probe("127.0.0.1", port, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_probe_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let started = Instant::now();
        assert!(!probe("127.0.0.1", port, Duration::from_millis(10)).await);
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_probe_bad_host() {
        assert!(!probe("not a host", 42380, Duration::from_millis(10)).await);
    }
}
