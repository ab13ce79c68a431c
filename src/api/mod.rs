//! HTTP access to the insight endpoints.
//!
//! `client` owns the reqwest plumbing; `source` adapts it to the
//! `DataSource` seam the polling controller fetches through.

pub mod client;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support {
    //! One-shot HTTP responder for exercising the real client.

    use std::io;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve a single request with `status` and `body`. Resolves the returned
    /// receiver with the raw request (head and body) once answered, or with
    /// the I/O error that stopped the responder.
    pub(crate) async fn serve_once(
        status: u16,
        body: &'static str,
    ) -> (String, oneshot::Receiver<io::Result<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/api", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let _ = tx.send(answer(listener, status, body).await);
        });

        (base_url, rx)
    }

    async fn answer(listener: TcpListener, status: u16, body: &str) -> io::Result<String> {
        let (mut socket, _) = listener.accept().await?;
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if request_complete(&buf) {
                break;
            }
        }

        let reason = if status < 400 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await?;
        socket.shutdown().await.ok();
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(head_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..head_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        buf.len() >= head_end + 4 + content_length
    }
}
