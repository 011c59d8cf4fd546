//! Loopback redirect receiver for installed applications.
//!
//! Listens on `127.0.0.1` with an ephemeral port and waits for the
//! browser to be redirected back with `?code=..&state=..`.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Upper bound on the size of the redirect request head we read.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

/// How long the user gets to finish the consent page.
const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const SUCCESS_PAGE: &str = "<html><body><h3>Authorization complete.</h3>\
<p>You can close this window and return to the terminal.</p></body></html>";

/// One-shot HTTP listener that captures the authorization redirect.
#[derive(Debug)]
pub struct LoopbackReceiver {
    listener: TcpListener,
    port: u16,
    timeout: Duration,
}

impl LoopbackReceiver {
    /// Binds the receiver to an ephemeral port on `127.0.0.1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        debug!("Loopback receiver listening on port {port}");
        Ok(Self {
            listener,
            port,
            timeout: DEFAULT_CONSENT_TIMEOUT,
        })
    }

    /// Gives up waiting for the redirect after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Redirect URI to register in the authorization request.
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Waits for the redirect and returns the authorization code.
    ///
    /// Requests that carry neither `code` nor `error` (a browser asking
    /// for `/favicon.ico`, say) are answered and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateMismatch`] if the state parameter differs,
    /// [`Error::AccessDenied`] or [`Error::Rejected`] if the provider
    /// redirected with `error=..`, [`Error::Timeout`] if no redirect
    /// arrives in time, or an I/O error if the connection fails.
    pub async fn receive(&self, expected_state: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.accept_redirect(expected_state))
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_secs()))?
    }

    async fn accept_redirect(&self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!("Redirect connection from {peer}");

            let target = read_request_target(&mut stream).await?;
            match parse_redirect(&target)? {
                Redirect::Code { code, state } => {
                    respond(&mut stream, "200 OK", SUCCESS_PAGE).await?;
                    if state.as_deref() != Some(expected_state) {
                        return Err(Error::StateMismatch);
                    }
                    return Ok(code);
                }
                Redirect::Denied { error, description } => {
                    respond(&mut stream, "200 OK", "Authorization failed.").await?;
                    return Err(Error::rejected(error, description));
                }
                Redirect::Other => {
                    respond(&mut stream, "404 Not Found", "").await?;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Redirect {
    Code { code: String, state: Option<String> },
    Denied { error: String, description: String },
    Other,
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.len() < MAX_REQUEST_BYTES {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next().unwrap_or_default();
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    Ok(target.to_string())
}

fn parse_redirect(target: &str) -> Result<Redirect> {
    let url = Url::parse("http://127.0.0.1")?.join(target)?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = String::new();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = value.into_owned(),
            _ => {}
        }
    }

    Ok(match (code, error) {
        (_, Some(error)) => Redirect::Denied { error, description },
        (Some(code), None) => Redirect::Code { code, state },
        (None, None) => Redirect::Other,
    })
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn send(port: u16, target: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!("GET {target} HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_parse_redirect() {
        assert_eq!(
            parse_redirect("/?code=4%2F0abc&state=xyz").unwrap(),
            Redirect::Code {
                code: "4/0abc".to_string(),
                state: Some("xyz".to_string()),
            }
        );
        assert_eq!(parse_redirect("/favicon.ico").unwrap(), Redirect::Other);
        assert!(matches!(
            parse_redirect("/?error=access_denied").unwrap(),
            Redirect::Denied { .. }
        ));
    }

    #[tokio::test]
    async fn test_receive_code() {
        let receiver = LoopbackReceiver::bind().await.unwrap();
        assert!(receiver.redirect_uri().starts_with("http://127.0.0.1:"));
        let port = receiver.port;

        let browser = tokio::spawn(async move {
            let favicon = send(port, "/favicon.ico").await;
            assert!(favicon.starts_with("HTTP/1.1 404"));
            send(port, "/?state=s1&code=the-code").await
        });

        let code = receiver.receive("s1").await.unwrap();
        assert_eq!(code, "the-code");
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn test_receive_state_mismatch() {
        let receiver = LoopbackReceiver::bind().await.unwrap();
        let port = receiver.port;

        let browser = tokio::spawn(async move { send(port, "/?state=evil&code=c").await });

        let err = receiver.receive("expected").await.unwrap_err();
        assert!(matches!(err, Error::StateMismatch));
        browser.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_denied() {
        let receiver = LoopbackReceiver::bind().await.unwrap();
        let port = receiver.port;

        let browser = tokio::spawn(async move { send(port, "/?error=access_denied").await });

        let err = receiver.receive("s").await.unwrap_err();
        assert!(matches!(err, Error::AccessDenied));
        browser.await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_gives_up() {
        let receiver = LoopbackReceiver::bind()
            .await
            .unwrap()
            .with_timeout(Duration::from_millis(50));

        // A browser that connects but never sends a request line
        let port = receiver.port;
        let _silent = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let err = receiver.receive("s").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
