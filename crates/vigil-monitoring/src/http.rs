//! HTTP endpoint probe.

use crate::{HealthCheckError, HealthCheckResult};
use std::time::Duration;
use tracing::debug;

/// GETs one URL and accepts any status below 400. Redirects are not followed.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> HealthCheckResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| HealthCheckError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the status code on success.
    pub async fn check(&self) -> HealthCheckResult<u16> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            if e.is_timeout() {
                HealthCheckError::Timeout {
                    url: self.url.clone(),
                }
            } else {
                HealthCheckError::ConnectionFailed {
                    url: self.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        debug!("Health endpoint {} answered {}", self.url, status);

        if status < 400 {
            Ok(status)
        } else {
            Err(HealthCheckError::BadStatus {
                url: self.url.clone(),
                status,
            })
        }
    }
}

/// Minimal one-shot HTTP server for probe tests.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `status` to every connection, after `delay`. Returns the base URL.
    pub async fn serve(status: u16, delay: std::time::Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {} X\r\nlocation: /elsewhere\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                        status
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{}/", addr)
    }

    /// A URL on which nothing listens.
    pub fn closed_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        format!("http://127.0.0.1:{}/", port)
    }
}

#[cfg(test)]
mod tests {
    use super::test_server::{closed_url, serve};
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_success_and_redirect_are_healthy() {
        let ok = serve(200, Duration::ZERO).await;
        assert_eq!(HttpProbe::new(ok, TIMEOUT).unwrap().check().await.unwrap(), 200);

        let redirect = serve(302, Duration::ZERO).await;
        assert_eq!(
            HttpProbe::new(redirect, TIMEOUT).unwrap().check().await.unwrap(),
            302
        );
    }

    #[tokio::test]
    async fn test_error_status_is_unhealthy() {
        let url = serve(500, Duration::ZERO).await;
        let err = HttpProbe::new(url, TIMEOUT).unwrap().check().await.unwrap_err();
        assert!(matches!(err, HealthCheckError::BadStatus { status: 500, .. }));

        let url = serve(404, Duration::ZERO).await;
        let err = HttpProbe::new(url, TIMEOUT).unwrap().check().await.unwrap_err();
        assert!(matches!(err, HealthCheckError::BadStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let url = serve(200, Duration::from_secs(5)).await;
        let err = HttpProbe::new(url, Duration::from_millis(200))
            .unwrap()
            .check()
            .await
            .unwrap_err();
        assert!(matches!(err, HealthCheckError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let err = HttpProbe::new(closed_url(), TIMEOUT)
            .unwrap()
            .check()
            .await
            .unwrap_err();
        assert!(matches!(err, HealthCheckError::ConnectionFailed { .. }));
    }
}
