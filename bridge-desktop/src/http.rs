//! `HttpClient` over reqwest, with retry of throttled and failed responses

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based transport.
///
/// Retries 429 and 5xx responses and transport errors per [`RetryPolicy`],
/// waiting for the server's `Retry-After` hint when there is one and the
/// exponential backoff otherwise. Whatever the last attempt returns is handed
/// back to the caller.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    /// Client-wide timeout. A request's own timeout takes precedence.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("jobfolder-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder
    }

    async fn send_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let response = self.build(request).send().await.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::OperationFailed("Request timed out".to_string())
    } else if e.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {}", e))
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!(attempt, max_attempts, url = %request.url, "Sending HTTP request");

            let outcome = self.send_once(&request).await;
            let last = attempt >= max_attempts;

            let hint = match &outcome {
                Ok(response) if response.is_retryable() && !last => {
                    warn!(status = response.status, attempt, "Retryable HTTP status");
                    response.retry_after()
                }
                Err(e) if !last => {
                    warn!(error = %e, attempt, "HTTP request failed");
                    None
                }
                _ => return outcome,
            };

            let delay = policy.delay_for(attempt, hint);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Post), reqwest::Method::POST);
    }

    #[test]
    fn test_request_carries_headers_and_timeout() {
        let client = ReqwestHttpClient::new().unwrap();
        let request = HttpRequest::post("https://api.dropboxapi.com/2/files/copy_v2")
            .bearer_token("t")
            .header("Dropbox-API-Select-User", "dbmid:ops")
            .timeout(Duration::from_secs(120));

        let built = client.build(&request).build().unwrap();

        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.headers()["Dropbox-API-Select-User"], "dbmid:ops");
        assert_eq!(built.timeout(), Some(&Duration::from_secs(120)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(200)).unwrap();
        let request = HttpRequest::get("http://127.0.0.1:9/job.api/list");

        let result = client.execute_with_retry(request, RetryPolicy::none()).await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }
}
