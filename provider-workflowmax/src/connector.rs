//! WorkflowMax API connector implementation
//!
//! Implements the `JobSource` trait against the job list endpoint.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use bridge_traits::jobs::{FetchWindow, Job, JobSource};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::WorkflowMaxError;
use crate::types::parse_job_list;

/// Date format of the `from`/`to` query parameters
const QUERY_DATE_FORMAT: &str = "%Y%m%d";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// WorkflowMax API connector
///
/// Lists jobs for one account. The access token is supplied per call so a
/// single connector outlives token refreshes. Query days and offset-less
/// timestamps are read in the account's zone, UTC unless set with
/// [`WorkflowMaxConnector::with_timezone`].
///
/// # Example
///
/// ```ignore
/// use provider_workflowmax::WorkflowMaxConnector;
/// use bridge_traits::jobs::JobSource;
///
/// let connector = WorkflowMaxConnector::new(http_client, api_base_url, account_id);
/// let jobs = connector.list_jobs(&access_token, &window).await?;
/// ```
pub struct WorkflowMaxConnector {
    http_client: Arc<dyn HttpClient>,
    api_base_url: String,
    account_id: String,
    zone: Tz,
}

impl WorkflowMaxConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_base_url: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            zone: Tz::UTC,
        }
    }

    pub fn with_timezone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    /// Job list URL for `window`. The API only accepts whole local days, so
    /// the range is widened and the caller narrows the result.
    fn list_url(&self, window: &FetchWindow) -> String {
        format!(
            "{}/job.api/list?from={}&to={}",
            self.api_base_url,
            window.from.with_timezone(&self.zone).format(QUERY_DATE_FORMAT),
            window.to.with_timezone(&self.zone).format(QUERY_DATE_FORMAT)
        )
    }
}

#[async_trait]
impl JobSource for WorkflowMaxConnector {
    #[instrument(skip(self, access_token), fields(window = %window))]
    async fn list_jobs(&self, access_token: &str, window: &FetchWindow) -> Result<Vec<Job>> {
        let request = HttpRequest::get(self.list_url(window))
            .bearer_token(access_token)
            .header("account_id", self.account_id.as_str())
            .accept("application/json")
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        if response.status == 401 || response.status == 403 {
            warn!(status = response.status, "WorkflowMax rejected the access token");
            return Err(WorkflowMaxError::AuthenticationFailed(format!(
                "status {}",
                response.status
            ))
            .into());
        }

        if !response.is_success() {
            warn!(status = response.status, "Job list request failed");
            return Err(WorkflowMaxError::ApiError {
                status_code: response.status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            }
            .into());
        }

        let body = String::from_utf8_lossy(&response.body);
        debug!(bytes = body.len(), "Received job list response");

        let jobs = parse_job_list(&body, self.zone)?;

        info!(count = jobs.len(), "Listed jobs from WorkflowMax");
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::{HttpMethod, HttpResponse};
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn window() -> FetchWindow {
        FetchWindow::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 30, 0).unwrap(),
        )
    }

    fn connector(mock: MockHttpClient) -> WorkflowMaxConnector {
        WorkflowMaxConnector::new(Arc::new(mock), "https://api.example.test/", "acct-42")
    }

    #[tokio::test]
    async fn test_list_jobs_request_shape() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.url
                        == "https://api.example.test/job.api/list?from=20240501&to=20240502"
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer access-1")
                    && request.headers.get("account_id").map(String::as_str) == Some("acct-42")
                    && request.headers.get("Accept").map(String::as_str)
                        == Some("application/json")
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"Response":{"Job":[{"ID":"9000549","Name":"Survey"}]}}"#,
                ))
            });

        let jobs = connector(mock).list_jobs("access-1", &window()).await.unwrap();

        assert_eq!(jobs, vec![Job::new("9000549", "Survey")]);
    }

    #[tokio::test]
    async fn test_query_days_follow_account_zone() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                // 23:30Z on 1 May is 11:30 on 2 May in Auckland
                request.url == "https://api.example.test/job.api/list?from=20240502&to=20240502"
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"Response":{"Job":{"ID":"9000549","Name":"Survey","DateCreated":"2024-05-02T11:45:00"}}}"#,
                ))
            });

        let jobs = connector(mock)
            .with_timezone(chrono_tz::Pacific::Auckland)
            .list_jobs("t", &window())
            .await
            .unwrap();

        assert_eq!(
            jobs[0].created_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 23, 45, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_list_jobs_accepts_xml() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().returning(|_| {
            Ok(response(
                200,
                "<Response><Status>OK</Status><Jobs><Job><ID>1</ID><Name>A</Name></Job></Jobs></Response>",
            ))
        });

        let jobs = connector(mock).list_jobs("t", &window()).await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_not_an_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, r#"{"Response":{"Status":"OK"}}"#)));

        let jobs = connector(mock).list_jobs("t", &window()).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(response(401, "invalid_token")));

        let err = connector(mock).list_jobs("t", &window()).await.unwrap_err();

        assert!(err.to_string().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_server_error_and_garbage_body() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(response(502, "bad gateway")));
        let err = connector(mock).list_jobs("t", &window()).await.unwrap_err();
        assert!(err.to_string().contains("502"));

        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(response(200, "<html")));
        let err = connector(mock).list_jobs("t", &window()).await.unwrap_err();
        assert!(matches!(err, BridgeError::OperationFailed(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".to_string())));

        let err = connector(mock).list_jobs("t", &window()).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
