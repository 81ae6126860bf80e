//! Dropbox API connector implementation
//!
//! Implements the `TeamFolderStore` trait for Dropbox API v2 team spaces.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{FolderEntry, TeamContext, TeamFolderStore, TeamMember};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::DropboxError;
use crate::types::{
    ApiErrorBody, ContinueArg, CreateFolderArg, GetMetadataArg, ListFolderArg, ListFolderResult,
    Metadata, MembersListArg, MembersListResult, MetadataResult, RelocationArg,
};

/// Dropbox RPC base URL
pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";

/// Page size for team member listing (API maximum)
const MEMBERS_PAGE_SIZE: u32 = 1000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Copies of large templates are done server-side but can take a while
const COPY_TIMEOUT: Duration = Duration::from_secs(120);

/// Dropbox API connector
///
/// Holds a team-scoped access token. Team endpoints are called as the team;
/// file endpoints run as the member named in the [`TeamContext`] and resolve
/// paths against its namespace.
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use bridge_traits::storage::{TeamContext, TeamFolderStore};
///
/// let connector = DropboxConnector::new(http_client, access_token, DROPBOX_API_BASE);
/// let ctx = TeamContext::new(namespace_id, member_id);
/// let roots = connector.list_folder(&ctx, "").await?;
/// ```
pub struct DropboxConnector {
    http_client: Arc<dyn HttpClient>,
    access_token: String,
    api_base_url: String,
}

impl DropboxConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_request(
        &self,
        endpoint: &str,
        ctx: Option<&TeamContext>,
        timeout: Duration,
    ) -> std::result::Result<HttpRequest, DropboxError> {
        let mut request = HttpRequest::post(format!("{}/{}", self.api_base_url, endpoint))
            .bearer_token(self.access_token.as_str())
            .timeout(timeout);

        if let Some(ctx) = ctx {
            if !ctx.is_resolved() {
                return Err(BridgeError::NotAvailable(
                    "team context is not resolved".to_string(),
                )
                .into());
            }

            let path_root = json!({
                ".tag": "namespace_id",
                "namespace_id": ctx.namespace_id,
            });
            request = request
                .header("Dropbox-API-Path-Root", path_root.to_string())
                .header("Dropbox-API-Select-User", ctx.member_id.as_str());
        }

        Ok(request)
    }

    /// POST a JSON argument to an RPC endpoint and decode the result.
    async fn rpc<A, R>(
        &self,
        endpoint: &str,
        arg: &A,
        ctx: Option<&TeamContext>,
        timeout: Duration,
    ) -> std::result::Result<R, DropboxError>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = self.build_request(endpoint, ctx, timeout)?.json(arg)?;

        let response = self
            .http_client
            .execute_with_retry(request, RetryPolicy::default())
            .await?;

        Self::check_status(endpoint, &response)?;

        serde_json::from_slice(&response.body).map_err(|e| {
            DropboxError::ParseError(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }

    fn check_status(endpoint: &str, response: &HttpResponse) -> std::result::Result<(), DropboxError> {
        if response.is_success() {
            return Ok(());
        }

        match response.status {
            401 => {
                warn!(endpoint = endpoint, "Dropbox rejected the access token");
                Err(DropboxError::AuthenticationFailed(
                    String::from_utf8_lossy(&response.body).to_string(),
                ))
            }
            409 => {
                let summary = serde_json::from_slice::<ApiErrorBody>(&response.body)
                    .map(|body| body.error_summary)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).to_string());
                debug!(endpoint = endpoint, summary = %summary, "Endpoint error");
                Err(DropboxError::from_summary(409, &summary))
            }
            status => {
                warn!(endpoint = endpoint, status = status, "Dropbox request failed");
                Err(DropboxError::ApiError {
                    status_code: status,
                    summary: String::from_utf8_lossy(&response.body).to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl TeamFolderStore for DropboxConnector {
    #[instrument(skip(self))]
    async fn list_team_members(&self) -> Result<Vec<TeamMember>> {
        let mut page: MembersListResult = self
            .rpc(
                "team/members/list_v2",
                &MembersListArg {
                    limit: MEMBERS_PAGE_SIZE,
                },
                None,
                REQUEST_TIMEOUT,
            )
            .await?;

        let mut members: Vec<TeamMember> = Vec::new();
        loop {
            let has_more = page.has_more;
            let cursor = std::mem::take(&mut page.cursor);
            members.extend(page.members.drain(..).map(TeamMember::from));

            if !has_more {
                break;
            }

            page = self
                .rpc(
                    "team/members/list/continue_v2",
                    &ContinueArg { cursor: &cursor },
                    None,
                    REQUEST_TIMEOUT,
                )
                .await?;
        }

        info!(count = members.len(), "Listed team members");
        Ok(members)
    }

    #[instrument(skip(self, ctx), fields(path = %path))]
    async fn get_metadata(&self, ctx: &TeamContext, path: &str) -> Result<FolderEntry> {
        let metadata: Metadata = self
            .rpc(
                "files/get_metadata",
                &GetMetadataArg { path },
                Some(ctx),
                REQUEST_TIMEOUT,
            )
            .await?;

        Ok(metadata.into_entry(path))
    }

    #[instrument(skip(self, ctx), fields(path = %path))]
    async fn list_folder(&self, ctx: &TeamContext, path: &str) -> Result<Vec<FolderEntry>> {
        let mut page: ListFolderResult = self
            .rpc(
                "files/list_folder",
                &ListFolderArg {
                    path,
                    recursive: false,
                    include_deleted: false,
                },
                Some(ctx),
                REQUEST_TIMEOUT,
            )
            .await?;

        let mut entries = Vec::new();
        loop {
            let has_more = page.has_more;
            let cursor = std::mem::take(&mut page.cursor);
            entries.extend(page.entries.drain(..).map(|m| {
                let fallback = bridge_traits::storage::join_path(path, &m.name);
                m.into_entry(&fallback)
            }));

            if !has_more {
                break;
            }

            debug!(fetched = entries.len(), "Following list_folder cursor");
            page = self
                .rpc(
                    "files/list_folder/continue",
                    &ContinueArg { cursor: &cursor },
                    Some(ctx),
                    REQUEST_TIMEOUT,
                )
                .await?;
        }

        debug!(count = entries.len(), "Listed folder");
        Ok(entries)
    }

    #[instrument(skip(self, ctx), fields(from = %from, to = %to))]
    async fn copy(&self, ctx: &TeamContext, from: &str, to: &str) -> Result<FolderEntry> {
        let result: MetadataResult = self
            .rpc(
                "files/copy_v2",
                &RelocationArg {
                    from_path: from,
                    to_path: to,
                    autorename: false,
                },
                Some(ctx),
                COPY_TIMEOUT,
            )
            .await?;

        info!("Copied folder");
        Ok(result.metadata.into_entry(to))
    }

    #[instrument(skip(self, ctx), fields(path = %path))]
    async fn create_folder(&self, ctx: &TeamContext, path: &str) -> Result<FolderEntry> {
        let result: MetadataResult = self
            .rpc(
                "files/create_folder_v2",
                &CreateFolderArg {
                    path,
                    autorename: false,
                },
                Some(ctx),
                REQUEST_TIMEOUT,
            )
            .await?;

        info!("Created folder");
        Ok(result.metadata.into_entry(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::http::HttpMethod;
    use bridge_traits::storage::EntryKind;
    use bytes::Bytes;
    use mockall::mock;
    use mockall::Sequence;
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

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        request
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(serde_json::Value::Null)
    }

    fn ctx() -> TeamContext {
        TeamContext::new("ns-1", "dbmid:ops")
    }

    fn connector(mock: MockHttpClient) -> DropboxConnector {
        DropboxConnector::new(Arc::new(mock), "team-token", "https://dbx.example.test/2/")
    }

    #[tokio::test]
    async fn test_file_calls_carry_team_headers() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|request| {
                let path_root: serde_json::Value = request
                    .headers
                    .get("Dropbox-API-Path-Root")
                    .and_then(|v| serde_json::from_str(v).ok())
                    .unwrap_or_default();

                request.method == HttpMethod::Post
                    && request.url == "https://dbx.example.test/2/files/get_metadata"
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer team-token")
                    && request.headers.get("Dropbox-API-Select-User").map(String::as_str)
                        == Some("dbmid:ops")
                    && path_root["namespace_id"] == "ns-1"
                    && path_root[".tag"] == "namespace_id"
                    && body_json(request)["path"] == "/Jobs/9000549 - SURVEY"
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{".tag":"folder","name":"9000549 - SURVEY","path_display":"/Jobs/9000549 - SURVEY"}"#,
                ))
            });

        let entry = connector(mock)
            .get_metadata(&ctx(), "/Jobs/9000549 - SURVEY")
            .await
            .unwrap();

        assert!(entry.is_folder());
        assert_eq!(entry.name, "9000549 - SURVEY");
    }

    #[tokio::test]
    async fn test_not_found_is_classified() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().returning(|_| {
            Ok(response(
                409,
                r#"{"error_summary":"path/not_found/..","error":{".tag":"path","path":{".tag":"not_found"}}}"#,
            ))
        });

        let err = connector(mock).get_metadata(&ctx(), "/Missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_folder_follows_cursor() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock.expect_execute()
            .withf(|r| r.url.ends_with("/files/list_folder") && body_json(r)["path"] == "")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"entries":[{".tag":"folder","name":"2 - Residential","path_display":"/2 - Residential"}],
                        "cursor":"c1","has_more":true}"#,
                ))
            });
        mock.expect_execute()
            .withf(|r| r.url.ends_with("/files/list_folder/continue") && body_json(r)["cursor"] == "c1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"entries":[{".tag":"file","name":"readme.txt","path_lower":"/readme.txt"},
                        {".tag":"folder","name":"7 - Commercial","path_display":"/7 - Commercial"}],
                        "cursor":"c2","has_more":false}"#,
                ))
            });

        let entries = connector(mock).list_folder(&ctx(), "").await.unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, "/2 - Residential");
        assert_eq!(entries[1].kind, EntryKind::File);
        assert_eq!(entries[2].name, "7 - Commercial");
    }

    #[tokio::test]
    async fn test_copy_never_autorenames_and_reports_conflict() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|r| {
                let body = body_json(r);
                r.url.ends_with("/files/copy_v2")
                    && body["from_path"] == "/Template"
                    && body["to_path"] == "/Jobs/X"
                    && body["autorename"] == false
            })
            .returning(|_| {
                Ok(response(
                    409,
                    r#"{"error_summary":"to/conflict/folder/...","error":{}}"#,
                ))
            });

        let err = connector(mock).copy(&ctx(), "/Template", "/Jobs/X").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_create_folder() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .withf(|r| {
                r.url.ends_with("/files/create_folder_v2") && body_json(r)["autorename"] == false
            })
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"metadata":{"name":"X","path_display":"/Jobs/X","id":"id:1"}}"#,
                ))
            });

        let entry = connector(mock).create_folder(&ctx(), "/Jobs/X").await.unwrap();
        assert_eq!(entry, FolderEntry::folder("X", "/Jobs/X"));
    }

    #[tokio::test]
    async fn test_team_members_are_paginated_without_member_headers() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock.expect_execute()
            .withf(|r| {
                r.url.ends_with("/team/members/list_v2")
                    && !r.headers.contains_key("Dropbox-API-Select-User")
                    && !r.headers.contains_key("Dropbox-API-Path-Root")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"members":[{"profile":{"team_member_id":"dbmid:a","email":"a@example.com","status":{".tag":"active"}}}],
                        "cursor":"m1","has_more":true}"#,
                ))
            });
        mock.expect_execute()
            .withf(|r| r.url.ends_with("/team/members/list/continue_v2"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"members":[{"profile":{"team_member_id":"dbmid:b","email":"b@example.com","status":{".tag":"invited"}}}],
                        "cursor":"m2","has_more":false}"#,
                ))
            });

        let members = connector(mock).list_team_members().await.unwrap();

        assert_eq!(members.len(), 2);
        assert_eq!(members[1].member_id, "dbmid:b");
        assert_eq!(members[1].status, "invited");
    }

    #[tokio::test]
    async fn test_unresolved_context_is_rejected_before_any_call() {
        let mock = MockHttpClient::new();

        let err = connector(mock)
            .list_folder(&TeamContext::new("ns-1", ""), "")
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_unauthorized_and_server_errors() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(response(401, "invalid_access_token")));
        let err = connector(mock).list_team_members().await.unwrap_err();
        assert!(err.to_string().contains("Authentication failed"));

        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .returning(|_| Ok(response(500, "oops")));
        let err = connector(mock).create_folder(&ctx(), "/X").await.unwrap_err();
        assert!(!err.is_conflict());
        assert!(err.to_string().contains("500"));
    }
}
