//! # Folder Locator
//!
//! Startup-only resolution of the operating context:
//!
//! - the team member every storage call runs as, looked up by email
//! - the three destination parent folders, found by name fragment among the
//!   namespace root's top-level folders
//!
//! A missing destination folder does not stop the service; jobs routed to it
//! are skipped until the next restart.

use crate::error::{Result, SyncError};
use crate::routing::{DestinationCategory, DestinationFolder, DestinationMap};
use bridge_traits::storage::{TeamContext, TeamFolderStore, TeamMember};
use core_runtime::config::DestinationFragments;
use core_runtime::logging::redact_if_sensitive;
use tracing::{info, instrument, warn};

/// Path of the namespace root
pub const NAMESPACE_ROOT: &str = "";

/// Find the team member with `email` (case-insensitive).
///
/// Fails with [`SyncError::NoTeamMembers`] or [`SyncError::MemberNotFound`],
/// both of which stop the service from starting.
#[instrument(skip(store, email))]
pub async fn resolve_team_member(store: &dyn TeamFolderStore, email: &str) -> Result<TeamMember> {
    let members = store.list_team_members().await?;

    if members.is_empty() {
        return Err(SyncError::NoTeamMembers);
    }

    let member = members
        .into_iter()
        .find(|member| member.email.eq_ignore_ascii_case(email.trim()))
        .ok_or(SyncError::MemberNotFound)?;

    info!(
        member_id = %member.member_id,
        email = %redact_if_sensitive("email", &member.email),
        status = %member.status,
        "Resolved operating team member"
    );
    Ok(member)
}

/// Map each destination category to the first top-level folder whose name
/// contains its fragment (case-sensitive).
///
/// Returns a partial map when some fragments match nothing. Fails only if
/// the root cannot be listed at all.
#[instrument(skip(store, ctx, fragments))]
pub async fn resolve_destinations(
    store: &dyn TeamFolderStore,
    ctx: &TeamContext,
    fragments: &DestinationFragments,
) -> Result<DestinationMap> {
    let entries = store
        .list_folder(ctx, NAMESPACE_ROOT)
        .await
        .map_err(|e| SyncError::FolderResolution(format!("listing namespace root: {}", e)))?;

    let folders: Vec<_> = entries.into_iter().filter(|e| e.is_folder()).collect();
    let mut map = DestinationMap::new();

    for (category, fragment) in [
        (DestinationCategory::A, &fragments.a),
        (DestinationCategory::B, &fragments.b),
        (DestinationCategory::C, &fragments.c),
    ] {
        let mut matches = folders.iter().filter(|entry| entry.name.contains(fragment.as_str()));

        let Some(found) = matches.next() else {
            warn!(
                category = %category,
                fragment = %fragment,
                "No top-level folder matches destination fragment; jobs for this category will be skipped"
            );
            continue;
        };

        if let Some(other) = matches.next() {
            warn!(
                category = %category,
                chosen = %found.path,
                ignored = %other.path,
                "Destination fragment is ambiguous, using the first match"
            );
        }

        info!(category = %category, path = %found.path, "Resolved destination folder");
        map.insert(category, DestinationFolder::new(found.name.clone(), found.path.clone()));
    }

    if map.len() < DestinationCategory::ALL.len() {
        let missing: Vec<&str> = map.missing().iter().map(|c| c.as_str()).collect();
        warn!(
            error = %SyncError::FolderResolution(format!("missing categories {}", missing.join(", "))),
            "Continuing with a partial destination map"
        );
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::{EntryKind, FolderEntry};
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl TeamFolderStore for Store {
            async fn list_team_members(&self) -> BridgeResult<Vec<TeamMember>>;
            async fn get_metadata(&self, ctx: &TeamContext, path: &str) -> BridgeResult<FolderEntry>;
            async fn list_folder(&self, ctx: &TeamContext, path: &str) -> BridgeResult<Vec<FolderEntry>>;
            async fn copy(&self, ctx: &TeamContext, from: &str, to: &str) -> BridgeResult<FolderEntry>;
            async fn create_folder(&self, ctx: &TeamContext, path: &str) -> BridgeResult<FolderEntry>;
        }
    }

    fn member(id: &str, email: &str) -> TeamMember {
        TeamMember {
            member_id: id.to_string(),
            email: email.to_string(),
            status: "active".to_string(),
        }
    }

    fn fragments() -> DestinationFragments {
        DestinationFragments {
            a: "Residential".to_string(),
            b: "Commercial".to_string(),
            c: "Civil".to_string(),
        }
    }

    fn ctx() -> TeamContext {
        TeamContext::new("ns", "dbmid:ops")
    }

    #[tokio::test]
    async fn test_member_lookup_is_case_insensitive() {
        let mut store = MockStore::new();
        store.expect_list_team_members().returning(|| {
            Ok(vec![
                member("dbmid:a", "someone@example.com"),
                member("dbmid:ops", "Ops@Example.com"),
            ])
        });

        let found = resolve_team_member(&store, "ops@example.com").await.unwrap();
        assert_eq!(found.member_id, "dbmid:ops");
    }

    #[tokio::test]
    async fn test_member_lookup_failures() {
        let mut store = MockStore::new();
        store.expect_list_team_members().returning(|| Ok(vec![]));
        let err = resolve_team_member(&store, "ops@example.com").await.unwrap_err();
        assert!(matches!(err, SyncError::NoTeamMembers));
        assert!(err.is_fatal_at_startup());

        let mut store = MockStore::new();
        store
            .expect_list_team_members()
            .returning(|| Ok(vec![member("dbmid:a", "someone@example.com")]));
        let err = resolve_team_member(&store, "ops@example.com").await.unwrap_err();
        assert!(matches!(err, SyncError::MemberNotFound));
    }

    #[tokio::test]
    async fn test_all_destinations_resolved() {
        let mut store = MockStore::new();
        store
            .expect_list_folder()
            .withf(|_, path| path.is_empty())
            .returning(|_, _| {
                Ok(vec![
                    FolderEntry::folder("02 Residential Jobs", "/02 Residential Jobs"),
                    FolderEntry::folder("03 Commercial Jobs", "/03 Commercial Jobs"),
                    FolderEntry::folder("04 Civil Jobs", "/04 Civil Jobs"),
                    FolderEntry::folder("Template", "/Template"),
                ])
            });

        let map = resolve_destinations(&store, &ctx(), &fragments()).await.unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(
            map.get(DestinationCategory::B).map(|f| f.path.as_str()),
            Some("/03 Commercial Jobs")
        );
    }

    #[tokio::test]
    async fn test_partial_resolution_is_not_fatal() {
        let mut store = MockStore::new();
        store.expect_list_folder().returning(|_, _| {
            Ok(vec![
                FolderEntry::folder("Residential", "/Residential"),
                // Case-sensitive: does not match "Civil"
                FolderEntry::folder("civil", "/civil"),
                // Files never count as destinations
                FolderEntry {
                    name: "Commercial.xlsx".to_string(),
                    path: "/Commercial.xlsx".to_string(),
                    kind: EntryKind::File,
                },
            ])
        });

        let map = resolve_destinations(&store, &ctx(), &fragments()).await.unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(
            map.missing(),
            vec![DestinationCategory::B, DestinationCategory::C]
        );
    }

    #[tokio::test]
    async fn test_root_listing_failure() {
        let mut store = MockStore::new();
        store
            .expect_list_folder()
            .returning(|_, _| Err(BridgeError::OperationFailed("503".to_string())));

        let err = resolve_destinations(&store, &ctx(), &fragments()).await.unwrap_err();
        assert!(matches!(err, SyncError::FolderResolution(_)));
        assert!(!err.is_fatal_at_startup());
    }
}
