//! Dropbox API request and response types
//!
//! Only the fields the connector reads are modelled; everything else in the
//! responses is ignored.

use bridge_traits::storage::{EntryKind, FolderEntry, TeamMember};
use serde::{Deserialize, Serialize};

/// `files/get_metadata` argument
#[derive(Debug, Serialize)]
pub struct GetMetadataArg<'a> {
    pub path: &'a str,
}

/// `files/list_folder` argument
#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
}

/// Argument of every `.../continue` endpoint
#[derive(Debug, Serialize)]
pub struct ContinueArg<'a> {
    pub cursor: &'a str,
}

/// `files/copy_v2` argument
#[derive(Debug, Serialize)]
pub struct RelocationArg<'a> {
    pub from_path: &'a str,
    pub to_path: &'a str,
    pub autorename: bool,
}

/// `files/create_folder_v2` argument
#[derive(Debug, Serialize)]
pub struct CreateFolderArg<'a> {
    pub path: &'a str,
    pub autorename: bool,
}

/// `team/members/list_v2` argument
#[derive(Debug, Serialize)]
pub struct MembersListArg {
    pub limit: u32,
}

/// File, folder or deleted-entry metadata
///
/// `.tag` is absent from `create_folder_v2` results, which are always folders.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(rename = ".tag", default)]
    pub tag: Option<String>,

    pub name: String,

    #[serde(default)]
    pub path_display: Option<String>,

    #[serde(default)]
    pub path_lower: Option<String>,

    #[serde(default)]
    pub id: Option<String>,
}

impl Metadata {
    /// Convert to the bridge model. `fallback_path` is used when the entry
    /// is outside the caller's view and carries no path.
    pub fn into_entry(self, fallback_path: &str) -> FolderEntry {
        let kind = match self.tag.as_deref() {
            Some("file") => EntryKind::File,
            Some("deleted") => EntryKind::Deleted,
            _ => EntryKind::Folder,
        };

        let path = self
            .path_display
            .or(self.path_lower)
            .unwrap_or_else(|| fallback_path.to_string());

        FolderEntry {
            name: self.name,
            path,
            kind,
        }
    }
}

/// `files/list_folder` and `files/list_folder/continue` result
#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

/// `files/copy_v2` and `files/create_folder_v2` result
#[derive(Debug, Deserialize)]
pub struct MetadataResult {
    pub metadata: Metadata,
}

/// `team/members/list_v2` and `.../continue_v2` result
#[derive(Debug, Deserialize)]
pub struct MembersListResult {
    pub members: Vec<TeamMemberInfo>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct TeamMemberInfo {
    pub profile: MemberProfile,
}

#[derive(Debug, Deserialize)]
pub struct MemberProfile {
    pub team_member_id: String,
    pub email: String,
    pub status: Tagged,
}

/// A union value of which only the tag is read
#[derive(Debug, Deserialize)]
pub struct Tagged {
    #[serde(rename = ".tag")]
    pub tag: String,
}

impl From<TeamMemberInfo> for TeamMember {
    fn from(info: TeamMemberInfo) -> Self {
        TeamMember {
            member_id: info.profile.team_member_id,
            email: info.profile.email,
            status: info.profile.status.tag,
        }
    }
}

/// Body of an endpoint-specific (`409`) error
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error_summary: String,
}
