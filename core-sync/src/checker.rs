//! # Existence / Duplicate Checker
//!
//! Two independent screens run before provisioning:
//!
//! - **exact**: is there already an entry at `parent/canonical name`?
//! - **sibling**: for a variant identifier (`9000549_1`), is there a folder
//!   for its base identifier (`9000549 - ...`) in the same parent?

use crate::error::Result;
use bridge_traits::storage::{join_path, TeamContext, TeamFolderStore};
use regex::RegexBuilder;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FolderChecker {
    store: Arc<dyn TeamFolderStore>,
}

impl FolderChecker {
    pub fn new(store: Arc<dyn TeamFolderStore>) -> Self {
        Self { store }
    }

    /// Whether `parent/name` exists.
    ///
    /// Any lookup error other than not-found is logged and reported as
    /// `false`; the provisioner's conflict handling catches a folder that
    /// did exist after all.
    pub async fn exists(&self, ctx: &TeamContext, parent: &str, name: &str) -> bool {
        let path = join_path(parent, name);

        match self.store.get_metadata(ctx, &path).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!(path = %path, error = %e, "Existence check failed, assuming absent");
                false
            }
        }
    }

    /// Names of entries in `parent` that belong to `base_identifier`, i.e.
    /// match `^{base}\s*-` ignoring case.
    pub async fn find_siblings(
        &self,
        ctx: &TeamContext,
        parent: &str,
        base_identifier: &str,
    ) -> Result<Vec<String>> {
        let pattern = RegexBuilder::new(&format!(r"^{}\s*-", regex::escape(base_identifier)))
            .case_insensitive(true)
            .build()?;

        let entries = self.store.list_folder(ctx, parent).await?;

        let siblings: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_folder() && pattern.is_match(&entry.name))
            .map(|entry| entry.name)
            .collect();

        debug!(
            parent = %parent,
            base_identifier = %base_identifier,
            count = siblings.len(),
            "Sibling scan finished"
        );
        Ok(siblings)
    }
}
