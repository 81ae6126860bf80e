//! # Folder Provisioner
//!
//! Materializes a job folder by copying the template, falling back to an
//! empty folder. Each step is attempted once per call.
//!
//! ## Transition table
//!
//! ```text
//! state          | Created       | Conflict      | NotFound      | Error
//! ---------------+---------------+---------------+---------------+--------------
//! CopyTemplate   | Materialized  | Materialized  | CreateEmpty   | CreateEmpty
//! CreateEmpty    | Materialized  | Materialized  | Failed        | Failed
//! ```
//!
//! A conflict means the target already exists and counts as success; the
//! existing folder's contents are not inspected. Writes never auto-rename.

use crate::error::{Result, SyncError};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::storage::{join_path, FolderEntry, TeamContext, TeamFolderStore};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Provisioning step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CopyTemplate,
    CreateEmpty,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStep::CopyTemplate => f.write_str("copy template"),
            ProvisionStep::CreateEmpty => f.write_str("create empty folder"),
        }
    }
}

/// Classified result of one storage write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Created,
    Conflict,
    NotFound,
    Error,
}

impl StepResult {
    pub fn classify<T>(result: &BridgeResult<T>) -> Self {
        match result {
            Ok(_) => StepResult::Created,
            Err(e) if e.is_conflict() => StepResult::Conflict,
            Err(e) if e.is_not_found() => StepResult::NotFound,
            Err(_) => StepResult::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Materialized,
    Next(ProvisionStep),
    Failed,
}

/// The provisioning state machine.
pub fn transition(step: ProvisionStep, result: StepResult) -> Transition {
    use ProvisionStep::*;
    use StepResult::*;

    match (step, result) {
        (_, Created | Conflict) => Transition::Materialized,
        (CopyTemplate, NotFound | Error) => Transition::Next(CreateEmpty),
        (CreateEmpty, NotFound | Error) => Transition::Failed,
    }
}

/// How a folder came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializedVia {
    TemplateCopy,
    EmptyFolder,
    /// A write hit an existing target
    AlreadyExisted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub path: String,
    pub via: MaterializedVia,
}

impl Materialized {
    pub fn from_template(&self) -> bool {
        self.via == MaterializedVia::TemplateCopy
    }
}

pub struct FolderProvisioner {
    store: Arc<dyn TeamFolderStore>,
    template_path: String,
}

impl FolderProvisioner {
    pub fn new(store: Arc<dyn TeamFolderStore>, template_path: impl Into<String>) -> Self {
        Self {
            store,
            template_path: template_path.into(),
        }
    }

    pub fn template_path(&self) -> &str {
        &self.template_path
    }

    /// Materialize `parent/name`.
    ///
    /// # Errors
    ///
    /// [`SyncError::ProvisionFailed`] when the empty-folder fallback fails too.
    #[instrument(skip(self, ctx))]
    pub async fn provision(&self, ctx: &TeamContext, parent: &str, name: &str) -> Result<Materialized> {
        let target = join_path(parent, name);

        let mut step = ProvisionStep::CopyTemplate;
        let mut failures: Vec<String> = Vec::new();

        loop {
            let result = self.attempt(ctx, step, &target).await;
            let classified = StepResult::classify(&result);

            match transition(step, classified) {
                Transition::Materialized => {
                    let via = match (step, classified) {
                        (_, StepResult::Conflict) => MaterializedVia::AlreadyExisted,
                        (ProvisionStep::CopyTemplate, _) => MaterializedVia::TemplateCopy,
                        (ProvisionStep::CreateEmpty, _) => MaterializedVia::EmptyFolder,
                    };
                    info!(path = %target, via = ?via, "Folder materialized");
                    return Ok(Materialized { path: target, via });
                }
                Transition::Next(next) => {
                    if let Err(e) = &result {
                        warn!(path = %target, step = %step, error = %e, "Falling back to {}", next);
                        failures.push(format!("{}: {}", step, e));
                    }
                    step = next;
                }
                Transition::Failed => {
                    if let Err(e) = &result {
                        failures.push(format!("{}: {}", step, e));
                    }
                    return Err(SyncError::ProvisionFailed {
                        path: target,
                        reason: failures.join("; "),
                    });
                }
            }
        }
    }

    async fn attempt(
        &self,
        ctx: &TeamContext,
        step: ProvisionStep,
        target: &str,
    ) -> BridgeResult<FolderEntry> {
        match step {
            ProvisionStep::CopyTemplate => self.store.copy(ctx, &self.template_path, target).await,
            ProvisionStep::CreateEmpty => self.store.create_folder(ctx, target).await,
        }
    }
}
