//! # Polling Cycle Records
//!
//! Identity and outcome bookkeeping for one pass of the sync loop.

use crate::provisioner::MaterializedVia;
use bridge_traits::jobs::FetchWindow;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to one job in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A folder now exists at `path`
    Provisioned { path: String, via: MaterializedVia },
    /// No destination for this identifier prefix
    Unrouted,
    /// A folder with the canonical name already exists
    AlreadyExists { path: String },
    /// A folder for the base identifier already exists
    SiblingExists { sibling: String },
    /// Could not be provisioned this cycle
    Failed { error: String },
}

impl ItemOutcome {
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            ItemOutcome::Unrouted | ItemOutcome::AlreadyExists { .. } | ItemOutcome::SiblingExists { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Provisioned { .. } => "provisioned",
            ItemOutcome::Unrouted => "unrouted",
            ItemOutcome::AlreadyExists { .. } => "already_exists",
            ItemOutcome::SiblingExists { .. } => "sibling_exists",
            ItemOutcome::Failed { .. } => "failed",
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    pub window: FetchWindow,
    /// Jobs as returned by the tracking system, repeats included
    pub received: usize,
    /// Jobs dropped because neither timestamp falls inside the window
    pub outside_window: usize,
    /// Repeated identifiers dropped within the batch
    pub batch_duplicates: usize,
    /// Outcome per distinct identifier, in processing order
    pub items: Vec<(String, ItemOutcome)>,
    pub duration: Duration,
}

impl CycleReport {
    pub fn new(cycle_id: CycleId, window: FetchWindow) -> Self {
        Self {
            cycle_id,
            window,
            received: 0,
            outside_window: 0,
            batch_duplicates: 0,
            items: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, identifier: impl Into<String>, outcome: ItemOutcome) {
        self.items.push((identifier.into(), outcome));
    }

    pub fn outcome(&self, identifier: &str) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, outcome)| outcome)
    }

    pub fn provisioned(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Provisioned { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(ItemOutcome::is_skip)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| predicate(o)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_report_counts() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut report = CycleReport::new(CycleId::new(), FetchWindow::new(from, from));

        report.record(
            "2001",
            ItemOutcome::Provisioned {
                path: "/A/2001 - X".to_string(),
                via: MaterializedVia::TemplateCopy,
            },
        );
        report.record("1001", ItemOutcome::Unrouted);
        report.record(
            "2002_1",
            ItemOutcome::SiblingExists {
                sibling: "2002 - X".to_string(),
            },
        );
        report.record(
            "2003",
            ItemOutcome::Failed {
                error: "boom".to_string(),
            },
        );

        assert_eq!(report.provisioned(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcome("1001"), Some(&ItemOutcome::Unrouted));
        assert_eq!(report.outcome("missing"), None);
    }

    #[test]
    fn test_cycle_ids_are_unique() {
        assert_ne!(CycleId::new(), CycleId::new());
    }
}
