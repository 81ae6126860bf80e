//! Job Tracking Abstractions
//!
//! The tracking system is the source of work items. Connectors normalise
//! whatever wire format the service answers with into [`Job`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// A work item fetched from the tracking system.
///
/// Immutable once fetched and only kept for the current polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Raw identifier, possibly carrying a `_N` variant suffix (e.g. `9000549_1`)
    pub identifier: String,
    /// Free-text title; may contain HTML entities and parenthetical notes
    pub title: String,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            created_at: None,
            modified_at: None,
        }
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = Some(at);
        self
    }

    /// Whether the job was created or modified inside `window`.
    ///
    /// A job with neither timestamp is kept; the folder screens make a
    /// repeat harmless.
    pub fn touched_within(&self, window: &FetchWindow) -> bool {
        if self.created_at.is_none() && self.modified_at.is_none() {
            return true;
        }

        [self.created_at, self.modified_at]
            .into_iter()
            .flatten()
            .any(|at| window.contains(at))
    }
}

/// Half-open time range `[from, to)` a cycle fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at < self.to
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

/// Tracking-system trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::jobs::{FetchWindow, JobSource};
///
/// async fn recent(source: &dyn JobSource, token: &str, window: FetchWindow) -> Result<usize> {
///     Ok(source.list_jobs(token, &window).await?.len())
/// }
/// ```
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Fetch jobs created or modified inside `window`.
    ///
    /// Transport failures and bodies that are neither recognised format are
    /// errors; an empty but well-formed response is `Ok(vec![])`.
    ///
    /// The service may answer at a coarser granularity than `window` (whole
    /// days); callers must tolerate seeing a job again in a later cycle.
    async fn list_jobs(&self, access_token: &str, window: &FetchWindow) -> Result<Vec<Job>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn window() -> FetchWindow {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        FetchWindow::new(from, from + Duration::minutes(1))
    }

    #[test]
    fn test_window_is_half_open() {
        let w = window();
        assert!(w.contains(w.from));
        assert!(!w.contains(w.to));
        assert!(!w.contains(w.from - Duration::seconds(1)));
    }

    #[test]
    fn test_touched_within() {
        let w = window();
        let stale = w.from - Duration::hours(20);

        assert!(Job::new("1", "untimed").touched_within(&w));
        assert!(Job::new("2", "new").with_created_at(w.from).touched_within(&w));
        assert!(!Job::new("3", "old").with_created_at(stale).touched_within(&w));
        assert!(Job::new("4", "edited")
            .with_created_at(stale)
            .with_modified_at(w.from + Duration::seconds(30))
            .touched_within(&w));
        assert!(!Job::new("5", "future").with_modified_at(w.to).touched_within(&w));
    }
}
