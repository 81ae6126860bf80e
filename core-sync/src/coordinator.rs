//! # Sync Coordinator
//!
//! Runs the polling loop that turns new tracking-system jobs into folders.
//!
//! ## Cycle
//!
//! 1. Check preconditions: at least one destination resolved and the team
//!    context resolved. Otherwise skip without touching the network.
//! 2. Obtain a valid access token from the `AccessTokenProvider`
//! 3. Fetch jobs in `[checkpoint, now)`. The source may answer with whole
//!    days, so jobs whose created and modified times both fall outside the
//!    window are dropped. Jobs with no timestamps are kept.
//! 4. Drop repeated identifiers (first occurrence wins)
//! 5. For each job, sequentially: route, format the name, screen exact and
//!    sibling matches, provision
//! 6. Advance the checkpoint to `now`
//!
//! An auth or fetch failure aborts the cycle before step 6, so the next
//! cycle re-covers the same window. Per-job failures are recorded and do not
//! stop the batch; those jobs are picked up again only if a later window
//! returns them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncContext, SyncCoordinator};
//! use tokio_util::sync::CancellationToken;
//!
//! let coordinator = SyncCoordinator::new(context, tokens, jobs, store, clock, event_bus, lookback);
//! let shutdown = CancellationToken::new();
//! coordinator.run(Duration::from_secs(60), shutdown.clone()).await;
//! ```

use crate::checker::FolderChecker;
use crate::cycle::{CycleId, CycleReport, ItemOutcome};
use crate::error::{Result, SyncError};
use crate::naming::{base_identifier, format_name};
use crate::provisioner::{FolderProvisioner, MaterializedVia};
use crate::routing::DestinationMap;
use bridge_traits::jobs::{FetchWindow, Job, JobSource};
use bridge_traits::storage::{join_path, TeamContext, TeamFolderStore};
use bridge_traits::time::Clock;
use chrono::{DateTime, Utc};
use core_auth::AccessTokenProvider;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Everything a cycle needs that was resolved at startup.
#[derive(Debug, Clone)]
pub struct SyncContext {
    /// Namespace and member every storage call is scoped to
    pub team: TeamContext,
    pub destinations: DestinationMap,
    /// Folder copied into each new job folder
    pub template_path: String,
}

impl SyncContext {
    pub fn new(team: TeamContext, destinations: DestinationMap, template_path: impl Into<String>) -> Self {
        Self {
            team,
            destinations,
            template_path: template_path.into(),
        }
    }

    /// Reason the loop cannot run a cycle, if any
    pub fn unready_reason(&self) -> Option<&'static str> {
        if self.destinations.is_empty() {
            Some("no destination folders resolved")
        } else if !self.team.is_resolved() {
            Some("team context not resolved")
        } else {
            None
        }
    }
}

pub struct SyncCoordinator {
    context: SyncContext,
    tokens: Arc<dyn AccessTokenProvider>,
    jobs: Arc<dyn JobSource>,
    checker: FolderChecker,
    provisioner: FolderProvisioner,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    /// Exclusive lower bound of the next fetch window. Held for the whole
    /// cycle, so cycles never overlap.
    checkpoint: Mutex<DateTime<Utc>>,
}

impl SyncCoordinator {
    /// Create a coordinator whose first window opens `lookback` before now.
    ///
    /// A look-back past the representable range starts the window at now.
    pub fn new(
        context: SyncContext,
        tokens: Arc<dyn AccessTokenProvider>,
        jobs: Arc<dyn JobSource>,
        store: Arc<dyn TeamFolderStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        lookback: chrono::Duration,
    ) -> Self {
        let now = clock.now();
        let checkpoint = now.checked_sub_signed(lookback).unwrap_or_else(|| {
            warn!("Look-back out of range, first window opens now");
            now
        });
        let provisioner = FolderProvisioner::new(store.clone(), context.template_path.clone());

        Self {
            context,
            tokens,
            jobs,
            checker: FolderChecker::new(store),
            provisioner,
            clock,
            event_bus,
            checkpoint: Mutex::new(checkpoint),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Current checkpoint. Waits for an in-flight cycle to finish.
    pub async fn checkpoint(&self) -> DateTime<Utc> {
        *self.checkpoint.lock().await
    }

    /// Run one polling cycle.
    ///
    /// # Errors
    ///
    /// - [`SyncError::CycleSkipped`] if preconditions are not met
    /// - [`SyncError::Auth`] if no access token could be obtained
    /// - [`SyncError::Fetch`] if the job list could not be fetched or parsed
    ///
    /// The checkpoint only moves when this returns `Ok`.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_with_id(CycleId::new()).await
    }

    #[instrument(skip(self), fields(cycle_id = %cycle_id))]
    async fn run_cycle_with_id(&self, cycle_id: CycleId) -> Result<CycleReport> {
        let mut checkpoint = self.checkpoint.lock().await;
        let started = Instant::now();

        if let Some(reason) = self.context.unready_reason() {
            warn!(reason = reason, "Skipping cycle");
            self.emit(SyncEvent::CycleSkipped {
                cycle_id: cycle_id.to_string(),
                reason: reason.to_string(),
            });
            return Err(SyncError::CycleSkipped(reason.to_string()));
        }

        let from = *checkpoint;
        let now = self.clock.now();
        if now <= from {
            let reason = "clock has not advanced past the checkpoint";
            warn!(checkpoint = %from, now = %now, "Skipping cycle");
            self.emit(SyncEvent::CycleSkipped {
                cycle_id: cycle_id.to_string(),
                reason: reason.to_string(),
            });
            return Err(SyncError::CycleSkipped(reason.to_string()));
        }

        let window = FetchWindow::new(from, now);
        info!(window = %window, "Cycle started");
        self.emit(SyncEvent::CycleStarted {
            cycle_id: cycle_id.to_string(),
            window_from: window.from.to_rfc3339(),
            window_to: window.to.to_rfc3339(),
        });

        let jobs = match self.fetch(&window).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, window = %window, "Cycle aborted, checkpoint unchanged");
                self.emit(SyncEvent::CycleFailed {
                    cycle_id: cycle_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let mut report = CycleReport::new(cycle_id, window);
        report.received = jobs.len();

        let mut seen = HashSet::new();
        for job in jobs {
            if !job.touched_within(&window) {
                debug!(identifier = %job.identifier, "Job last touched outside the window, skipping");
                report.outside_window += 1;
                continue;
            }

            if !seen.insert(job.identifier.clone()) {
                debug!(identifier = %job.identifier, "Repeated identifier in batch, skipping");
                report.batch_duplicates += 1;
                continue;
            }

            let outcome = self.process_job(cycle_id, &job).await;
            report.record(job.identifier, outcome);
        }

        *checkpoint = now;
        report.duration = started.elapsed();

        info!(
            received = report.received,
            outside_window = report.outside_window,
            provisioned = report.provisioned(),
            skipped = report.skipped(),
            failed = report.failed(),
            duration_ms = report.duration.as_millis() as u64,
            "Cycle completed"
        );
        self.emit(SyncEvent::CycleCompleted {
            cycle_id: cycle_id.to_string(),
            fetched: report.received as u64,
            provisioned: report.provisioned() as u64,
            skipped: report.skipped() as u64,
            failed: report.failed() as u64,
            duration_ms: report.duration.as_millis() as u64,
        });

        Ok(report)
    }

    async fn fetch(&self, window: &FetchWindow) -> Result<Vec<Job>> {
        let access_token = self.tokens.access_token().await?;

        self.jobs
            .list_jobs(&access_token, window)
            .await
            .map_err(|e| SyncError::Fetch(e.to_string()))
    }

    #[instrument(skip(self, cycle_id, job), fields(identifier = %job.identifier))]
    async fn process_job(&self, cycle_id: CycleId, job: &Job) -> ItemOutcome {
        let team = &self.context.team;

        let Some(destination) = self.context.destinations.select_destination(&job.identifier) else {
            debug!("No destination for identifier, skipping");
            return ItemOutcome::Unrouted;
        };

        let name = format_name(&job.identifier, &job.title);

        if self.checker.exists(team, &destination.path, &name).await {
            let path = join_path(&destination.path, &name);
            debug!(path = %path, "Folder already exists");
            return ItemOutcome::AlreadyExists { path };
        }

        if let Some(base) = base_identifier(&job.identifier) {
            match self.checker.find_siblings(team, &destination.path, base).await {
                Ok(siblings) => {
                    if let Some(sibling) = siblings.into_iter().next() {
                        info!(sibling = %sibling, "Base identifier already has a folder, skipping variant");
                        return ItemOutcome::SiblingExists { sibling };
                    }
                }
                Err(e) => {
                    warn!(parent = %destination.path, error = %e, "Sibling check failed");
                    return ItemOutcome::Failed {
                        error: e.to_string(),
                    };
                }
            }
        }

        match self.provisioner.provision(team, &destination.path, &name).await {
            Ok(materialized) => {
                self.emit(SyncEvent::FolderProvisioned {
                    cycle_id: cycle_id.to_string(),
                    identifier: job.identifier.clone(),
                    path: materialized.path.clone(),
                    from_template: materialized.from_template(),
                });
                if materialized.via == MaterializedVia::AlreadyExisted {
                    debug!(path = %materialized.path, "Target already existed");
                }
                ItemOutcome::Provisioned {
                    path: materialized.path,
                    via: materialized.via,
                }
            }
            Err(e) => {
                error!(error = %e, "Provisioning failed");
                ItemOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Run cycles every `interval` until `shutdown` is cancelled.
    ///
    /// The first cycle starts immediately. A slow cycle delays the next tick
    /// rather than stacking ticks up, and cancellation is only observed
    /// between cycles.
    pub async fn run(&self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Sync loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(_) => {}
                        Err(SyncError::CycleSkipped(_)) => {}
                        Err(e) => warn!(error = %e, "Cycle did not complete; retrying next tick"),
                    }
                }
            }
        }

        info!("Sync loop stopped");
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}
