use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::lifecycle::{self, RunAction};
use crate::models::sample_run::{RunPriority, RunStatus, RunType, SampleRun};
use crate::store::{check_version, Store};

/// A sample run together with the derived display metrics the board and
/// scheduler views consume. Metrics are recomputed per read, never stored.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: SampleRun,
    pub progress_pct: u8,
    pub is_overdue: bool,
    pub days_in_status: Option<i64>,
    pub next_action: Option<RunAction>,
}

impl RunView {
    fn derive(run: SampleRun) -> Self {
        let now = Utc::now();
        let today = now.date_naive();
        Self {
            progress_pct: lifecycle::progress_pct(run.status),
            is_overdue: lifecycle::is_overdue(&run, today),
            days_in_status: lifecycle::days_in_status(&run, now),
            next_action: lifecycle::next_action(run.status),
            run,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSampleRun {
    pub style_ref: String,
    pub run_type: RunType,
    pub quantity: i32,
    pub priority: RunPriority,
    pub target_due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub run_type: Option<RunType>,
    pub priority: Option<RunPriority>,
    pub style_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerFilter {
    pub priority: Option<RunPriority>,
    pub due_from: Option<NaiveDate>,
    pub due_to: Option<NaiveDate>,
    /// Include accepted/cancelled runs; off by default
    #[serde(default)]
    pub include_closed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanLane {
    pub status: RunStatus,
    pub count: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanCounts {
    pub lanes: Vec<KanbanLane>,
    pub total: usize,
    pub total_overdue: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchTransitionError {
    pub id: Uuid,
    pub error: String,
}

/// Per-run outcome report for a batch transition; partial failure is the
/// expected case, never a reason to abort the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTransitionResult {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BatchTransitionError>,
}

#[derive(Clone)]
pub struct SampleRunService {
    store: Arc<Store>,
    event_sender: Option<EventSender>,
}

impl SampleRunService {
    pub fn new(store: Arc<Store>, event_sender: Option<EventSender>) -> Self {
        Self {
            store,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(err) = sender.send(event).await {
                warn!("failed to publish event: {}", err);
            }
        }
    }

    #[instrument(skip(self, input), fields(style_ref = %input.style_ref))]
    pub async fn create_run(&self, input: CreateSampleRun) -> Result<RunView, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be positive".into(),
            ));
        }
        if input.style_ref.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "style_ref must not be empty".into(),
            ));
        }

        // 1-based sequence per style + run type
        let run_no = self
            .store
            .sample_runs
            .iter()
            .filter(|entry| {
                entry.value().style_ref == input.style_ref
                    && entry.value().run_type == input.run_type
            })
            .map(|entry| entry.value().run_no)
            .max()
            .unwrap_or(0)
            + 1;

        let run = SampleRun::new(
            input.style_ref,
            run_no,
            input.run_type,
            input.quantity,
            input.priority,
            input.target_due_date,
            input.start_date,
            input.notes,
            Utc::now(),
        );
        let id = run.id;
        self.store.sample_runs.insert(id, run.clone());

        info!(run_id = %id, run_no, "sample run created");
        self.emit(Event::RunCreated(id)).await;
        Ok(RunView::derive(run))
    }

    pub fn get_run(&self, id: Uuid) -> Result<RunView, ServiceError> {
        self.store
            .sample_runs
            .get(&id)
            .map(|entry| RunView::derive(entry.value().clone()))
            .ok_or_else(|| ServiceError::NotFound(format!("Sample run {} not found", id)))
    }

    pub fn list_runs(&self, filter: &RunFilter) -> Vec<RunView> {
        let mut runs: Vec<RunView> = self
            .store
            .sample_runs
            .iter()
            .filter(|entry| {
                let run = entry.value();
                filter.status.map_or(true, |s| run.status == s)
                    && filter.run_type.map_or(true, |t| run.run_type == t)
                    && filter.priority.map_or(true, |p| run.priority == p)
                    && filter
                        .style_ref
                        .as_ref()
                        .map_or(true, |style| &run.style_ref == style)
            })
            .map(|entry| RunView::derive(entry.value().clone()))
            .collect();
        runs.sort_by(|a, b| {
            (a.run.style_ref.as_str(), a.run.run_no).cmp(&(b.run.style_ref.as_str(), b.run.run_no))
        });
        runs
    }

    /// Applies a forward action under the run's exclusive store entry.
    #[instrument(skip(self), fields(run_id = %id, action = %action))]
    pub async fn transition(
        &self,
        id: Uuid,
        action: RunAction,
        expected_version: Option<u64>,
    ) -> Result<RunView, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self
                .store
                .sample_runs
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Sample run {} not found", id)))?;
            check_version(entry.version, expected_version, id)?;
            let old_status = entry.status;
            lifecycle::apply_transition(&mut entry, action, Utc::now())?;
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!(
            "run {} moved from '{}' to '{}'",
            id, old_status, updated.status
        );
        self.emit(Event::RunStatusChanged {
            run_id: id,
            old_status,
            new_status: updated.status,
        })
        .await;
        Ok(RunView::derive(updated))
    }

    /// Moves a run backward to an explicit earlier status. The audit trail
    /// keeps the timestamps of the states rolled past.
    #[instrument(skip(self, note), fields(run_id = %id, target = %target))]
    pub async fn rollback(
        &self,
        id: Uuid,
        target: RunStatus,
        note: Option<String>,
        expected_version: Option<u64>,
    ) -> Result<RunView, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self
                .store
                .sample_runs
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Sample run {} not found", id)))?;
            check_version(entry.version, expected_version, id)?;
            let old_status = entry.status;
            lifecycle::rollback(&mut entry, target, Utc::now())?;
            if let Some(note) = note {
                entry.notes = Some(note);
            }
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!("run {} rolled back from '{}' to '{}'", id, old_status, target);
        self.emit(Event::RunRolledBack {
            run_id: id,
            from: old_status,
            to: target,
        })
        .await;
        Ok(RunView::derive(updated))
    }

    #[instrument(skip(self), fields(run_id = %id))]
    pub async fn cancel(&self, id: Uuid) -> Result<RunView, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self
                .store
                .sample_runs
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Sample run {} not found", id)))?;
            let old_status = entry.status;
            lifecycle::cancel(&mut entry, Utc::now())?;
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!("run {} cancelled from '{}'", id, old_status);
        self.emit(Event::RunStatusChanged {
            run_id: id,
            old_status,
            new_status: RunStatus::Cancelled,
        })
        .await;
        Ok(RunView::derive(updated))
    }

    #[instrument(skip(self, note), fields(run_id = %id))]
    pub async fn request_revision(
        &self,
        id: Uuid,
        note: Option<String>,
    ) -> Result<RunView, ServiceError> {
        let (old_status, updated) = {
            let mut entry = self
                .store
                .sample_runs
                .get_mut(&id)
                .ok_or_else(|| ServiceError::NotFound(format!("Sample run {} not found", id)))?;
            let old_status = entry.status;
            lifecycle::request_revision(&mut entry, Utc::now())?;
            if let Some(note) = note {
                entry.notes = Some(note);
            }
            entry.version += 1;
            (old_status, entry.clone())
        };

        info!("run {} flagged for revision from '{}'", id, old_status);
        self.emit(Event::RunStatusChanged {
            run_id: id,
            old_status,
            new_status: RunStatus::ReviseNeeded,
        })
        .await;
        Ok(RunView::derive(updated))
    }

    /// Applies `action` to each run independently; one run's failure never
    /// rolls back another's success, and no lock spans the batch.
    #[instrument(skip(self, ids), fields(count = ids.len(), action = %action))]
    pub async fn batch_transition(
        &self,
        ids: Vec<Uuid>,
        action: RunAction,
    ) -> BatchTransitionResult {
        let mut result = BatchTransitionResult {
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        };
        for id in ids {
            match self.transition(id, action, None).await {
                Ok(_) => result.succeeded += 1,
                Err(err) => {
                    result.failed += 1;
                    result.errors.push(BatchTransitionError {
                        id,
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            "batch transition '{}': {} succeeded, {} failed",
            action, result.succeeded, result.failed
        );
        result
    }

    /// Per-status lane counts for the kanban board, recomputed from the
    /// live runs on every call.
    pub fn kanban_counts(&self) -> KanbanCounts {
        let today = Utc::now().date_naive();
        let lane_order = lifecycle::FORWARD_CHAIN
            .iter()
            .copied()
            .chain([RunStatus::ReviseNeeded, RunStatus::Cancelled]);

        let mut lanes: Vec<KanbanLane> = lane_order
            .map(|status| KanbanLane {
                status,
                count: 0,
                overdue: 0,
            })
            .collect();

        let mut total = 0;
        let mut total_overdue = 0;
        for entry in self.store.sample_runs.iter() {
            let run = entry.value();
            total += 1;
            let overdue = lifecycle::is_overdue(run, today);
            if overdue {
                total_overdue += 1;
            }
            if let Some(lane) = lanes.iter_mut().find(|lane| lane.status == run.status) {
                lane.count += 1;
                if overdue {
                    lane.overdue += 1;
                }
            }
        }

        KanbanCounts {
            lanes,
            total,
            total_overdue,
        }
    }

    /// Runs joined with derived metrics for the scheduler view, ordered by
    /// target due date (undated runs last).
    pub fn scheduler_data(&self, filter: &SchedulerFilter) -> Vec<RunView> {
        let mut views: Vec<RunView> = self
            .store
            .sample_runs
            .iter()
            .filter(|entry| {
                let run = entry.value();
                if !filter.include_closed && run.status.is_terminal() {
                    return false;
                }
                if let Some(priority) = filter.priority {
                    if run.priority != priority {
                        return false;
                    }
                }
                match (run.target_due_date, filter.due_from, filter.due_to) {
                    (None, Some(_), _) | (None, _, Some(_)) => false,
                    (Some(due), from, to) => {
                        from.map_or(true, |f| due >= f) && to.map_or(true, |t| due <= t)
                    }
                    (None, None, None) => true,
                }
            })
            .map(|entry| RunView::derive(entry.value().clone()))
            .collect();

        views.sort_by(|a, b| {
            let key = |v: &RunView| (v.run.target_due_date.is_none(), v.run.target_due_date);
            key(a).cmp(&key(b))
        });
        views
    }
}
