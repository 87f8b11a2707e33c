use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Sample-run lifecycle status.
///
/// The canonical forward chain runs `draft` through `accepted`;
/// `revise_needed` and `cancelled` are side branches. Wire names are
/// snake_case, matching what clients persist and display.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Draft,
    MaterialsPlanning,
    PoDrafted,
    PoIssued,
    MwoDrafted,
    MwoIssued,
    InProgress,
    SampleDone,
    ActualsRecorded,
    CostingGenerated,
    Quoted,
    Accepted,
    ReviseNeeded,
    Cancelled,
}

impl RunStatus {
    /// Terminal states accept no further transitions of any kind.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Accepted | RunStatus::Cancelled)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunType {
    Proto,
    Fit,
    Sales,
    Photo,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunPriority {
    Urgent,
    Normal,
    Low,
}

/// A single sample run for a style (one proto/fit/sales/photo iteration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRun {
    pub id: Uuid,
    pub style_ref: String,
    /// 1-based sequence per style + run type
    pub run_no: i32,
    pub run_type: RunType,
    pub status: RunStatus,
    pub quantity: i32,
    pub priority: RunPriority,
    pub target_due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    /// Instant the run entered each status it has ever reached.
    /// Append-only: rollback never deletes entries; re-entering a status
    /// overwrites only that status's entry.
    pub status_timestamps: HashMap<RunStatus, DateTime<Utc>>,
    pub notes: Option<String>,
    /// Optimistic-lock counter, bumped on every successful mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SampleRun {
    /// Creates a run in `draft`, recording the draft timestamp before the
    /// run is ever visible (the current status always has a timestamp).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        style_ref: String,
        run_no: i32,
        run_type: RunType,
        quantity: i32,
        priority: RunPriority,
        target_due_date: Option<NaiveDate>,
        start_date: Option<NaiveDate>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut status_timestamps = HashMap::new();
        status_timestamps.insert(RunStatus::Draft, now);
        Self {
            id: Uuid::new_v4(),
            style_ref,
            run_no,
            run_type,
            status: RunStatus::Draft,
            quantity,
            priority,
            target_due_date,
            start_date,
            status_timestamps,
            notes,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the timestamp for `status`, then makes it current.
    pub fn enter_status(&mut self, status: RunStatus, now: DateTime<Utc>) {
        self.status_timestamps.insert(status, now);
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_records_draft_timestamp() {
        let now = Utc::now();
        let run = SampleRun::new(
            "ST-100".into(),
            1,
            RunType::Proto,
            3,
            RunPriority::Normal,
            None,
            None,
            None,
            now,
        );
        assert_eq!(run.status, RunStatus::Draft);
        assert_eq!(run.status_timestamps.get(&RunStatus::Draft), Some(&now));
    }

    #[test]
    fn status_wire_names_are_snake_case() {
        assert_eq!(RunStatus::MaterialsPlanning.to_string(), "materials_planning");
        assert_eq!(RunStatus::PoIssued.to_string(), "po_issued");
        assert_eq!(
            serde_json::to_string(&RunStatus::ReviseNeeded).unwrap(),
            "\"revise_needed\""
        );
    }
}
