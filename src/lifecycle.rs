//! Sample-run lifecycle state machine.
//!
//! The transition table is defined once as data so the same rules drive
//! button enablement, server-side validation and tests; scattering the
//! rules across conditionals is how client and server drift apart.
//!
//! All functions here are pure over a run and "now"; persistence and
//! concurrency control live in the service layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::errors::ServiceError;
use crate::models::sample_run::{RunStatus, SampleRun};

/// Forward action on a sample run. Wire names are kebab-case, as the
/// frontend sends them (`generate-t2po`, `issue-mwo`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunAction {
    StartMaterialsPlanning,
    GenerateT2po,
    IssueT2po,
    GenerateMwo,
    IssueMwo,
    StartProduction,
    MarkSampleDone,
    RecordActuals,
    GenerateSampleCosting,
    MarkQuoted,
    MarkAccepted,
}

/// The canonical forward chain, in order.
pub const FORWARD_CHAIN: [RunStatus; 12] = [
    RunStatus::Draft,
    RunStatus::MaterialsPlanning,
    RunStatus::PoDrafted,
    RunStatus::PoIssued,
    RunStatus::MwoDrafted,
    RunStatus::MwoIssued,
    RunStatus::InProgress,
    RunStatus::SampleDone,
    RunStatus::ActualsRecorded,
    RunStatus::CostingGenerated,
    RunStatus::Quoted,
    RunStatus::Accepted,
];

/// Each non-terminal chain state maps to exactly one forward action.
const TRANSITIONS: [(RunStatus, RunAction, RunStatus); 11] = [
    (
        RunStatus::Draft,
        RunAction::StartMaterialsPlanning,
        RunStatus::MaterialsPlanning,
    ),
    (
        RunStatus::MaterialsPlanning,
        RunAction::GenerateT2po,
        RunStatus::PoDrafted,
    ),
    (RunStatus::PoDrafted, RunAction::IssueT2po, RunStatus::PoIssued),
    (RunStatus::PoIssued, RunAction::GenerateMwo, RunStatus::MwoDrafted),
    (RunStatus::MwoDrafted, RunAction::IssueMwo, RunStatus::MwoIssued),
    (
        RunStatus::MwoIssued,
        RunAction::StartProduction,
        RunStatus::InProgress,
    ),
    (
        RunStatus::InProgress,
        RunAction::MarkSampleDone,
        RunStatus::SampleDone,
    ),
    (
        RunStatus::SampleDone,
        RunAction::RecordActuals,
        RunStatus::ActualsRecorded,
    ),
    (
        RunStatus::ActualsRecorded,
        RunAction::GenerateSampleCosting,
        RunStatus::CostingGenerated,
    ),
    (
        RunStatus::CostingGenerated,
        RunAction::MarkQuoted,
        RunStatus::Quoted,
    ),
    (RunStatus::Quoted, RunAction::MarkAccepted, RunStatus::Accepted),
];

/// Position of a status within the canonical forward chain.
/// `None` for the side branches (`revise_needed`, `cancelled`).
pub fn chain_index(status: RunStatus) -> Option<usize> {
    FORWARD_CHAIN.iter().position(|s| *s == status)
}

/// The single forward action available from `status`, if any.
/// Total: `accepted`, `cancelled` and `revise_needed` return `None`.
pub fn next_action(status: RunStatus) -> Option<RunAction> {
    TRANSITIONS
        .iter()
        .find(|(from, _, _)| *from == status)
        .map(|(_, action, _)| *action)
}

/// The status reached by applying `next_action(status)`.
pub fn next_status(status: RunStatus) -> Option<RunStatus> {
    TRANSITIONS
        .iter()
        .find(|(from, _, _)| *from == status)
        .map(|(_, _, to)| *to)
}

/// Applies a forward action to the run, recording the new status timestamp
/// before the status becomes current. Fails with `InvalidTransition` when
/// the current status has no mapped action or `action` is not the mapped
/// one.
pub fn apply_transition(
    run: &mut SampleRun,
    action: RunAction,
    now: DateTime<Utc>,
) -> Result<RunStatus, ServiceError> {
    let Some((_, expected, to)) = TRANSITIONS.iter().find(|(from, _, _)| *from == run.status)
    else {
        return Err(ServiceError::InvalidTransition(format!(
            "no forward action available from status '{}'",
            run.status
        )));
    };
    if action != *expected {
        return Err(ServiceError::InvalidTransition(format!(
            "action '{}' does not apply to status '{}' (expected '{}')",
            action, run.status, expected
        )));
    }
    run.enter_status(*to, now);
    Ok(*to)
}

/// Validates a rollback target against the current status.
///
/// The target must be a canonical chain state strictly earlier than the
/// current position, and never `accepted` or `cancelled`. Rollback from
/// `cancelled` or `accepted` is refused. From `revise_needed` (which has
/// no chain position) any non-terminal chain state is a legal target.
pub fn validate_rollback_target(
    current: RunStatus,
    target: RunStatus,
) -> Result<(), ServiceError> {
    if current.is_terminal() {
        return Err(ServiceError::InvalidRollbackTarget(format!(
            "cannot roll back a run in terminal status '{}'",
            current
        )));
    }
    if target == RunStatus::Cancelled || target == RunStatus::Accepted {
        return Err(ServiceError::InvalidRollbackTarget(format!(
            "'{}' is not a valid rollback target",
            target
        )));
    }
    let Some(target_idx) = chain_index(target) else {
        return Err(ServiceError::InvalidRollbackTarget(format!(
            "'{}' is not in the canonical forward chain",
            target
        )));
    };
    if let Some(current_idx) = chain_index(current) {
        if target_idx >= current_idx {
            return Err(ServiceError::InvalidRollbackTarget(format!(
                "'{}' is not strictly earlier than current status '{}'",
                target, current
            )));
        }
    }
    // current == revise_needed: any non-terminal chain target is fine
    Ok(())
}

/// Moves the run backward to `target`. Timestamps of skipped states are
/// kept; only the revisited status gets a fresh entry.
pub fn rollback(
    run: &mut SampleRun,
    target: RunStatus,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    validate_rollback_target(run.status, target)?;
    run.enter_status(target, now);
    Ok(())
}

/// Cancels the run. Legal from any state except `accepted`/`cancelled`.
pub fn cancel(run: &mut SampleRun, now: DateTime<Utc>) -> Result<(), ServiceError> {
    if run.status.is_terminal() {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot cancel a run in terminal status '{}'",
            run.status
        )));
    }
    run.enter_status(RunStatus::Cancelled, now);
    Ok(())
}

/// Flags the run for revision. Legal from mid-chain states
/// (`materials_planning` through `quoted`).
pub fn request_revision(run: &mut SampleRun, now: DateTime<Utc>) -> Result<(), ServiceError> {
    let mid_chain = matches!(chain_index(run.status), Some(idx) if idx >= 1 && idx <= 10);
    if !mid_chain {
        return Err(ServiceError::InvalidTransition(format!(
            "cannot request revision from status '{}'",
            run.status
        )));
    }
    run.enter_status(RunStatus::ReviseNeeded, now);
    Ok(())
}

/// Fixed status -> percent mapping for display. Not authoritative.
pub fn progress_pct(status: RunStatus) -> u8 {
    match status {
        RunStatus::Draft => 10,
        RunStatus::MaterialsPlanning => 20,
        RunStatus::PoDrafted => 30,
        RunStatus::PoIssued => 40,
        RunStatus::MwoDrafted => 50,
        RunStatus::MwoIssued => 60,
        RunStatus::InProgress => 70,
        RunStatus::SampleDone => 80,
        RunStatus::ActualsRecorded => 90,
        RunStatus::CostingGenerated | RunStatus::Quoted | RunStatus::Accepted => 100,
        RunStatus::ReviseNeeded => 50,
        RunStatus::Cancelled => 0,
    }
}

/// True iff the run has a target due date in the past and is still open.
pub fn is_overdue(run: &SampleRun, today: NaiveDate) -> bool {
    match run.target_due_date {
        Some(due) => today > due && !run.status.is_terminal(),
        None => false,
    }
}

/// Whole days the run has spent in its current status.
/// `None` when no timestamp was recorded (never panics).
pub fn days_in_status(run: &SampleRun, now: DateTime<Utc>) -> Option<i64> {
    run.status_timestamps
        .get(&run.status)
        .map(|entered| (now - *entered).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_run::{RunPriority, RunType};
    use assert_matches::assert_matches;
    use strum::IntoEnumIterator;

    fn run_in(status: RunStatus) -> SampleRun {
        let mut run = SampleRun::new(
            "ST-1".into(),
            1,
            RunType::Proto,
            2,
            RunPriority::Normal,
            None,
            None,
            None,
            Utc::now(),
        );
        run.enter_status(status, Utc::now());
        run
    }

    #[test]
    fn every_chain_state_except_accepted_has_exactly_one_action() {
        for status in FORWARD_CHAIN {
            if status == RunStatus::Accepted {
                assert_eq!(next_action(status), None);
            } else {
                let action = next_action(status).expect("chain state must map to an action");
                let mut run = run_in(status);
                let reached = apply_transition(&mut run, action, Utc::now()).unwrap();
                assert_eq!(Some(reached), next_status(status));
            }
        }
    }

    #[test]
    fn next_action_is_total_over_all_statuses() {
        for status in RunStatus::iter() {
            let expect_none = matches!(
                status,
                RunStatus::Accepted | RunStatus::Cancelled | RunStatus::ReviseNeeded
            );
            assert_eq!(next_action(status).is_none(), expect_none, "{status}");
        }
    }

    #[test]
    fn transition_chain_follows_canonical_order() {
        for window in FORWARD_CHAIN.windows(2) {
            assert_eq!(next_status(window[0]), Some(window[1]));
        }
    }

    #[test]
    fn wrong_action_is_rejected_without_mutation() {
        let mut run = run_in(RunStatus::PoIssued);
        let before = run.status_timestamps.clone();
        assert_matches!(
            apply_transition(&mut run, RunAction::IssueMwo, Utc::now()),
            Err(ServiceError::InvalidTransition(_))
        );
        assert_eq!(run.status, RunStatus::PoIssued);
        assert_eq!(run.status_timestamps, before);
    }

    #[test]
    fn action_wire_names_are_kebab_case() {
        assert_eq!(
            RunAction::StartMaterialsPlanning.to_string(),
            "start-materials-planning"
        );
        assert_eq!(RunAction::GenerateT2po.to_string(), "generate-t2po");
        assert_eq!(
            "generate-mwo".parse::<RunAction>().unwrap(),
            RunAction::GenerateMwo
        );
    }

    #[test]
    fn rollback_must_target_strictly_earlier_chain_state() {
        assert!(validate_rollback_target(RunStatus::MwoIssued, RunStatus::MaterialsPlanning).is_ok());
        assert_matches!(
            validate_rollback_target(RunStatus::PoIssued, RunStatus::CostingGenerated),
            Err(ServiceError::InvalidRollbackTarget(_))
        );
        assert_matches!(
            validate_rollback_target(RunStatus::PoIssued, RunStatus::PoIssued),
            Err(ServiceError::InvalidRollbackTarget(_))
        );
        assert_matches!(
            validate_rollback_target(RunStatus::PoIssued, RunStatus::Cancelled),
            Err(ServiceError::InvalidRollbackTarget(_))
        );
        assert_matches!(
            validate_rollback_target(RunStatus::Cancelled, RunStatus::Draft),
            Err(ServiceError::InvalidRollbackTarget(_))
        );
    }

    #[test]
    fn rollback_keeps_timestamps_of_skipped_states() {
        let mut run = run_in(RunStatus::Draft);
        let now = Utc::now();
        for action in [
            RunAction::StartMaterialsPlanning,
            RunAction::GenerateT2po,
            RunAction::IssueT2po,
        ] {
            apply_transition(&mut run, action, now).unwrap();
        }
        rollback(&mut run, RunStatus::MaterialsPlanning, now).unwrap();
        assert_eq!(run.status, RunStatus::MaterialsPlanning);
        // skipped states stay on the audit trail
        assert!(run.status_timestamps.contains_key(&RunStatus::PoDrafted));
        assert!(run.status_timestamps.contains_key(&RunStatus::PoIssued));
    }

    #[test]
    fn revision_only_from_mid_chain() {
        assert!(request_revision(&mut run_in(RunStatus::PoIssued), Utc::now()).is_ok());
        assert_matches!(
            request_revision(&mut run_in(RunStatus::Draft), Utc::now()),
            Err(ServiceError::InvalidTransition(_))
        );
        assert_matches!(
            request_revision(&mut run_in(RunStatus::Accepted), Utc::now()),
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[test]
    fn overdue_derivation_respects_terminal_states() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();
        let mut run = run_in(RunStatus::InProgress);
        run.target_due_date = NaiveDate::from_ymd_opt(2026, 2, 1);
        assert!(is_overdue(&run, today));

        run.enter_status(RunStatus::Accepted, Utc::now());
        assert!(!is_overdue(&run, today));
    }

    #[test]
    fn days_in_status_is_none_without_timestamp() {
        let mut run = run_in(RunStatus::Draft);
        run.status_timestamps.clear();
        assert_eq!(days_in_status(&run, Utc::now()), None);
    }

    #[test]
    fn progress_is_monotonic_along_the_chain() {
        let values: Vec<u8> = FORWARD_CHAIN.iter().map(|s| progress_pct(*s)).collect();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress_pct(RunStatus::Cancelled), 0);
        assert_eq!(progress_pct(RunStatus::ReviseNeeded), 50);
    }
}
