//! Sample-run lifecycle tests: forward chain totality, rollback rules,
//! batch partial failure and derived metrics.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use test_case::test_case;
use uuid::Uuid;

use stitchflow_api::errors::ServiceError;
use stitchflow_api::lifecycle::{self, RunAction};
use stitchflow_api::models::sample_run::{RunPriority, RunStatus, RunType};
use stitchflow_api::services::sample_runs::{CreateSampleRun, SampleRunService};
use stitchflow_api::store::Store;

fn service() -> (SampleRunService, Arc<Store>) {
    let store = Arc::new(Store::new());
    (SampleRunService::new(store.clone(), None), store)
}

fn create_input(style_ref: &str) -> CreateSampleRun {
    CreateSampleRun {
        style_ref: style_ref.to_string(),
        run_type: RunType::Proto,
        quantity: 3,
        priority: RunPriority::Normal,
        target_due_date: None,
        start_date: None,
        notes: None,
    }
}

async fn new_run(service: &SampleRunService, style_ref: &str) -> Uuid {
    service
        .create_run(create_input(style_ref))
        .await
        .expect("run should be created")
        .run
        .id
}

/// Walks the run forward until it reaches `target`.
async fn advance_to(service: &SampleRunService, id: Uuid, target: RunStatus) {
    loop {
        let view = service.get_run(id).unwrap();
        if view.run.status == target {
            return;
        }
        let action = lifecycle::next_action(view.run.status)
            .unwrap_or_else(|| panic!("no action from {}", view.run.status));
        service.transition(id, action, None).await.unwrap();
    }
}

#[test_case(RunStatus::Draft, RunAction::StartMaterialsPlanning, RunStatus::MaterialsPlanning)]
#[test_case(RunStatus::MaterialsPlanning, RunAction::GenerateT2po, RunStatus::PoDrafted)]
#[test_case(RunStatus::PoDrafted, RunAction::IssueT2po, RunStatus::PoIssued)]
#[test_case(RunStatus::PoIssued, RunAction::GenerateMwo, RunStatus::MwoDrafted)]
#[test_case(RunStatus::MwoDrafted, RunAction::IssueMwo, RunStatus::MwoIssued)]
#[test_case(RunStatus::MwoIssued, RunAction::StartProduction, RunStatus::InProgress)]
#[test_case(RunStatus::InProgress, RunAction::MarkSampleDone, RunStatus::SampleDone)]
#[test_case(RunStatus::SampleDone, RunAction::RecordActuals, RunStatus::ActualsRecorded)]
#[test_case(RunStatus::ActualsRecorded, RunAction::GenerateSampleCosting, RunStatus::CostingGenerated)]
#[test_case(RunStatus::CostingGenerated, RunAction::MarkQuoted, RunStatus::Quoted)]
#[test_case(RunStatus::Quoted, RunAction::MarkAccepted, RunStatus::Accepted)]
fn action_table_matches_canonical_chain(from: RunStatus, action: RunAction, to: RunStatus) {
    assert_eq!(lifecycle::next_action(from), Some(action));
    assert_eq!(lifecycle::next_status(from), Some(to));
}

#[tokio::test]
async fn full_walk_from_draft_to_accepted() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;

    advance_to(&service, id, RunStatus::Accepted).await;

    let view = service.get_run(id).unwrap();
    assert_eq!(view.run.status, RunStatus::Accepted);
    assert_eq!(view.progress_pct, 100);
    assert_eq!(view.next_action, None);
    // every chain state was stamped on the way through
    for status in lifecycle::FORWARD_CHAIN {
        assert!(
            view.run.status_timestamps.contains_key(&status),
            "missing timestamp for {status}"
        );
    }
}

#[tokio::test]
async fn wrong_action_is_rejected_and_state_is_unchanged() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;

    let err = service
        .transition(id, RunAction::GenerateMwo, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let view = service.get_run(id).unwrap();
    assert_eq!(view.run.status, RunStatus::Draft);
    assert_eq!(view.run.version, 0);
}

#[tokio::test]
async fn transition_from_accepted_is_rejected() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    advance_to(&service, id, RunStatus::Accepted).await;

    let err = service
        .transition(id, RunAction::StartMaterialsPlanning, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    service
        .transition(id, RunAction::StartMaterialsPlanning, Some(0))
        .await
        .unwrap();

    // second writer raced with a stale snapshot
    let err = service
        .transition(id, RunAction::GenerateT2po, Some(0))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ConcurrentModification(conflicting) if conflicting == id);
}

#[tokio::test]
async fn run_numbers_are_sequential_per_style_and_type() {
    let (service, _) = service();
    let first = service.create_run(create_input("ST-100")).await.unwrap();
    let second = service.create_run(create_input("ST-100")).await.unwrap();
    let other_style = service.create_run(create_input("ST-200")).await.unwrap();

    let mut fit = create_input("ST-100");
    fit.run_type = RunType::Fit;
    let first_fit = service.create_run(fit).await.unwrap();

    assert_eq!(first.run.run_no, 1);
    assert_eq!(second.run.run_no, 2);
    assert_eq!(other_style.run.run_no, 1);
    assert_eq!(first_fit.run.run_no, 1);
}

#[tokio::test]
async fn rollback_succeeds_to_an_earlier_state_and_keeps_the_audit_trail() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    advance_to(&service, id, RunStatus::MwoIssued).await;

    let view = service
        .rollback(id, RunStatus::MaterialsPlanning, Some("mill delay".into()), None)
        .await
        .unwrap();
    assert_eq!(view.run.status, RunStatus::MaterialsPlanning);
    // skipped states keep their timestamps
    assert!(view.run.status_timestamps.contains_key(&RunStatus::PoIssued));
    assert!(view.run.status_timestamps.contains_key(&RunStatus::MwoIssued));

    // re-advancing overwrites only the statuses actually revisited
    advance_to(&service, id, RunStatus::PoIssued).await;
    let view = service.get_run(id).unwrap();
    assert_eq!(view.run.status, RunStatus::PoIssued);
}

#[tokio::test]
async fn rollback_rejects_forward_and_cancelled_targets() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    advance_to(&service, id, RunStatus::PoIssued).await;

    let err = service
        .rollback(id, RunStatus::CostingGenerated, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRollbackTarget(_));

    let err = service
        .rollback(id, RunStatus::Cancelled, None, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidRollbackTarget(_));

    // unchanged after the failed attempts
    assert_eq!(service.get_run(id).unwrap().run.status, RunStatus::PoIssued);
}

#[tokio::test]
async fn cancel_is_rejected_once_accepted() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    advance_to(&service, id, RunStatus::Accepted).await;

    let err = service.cancel(id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));
}

#[tokio::test]
async fn revision_flow_and_rollback_out_of_it() {
    let (service, _) = service();
    let id = new_run(&service, "ST-100").await;
    advance_to(&service, id, RunStatus::SampleDone).await;

    let view = service
        .request_revision(id, Some("collar measurements off".into()))
        .await
        .unwrap();
    assert_eq!(view.run.status, RunStatus::ReviseNeeded);
    assert_eq!(view.progress_pct, 50);

    // from revise_needed any earlier chain state is a legal target
    let view = service
        .rollback(id, RunStatus::MwoIssued, None, None)
        .await
        .unwrap();
    assert_eq!(view.run.status, RunStatus::MwoIssued);
}

#[tokio::test]
async fn batch_transition_reports_partial_failure_per_run() {
    let (service, _) = service();
    let run_a = new_run(&service, "ST-100").await;
    let run_b = new_run(&service, "ST-200").await;
    advance_to(&service, run_b, RunStatus::Accepted).await;
    let missing = Uuid::new_v4();

    let result = service
        .batch_transition(
            vec![run_a, run_b, missing],
            RunAction::StartMaterialsPlanning,
        )
        .await;

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 2);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().any(|e| e.id == run_b));
    assert!(result.errors.iter().any(|e| e.id == missing));

    // the failing members did not block the succeeding one
    assert_eq!(
        service.get_run(run_a).unwrap().run.status,
        RunStatus::MaterialsPlanning
    );
    assert_eq!(service.get_run(run_b).unwrap().run.status, RunStatus::Accepted);
}

#[tokio::test]
async fn overdue_and_days_in_status_derivations() {
    let (service, store) = service();
    let mut input = create_input("ST-100");
    input.target_due_date = Some((Utc::now() - Duration::days(1)).date_naive());
    let id = service.create_run(input).await.unwrap().run.id;
    advance_to(&service, id, RunStatus::InProgress).await;

    let view = service.get_run(id).unwrap();
    assert!(view.is_overdue);
    assert_eq!(view.days_in_status, Some(0));

    advance_to(&service, id, RunStatus::Accepted).await;
    assert!(!service.get_run(id).unwrap().is_overdue);

    // a run with no timestamp for its current status derives None, not a panic
    store
        .sample_runs
        .get_mut(&id)
        .unwrap()
        .status_timestamps
        .clear();
    assert_eq!(service.get_run(id).unwrap().days_in_status, None);
}

#[tokio::test]
async fn kanban_counts_recompute_from_live_runs() {
    let (service, _) = service();
    let run_a = new_run(&service, "ST-100").await;
    let _run_b = new_run(&service, "ST-200").await;
    advance_to(&service, run_a, RunStatus::InProgress).await;

    let counts = service.kanban_counts();
    assert_eq!(counts.total, 2);
    let lane = |status: RunStatus| {
        counts
            .lanes
            .iter()
            .find(|l| l.status == status)
            .unwrap()
            .count
    };
    assert_eq!(lane(RunStatus::Draft), 1);
    assert_eq!(lane(RunStatus::InProgress), 1);
    assert_eq!(lane(RunStatus::Accepted), 0);

    // identical without intervening mutation
    let again = service.kanban_counts();
    assert_eq!(again.total, counts.total);
    assert_eq!(again.lanes.len(), counts.lanes.len());
}

#[tokio::test]
async fn scheduler_orders_by_due_date_and_respects_filters() {
    let (service, _) = service();

    let mut early = create_input("ST-1");
    early.target_due_date = Some(Utc::now().date_naive());
    let early_id = service.create_run(early).await.unwrap().run.id;

    let mut late = create_input("ST-2");
    late.target_due_date = Some((Utc::now() + Duration::days(14)).date_naive());
    late.priority = RunPriority::Urgent;
    let late_id = service.create_run(late).await.unwrap().run.id;

    let undated_id = new_run(&service, "ST-3").await;

    let all = service.scheduler_data(&Default::default());
    let ids: Vec<Uuid> = all.iter().map(|v| v.run.id).collect();
    assert_eq!(ids, vec![early_id, late_id, undated_id]);

    let urgent_only = service.scheduler_data(&stitchflow_api::services::sample_runs::SchedulerFilter {
        priority: Some(RunPriority::Urgent),
        ..Default::default()
    });
    assert_eq!(urgent_only.len(), 1);
    assert_eq!(urgent_only[0].run.id, late_id);
}
