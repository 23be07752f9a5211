//! End-to-end scenarios: tasks submitted to the job queue run their
//! sub-tasks and atoms through nested active queues backed by simulated
//! hardware.

mod common;

use common::*;
use serde_json::json;
use std::time::Duration;

use atom_queue_core::constants::messages;
use atom_queue_core::models::{
    MonitorAtom, MoveAtom, QueueAtom, Queueable, ScanAtom, SubTaskAtom, TaskBean,
};
use atom_queue_core::services::{monitor_dataset, QueueController, QueueService, ScanService};
use atom_queue_core::state_machine::{ControlRequest, QueueStatus, Status};

fn moves(targets: &[(f64, u64)]) -> Vec<MoveAtom> {
    targets
        .iter()
        .map(|&(target, run_time)| {
            MoveAtom::single(format!("x to {target}"), "x", target).with_run_time(run_time)
        })
        .collect()
}

fn ids<B: Queueable>(beans: &[B]) -> Vec<String> {
    beans.iter().map(|b| b.unique_id().to_string()).collect()
}

fn sub_task(name: &str, atoms: impl IntoIterator<Item = QueueAtom>) -> SubTaskAtom {
    SubTaskAtom::with_atoms(name, atoms).expect("unique child ids")
}

fn task(name: &str, sub_tasks: impl IntoIterator<Item = SubTaskAtom>) -> TaskBean {
    TaskBean::with_sub_tasks(name, sub_tasks).expect("unique sub-task ids")
}

fn grid_scan() -> ScanAtom {
    ScanAtom::new(
        "grid",
        vec![json!({"type": "grid", "axes": ["x", "y"], "points": [5, 5]})],
    )
    .with_detector("mandelbrot", json!({"exposureTime": 0.01}))
}

/// Every active queue was stopped exactly once, without purging, and then
/// deregistered
fn assert_active_queues_tidied(harness: &EngineHarness) {
    let job_queue = harness.service.job_queue_id();
    let records: Vec<_> = harness
        .service
        .queue_records()
        .into_iter()
        .filter(|record| record.queue_id != job_queue)
        .collect();
    assert!(!records.is_empty());
    for record in records {
        assert_eq!(record.stops, vec![false], "stops of {}", record.queue_id);
        assert!(record.deregistered, "{} still registered", record.queue_id);
    }
    assert!(harness.service.active_queue_ids().is_empty());
}

#[tokio::test]
async fn test_task_with_three_moves_completes() {
    let harness = EngineHarness::start();
    let moves = moves(&[(1.0, 1), (2.0, 1), (3.0, 2)]);
    let move_ids = ids(&moves);
    let align = sub_task("align", moves.into_iter().map(QueueAtom::from));
    let align_id = align.unique_id().to_string();
    let task_id = harness
        .submit(task("experiment", [align]).with_provenance("i22", "ws001", "abc123"))
        .await;

    let finished = harness.wait_for_task_end(&task_id).await;
    assert_eq!(finished.status(), Status::Complete);
    assert_percent(finished.percent_complete(), 100.0);
    assert_eq!(finished.message(), Some(messages::TASK_COMPLETED));
    assert_eq!(
        finished.queue_message.as_deref(),
        Some(messages::ALL_CHILDREN_COMPLETE)
    );

    let align = harness.atom(&align_id);
    assert_eq!(align.status(), Status::Complete);
    assert_eq!(align.message(), Some(messages::SUBTASK_COMPLETED));
    for move_id in &move_ids {
        let atom = harness.atom(move_id);
        assert_eq!(atom.status(), Status::Complete);
        assert_eq!(atom.message(), Some(messages::MOVE_COMPLETED));
        assert_eq!(atom.core().beamline.as_deref(), Some("i22"));
        assert_eq!(atom.core().user_name.as_deref(), Some("abc123"));
    }
    let targets: Vec<f64> = harness
        .positioner
        .moves()
        .iter()
        .map(|position| position["x"])
        .collect();
    assert_eq!(targets, vec![1.0, 2.0, 3.0]);

    assert_active_queues_tidied(&harness);

    harness
        .wait_for_task_event(&task_id, |t| t.status() == Status::Complete)
        .await;
    let percents: Vec<f64> = harness
        .recorder
        .history(&task_id)
        .iter()
        .map(|t| t.percent_complete())
        .collect();
    assert!(
        percents.windows(2).all(|pair| pair[1] >= pair[0]),
        "task progress regressed: {percents:?}"
    );
    let finals = harness
        .recorder
        .statuses(&task_id)
        .into_iter()
        .filter(|status| status.is_final())
        .count();
    assert_eq!(finals, 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_failed_move_fails_parents_and_freezes_progress() {
    let harness = EngineHarness::builder()
        .move_delay(Duration::from_millis(50))
        .build();
    harness.positioner.fail_on("x", 2.0);

    let moves = moves(&[(1.0, 1), (2.0, 1), (3.0, 2)]);
    let move_ids = ids(&moves);
    let align = sub_task("align", moves.into_iter().map(QueueAtom::from));
    let align_id = align.unique_id().to_string();
    let task_id = harness.submit(task("experiment", [align])).await;

    let failed = harness.wait_for_task_end(&task_id).await;
    assert_eq!(failed.status(), Status::Failed);
    assert_eq!(failed.message(), Some(messages::TASK_FAILED));
    assert_eq!(
        failed.queue_message.as_deref(),
        Some("Failure caused by 'align'")
    );

    // Sub-task: 5% spooling plus a quarter of the remaining 94.5% for the
    // first move and a fifth of another quarter for the second
    let align = harness.atom(&align_id);
    assert_eq!(align.status(), Status::Failed);
    assert_eq!(align.message(), Some(messages::SUBTASK_FAILED));
    assert_percent(align.percent_complete(), 33.35);
    assert_percent(failed.percent_complete(), 5.0 + 94.5 * 0.3335);

    assert_eq!(harness.atom(&move_ids[0]).status(), Status::Complete);
    let second = harness.atom(&move_ids[1]);
    assert_eq!(second.status(), Status::Failed);
    assert!(second
        .message()
        .unwrap_or_default()
        .contains("could not reach 2"));

    assert_active_queues_tidied(&harness);

    // A failed task pauses the job queue; later tasks wait until resumed
    let job_queue = harness.service.job_queue_id();
    assert_eq!(
        harness.service.get_queue_status(&job_queue).await.unwrap(),
        QueueStatus::Paused
    );
    let follow_up = harness
        .submit(task("follow-up", [sub_task("park", [MoveAtom::single("park", "x", 0.0).into()])]))
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.task(&follow_up).status(), Status::Submitted);
    assert_eq!(harness.service.pending_tasks(), 1);

    harness.service.resume_queue(&job_queue).await.unwrap();
    let follow_up = harness.wait_for_task_end(&follow_up).await;
    assert_eq!(follow_up.status(), Status::Complete);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_terminating_task_stops_every_level() {
    let harness = EngineHarness::builder()
        .move_delay(Duration::from_millis(300))
        .build();
    let moves = moves(&[(1.0, 1), (2.0, 1), (3.0, 1)]);
    let move_ids = ids(&moves);
    let align = sub_task("align", moves.into_iter().map(QueueAtom::from));
    let align_id = align.unique_id().to_string();
    let task_id = harness.submit(task("experiment", [align])).await;

    harness
        .wait_for_atom(&move_ids[0], |atom| {
            atom.message() == Some(messages::MOVE_MOVING)
        })
        .await;
    harness.request_task(&task_id, ControlRequest::Terminate).await;

    let terminated = harness.wait_for_task_end(&task_id).await;
    assert_eq!(terminated.status(), Status::Terminated);
    assert_eq!(terminated.message(), Some(messages::TASK_ABORTED));
    assert!(terminated.percent_complete() < 99.5);

    let align = harness
        .wait_for_atom(&align_id, |atom| atom.status().is_concluded())
        .await;
    assert_eq!(align.status(), Status::Terminated);
    assert_eq!(align.message(), Some(messages::SUBTASK_ABORTED));

    let first = harness
        .wait_for_atom(&move_ids[0], |atom| atom.status().is_concluded())
        .await;
    assert_eq!(first.status(), Status::Terminated);
    assert_eq!(first.message(), Some(messages::MOVE_ABORTED));
    // Not purged: the remaining moves were never taken off their queue
    for move_id in &move_ids[1..] {
        assert_eq!(harness.atom(move_id).status(), Status::Submitted);
    }

    assert_active_queues_tidied(&harness);
    eventually(|| (harness.positioner.abort_count() == 1).then_some(())).await;
    assert!(harness.positioner.moves().is_empty());

    // The job queue keeps consuming after a termination
    let next = harness
        .submit(task("next", [sub_task("park", [MoveAtom::single("park", "x", 0.0).into()])]))
        .await;
    assert_eq!(
        harness.wait_for_task_end(&next).await.status(),
        Status::Complete
    );

    harness.shutdown().await;
}

#[tokio::test]
async fn test_terminating_pending_task_removes_it() {
    let harness = EngineHarness::builder()
        .move_delay(Duration::from_millis(150))
        .build();
    let first = harness
        .submit(task("first", [sub_task("a", [MoveAtom::single("a", "x", 1.0).into()])]))
        .await;
    let second = harness
        .submit(task("second", [sub_task("b", [MoveAtom::single("b", "x", 2.0).into()])]))
        .await;

    harness
        .wait_for_task(&first, |t| t.status().is_running())
        .await;
    harness.request_task(&second, ControlRequest::Terminate).await;

    let removed = harness.task(&second);
    assert_eq!(removed.status(), Status::Terminated);
    assert_eq!(harness.service.pending_tasks(), 0);

    assert_eq!(
        harness.wait_for_task_end(&first).await.status(),
        Status::Complete
    );
    assert_eq!(harness.positioner.moves().len(), 1);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_empty_composites_complete() {
    let harness = EngineHarness::start();
    let empty = SubTaskAtom::new("nothing to do");
    let empty_id = empty.unique_id().to_string();
    let with_empty_sub_task = harness.submit(task("empty sub-task", [empty])).await;
    let without_sub_tasks = harness.submit(TaskBean::new("no sub-tasks")).await;

    for task_id in [&with_empty_sub_task, &without_sub_tasks] {
        let finished = harness.wait_for_task_end(task_id).await;
        assert_eq!(finished.status(), Status::Complete);
        assert_percent(finished.percent_complete(), 100.0);
        assert_eq!(finished.message(), Some(messages::TASK_COMPLETED));
    }

    let empty = harness.atom(&empty_id);
    assert_eq!(empty.status(), Status::Complete);
    match empty {
        QueueAtom::SubTask(sub_task) => {
            assert!(sub_task.atom_queue.is_empty());
            assert_eq!(
                sub_task.queue_message.as_deref(),
                Some(messages::ALL_CHILDREN_COMPLETE)
            );
        }
        other => panic!("expected a sub-task, got {other:?}"),
    }
    assert!(harness.positioner.moves().is_empty());
    assert_active_queues_tidied(&harness);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_monitor_and_scan_complete_within_sub_task() {
    let harness = EngineHarness::start();
    let monitor = MonitorAtom::new("read ic1", "ic1").with_run_time(1);
    let monitor_id = monitor.unique_id().to_string();
    let scan = grid_scan().with_monitor("ic1").with_run_time(3);
    let scan_id = scan.unique_id().to_string();
    let task_id = harness
        .submit(task("measure", [sub_task("measure", [monitor.into(), scan.into()])]))
        .await;

    let finished = harness.wait_for_task_end(&task_id).await;
    assert_eq!(finished.status(), Status::Complete);

    match harness.atom(&monitor_id) {
        QueueAtom::Monitor(monitor) => {
            assert_eq!(monitor.core.status, Status::Complete);
            assert_eq!(monitor.dataset.as_deref(), Some(monitor_dataset("ic1").as_str()));
            let file = monitor.file_path.expect("monitor file recorded");
            assert!(file.starts_with(&*harness.monitor_dir.path().to_string_lossy()));
            let contents = std::fs::read_to_string(&file).unwrap();
            let document: serde_json::Value = serde_json::from_str(&contents).unwrap();
            assert_eq!(document["entry1"]["instrument"]["ic1"], json!([1.5]));
        }
        other => panic!("expected a monitor atom, got {other:?}"),
    }

    let scan = harness.atom(&scan_id);
    assert_eq!(scan.status(), Status::Complete);
    assert_eq!(scan.message(), Some(messages::SCAN_COMPLETED));
    let submitted = harness.scans.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].name(), "grid");
    assert_eq!(submitted[0].status(), Status::Submitted);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_scan_failure_fails_task() {
    let harness = EngineHarness::builder().scan_failing_at(60.0).build();
    let scan = grid_scan();
    let scan_id = scan.unique_id().to_string();
    let task_id = harness
        .submit(task("measure", [sub_task("measure", [scan.into()])]))
        .await;

    let failed = harness.wait_for_task_end(&task_id).await;
    assert_eq!(failed.status(), Status::Failed);
    assert!(failed.percent_complete() < 99.5);

    let scan = harness.atom(&scan_id);
    assert_eq!(scan.status(), Status::Failed);
    assert_eq!(scan.message(), Some(messages::SCAN_FAILED));
    assert_active_queues_tidied(&harness);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_pause_from_scanning_service_cascades_once() {
    let harness = EngineHarness::builder()
        .scan_steps(40, Duration::from_millis(25))
        .build();
    let scan = grid_scan();
    let scan_atom_id = scan.unique_id().to_string();
    let measure = sub_task("measure", [scan.into()]);
    let measure_id = measure.unique_id().to_string();
    let task_id = harness.submit(task("measure", [measure])).await;

    harness
        .wait_for_atom(&scan_atom_id, |atom| atom.percent_complete() > 10.0)
        .await;
    let scan_bean_id = harness.scans.submitted()[0].unique_id().to_string();
    harness
        .scans
        .request(&scan_bean_id, ControlRequest::Pause)
        .await
        .unwrap();

    harness
        .wait_for_task(&task_id, |t| t.status() == Status::Paused)
        .await;
    assert_eq!(harness.atom(&measure_id).status(), Status::Paused);
    assert_eq!(harness.atom(&scan_atom_id).status(), Status::Paused);
    harness
        .wait_for_task_event(&task_id, |t| t.status() == Status::Paused)
        .await;
    let pause_requests = harness
        .recorder
        .statuses(&task_id)
        .into_iter()
        .filter(|status| *status == Status::RequestPause)
        .count();
    assert_eq!(pause_requests, 1);

    harness
        .scans
        .request(&scan_bean_id, ControlRequest::Resume)
        .await
        .unwrap();
    let finished = harness.wait_for_task_end(&task_id).await;
    assert_eq!(finished.status(), Status::Complete);

    harness
        .wait_for_task_event(&task_id, |t| t.status() == Status::Complete)
        .await;
    let statuses = harness.recorder.statuses(&task_id);
    assert_eq!(
        statuses
            .iter()
            .filter(|status| **status == Status::RequestResume)
            .count(),
        1
    );
    assert!(statuses.contains(&Status::Resumed));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_client_pause_holds_remaining_atoms() {
    let harness = EngineHarness::builder()
        .move_delay(Duration::from_millis(200))
        .build();
    let moves = moves(&[(1.0, 1), (2.0, 1), (3.0, 1)]);
    let move_ids = ids(&moves);
    let align = sub_task("align", moves.into_iter().map(QueueAtom::from));
    let align_id = align.unique_id().to_string();
    let task_id = harness.submit(task("experiment", [align])).await;

    harness
        .wait_for_atom(&move_ids[0], |atom| atom.status().is_running())
        .await;
    harness.request_task(&task_id, ControlRequest::Pause).await;
    assert_eq!(harness.task(&task_id).status(), Status::Paused);
    harness
        .wait_for_atom(&align_id, |atom| atom.status() == Status::Paused)
        .await;

    // Moves cannot be paused; the running one finishes and the next waits
    harness
        .wait_for_atom(&move_ids[0], |atom| atom.status() == Status::Complete)
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.atom(&move_ids[1]).status(), Status::Submitted);

    harness.request_task(&task_id, ControlRequest::Resume).await;
    let finished = harness.wait_for_task_end(&task_id).await;
    assert_eq!(finished.status(), Status::Complete);
    assert_eq!(harness.positioner.moves().len(), 3);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_stopping_service_terminates_running_work() {
    let harness = EngineHarness::builder()
        .move_delay(Duration::from_millis(500))
        .build();
    let first_move = MoveAtom::single("slow", "x", 1.0);
    let first_move_id = first_move.unique_id().to_string();
    let task_id = harness
        .submit(task("experiment", [sub_task("align", [first_move.into()])]))
        .await;
    harness
        .wait_for_atom(&first_move_id, |atom| atom.status().is_running())
        .await;

    harness.service.stop().await;

    let task = harness.wait_for_task_end(&task_id).await;
    assert_eq!(task.status(), Status::Terminated);
    let first_move = harness
        .wait_for_atom(&first_move_id, |atom| atom.status().is_concluded())
        .await;
    assert_eq!(first_move.status(), Status::Terminated);
    assert!(harness.service.is_stopped());

    let refused = harness
        .service
        .submit_task(TaskBean::new("too late"))
        .await
        .unwrap_err();
    assert!(refused.is_stopped());

    harness.shutdown().await;
}
