// tests/supervised_task.rs

mod common;

use std::time::Duration;

use hdlflow::errors::HdlflowError;
use hdlflow::exec::{SupervisedTask, TaskState};
use hdlflow::store::{FileTaskStore, TaskStatus};
use hdlflow_test_utils::with_timeout;
use tempfile::TempDir;

fn setup() -> (TempDir, FileTaskStore) {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();
    (dir, store)
}

#[tokio::test]
async fn clean_job_completes_with_no_errors() {
    let (dir, store) = setup();
    let task =
        SupervisedTask::create(&store, dir.path(), "clean job", "echo 'all good'").unwrap();

    let state = with_timeout(task.run_and_wait(None)).await.unwrap();

    assert_eq!(state, TaskState::Completed);
    assert!(task.get_errors().unwrap().is_empty());

    let record = store.find_by_id(task.id()).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.started_at.is_some());
    assert!(record.finished_at.is_some());
}

#[tokio::test]
async fn invalid_command_fails_without_hanging() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(
        &store,
        dir.path(),
        "bad job",
        "totally-invalid-command-we-should-get-an-error",
    )
    .unwrap();

    assert_eq!(store.count().unwrap(), 1);
    let record = store.find_by_id(task.id()).unwrap();
    assert_eq!(record.parent_directory, dir.path());

    let state = with_timeout(task.run_and_wait(None)).await.unwrap();

    assert_eq!(state, TaskState::Failed);
    // sh reports the missing command on stderr without a recognized marker;
    // the nonzero exit must still surface as at least one error.
    let errors = task.get_errors().unwrap();
    assert!(!errors.is_empty());

    let record = store.find_by_id(task.id()).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(!record.errors.is_empty());
}

#[tokio::test]
async fn marker_in_output_means_failed_and_reported() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(
        &store,
        dir.path(),
        "job with tool error",
        "echo 'ERROR: something broke'; exit 0",
    )
    .unwrap();

    let state = with_timeout(task.run_and_wait(None)).await.unwrap();

    // Exit code was zero, but the output carries a recognized marker.
    assert_eq!(state, TaskState::Failed);
    let errors = task.get_errors().unwrap();
    assert_eq!(errors, vec!["ERROR: something broke".to_string()]);
}

#[tokio::test]
async fn errors_before_any_output_are_synthetic() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(&store, dir.path(), "never run", "echo hi").unwrap();

    // No process ran, no logs exist: one synthetic error, never "no errors".
    let errors = task.get_errors().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no output artifacts"));
}

#[tokio::test]
async fn run_that_cannot_capture_output_fails_terminally() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(&store, dir.path(), "doomed job", "echo hi").unwrap();

    // Pull the working directory out from under the task before it runs.
    std::fs::remove_dir_all(task.directory()).unwrap();

    assert!(task.run().await.is_err());

    // The task must not stay Running with no supervisor behind it.
    assert_eq!(task.state(), TaskState::Failed);
    let state = with_timeout(task.wait(None)).await.unwrap();
    assert_eq!(state, TaskState::Failed);

    let record = store.find_by_id(task.id()).unwrap();
    assert_eq!(record.status, TaskStatus::Failed);
    assert!(!record.errors.is_empty());
}

#[tokio::test]
async fn run_twice_is_a_supervision_error() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(&store, dir.path(), "job", "sleep 2").unwrap();

    task.run().await.unwrap();
    match task.run().await {
        Err(HdlflowError::Supervision(msg)) => assert!(msg.contains("twice")),
        other => panic!("expected Supervision error, got {:?}", other.is_ok()),
    }

    task.kill().unwrap();
    with_timeout(task.wait(None)).await.unwrap();
}

#[tokio::test]
async fn timeout_kills_the_process() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(&store, dir.path(), "slow job", "sleep 30").unwrap();

    let state = with_timeout(task.run_and_wait(Some(Duration::from_millis(300))))
        .await
        .unwrap();

    assert_eq!(state, TaskState::Killed);
    let record = store.find_by_id(task.id()).unwrap();
    assert_eq!(record.status, TaskStatus::Killed);
}

#[tokio::test]
async fn wait_without_deadline_blocks_until_exit() {
    let (dir, store) = setup();
    let task =
        SupervisedTask::create(&store, dir.path(), "short job", "sleep 0.2; echo done")
            .unwrap();

    task.run().await.unwrap();
    let state = with_timeout(task.wait(None)).await.unwrap();
    assert_eq!(state, TaskState::Completed);
}

#[tokio::test]
async fn wait_with_passed_deadline_returns_current_state() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(&store, dir.path(), "slow job", "sleep 30").unwrap();

    task.run().await.unwrap();
    let state = task.wait(Some(Duration::from_millis(250))).await.unwrap();
    assert_eq!(state, TaskState::Running);

    task.kill().unwrap();
    let state = with_timeout(task.wait(None)).await.unwrap();
    assert_eq!(state, TaskState::Killed);
}

#[tokio::test]
async fn messages_reflect_captured_stdout() {
    let (dir, store) = setup();
    let task = SupervisedTask::create(
        &store,
        dir.path(),
        "chatty job",
        "echo one; echo two",
    )
    .unwrap();

    with_timeout(task.run_and_wait(None)).await.unwrap();

    let messages = task.messages().unwrap();
    assert_eq!(messages, vec!["one".to_string(), "two".to_string()]);
    // Side effect only; must not disturb the terminal state.
    task.log_messages(&messages);
    assert_eq!(task.state(), TaskState::Completed);
}
