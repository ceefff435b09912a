// tests/project_lifecycle.rs

mod common;

use std::fs;
use std::sync::Arc;

use hdlflow::errors::HdlflowError;
use hdlflow::project::{PROJECT_MARKER, Project, ProjectOptions};
use hdlflow_test_utils::builders::{FakeToolchain, registry_with, write_deps};
use hdlflow_test_utils::with_timeout;
use tempfile::TempDir;

fn options(part: &str, board: &str) -> ProjectOptions {
    ProjectOptions {
        part: Some(part.to_string()),
        board: Some(board.to_string()),
        overwrite_ok: false,
    }
}

/// Open a project and wait for its creation job so the marker exists.
async fn open_and_settle(
    dir: &std::path::Path,
    toolchain: Arc<FakeToolchain>,
    opts: ProjectOptions,
) -> Project {
    let project = Project::open(dir, toolchain, opts).await.unwrap();
    if let Some(task) = project.creation_task() {
        with_timeout(task.wait(None)).await.unwrap();
        assert!(task.get_errors().unwrap().is_empty());
    }
    project
}

#[tokio::test]
async fn fresh_create_writes_params_fingerprint_and_marker() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    let project = open_and_settle(&dir, toolchain, options("pt1", "bd1")).await;

    assert!(project.marker_path().exists());
    assert!(dir.join("params.toml").exists());
    assert!(dir.join("fingerprint").exists());
    assert_eq!(project.params().part.as_deref(), Some("pt1"));
    assert_eq!(project.task_store().count().unwrap(), 1);
}

#[tokio::test]
async fn second_open_of_unchanged_project_submits_nothing() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    let first = open_and_settle(&dir, toolchain.clone(), options("pt1", "bd1")).await;
    let tasks_after_first = first.task_store().count().unwrap();

    let second = Project::open(&dir, toolchain, options("pt1", "bd1"))
        .await
        .unwrap();

    assert!(second.creation_task().is_none());
    assert_eq!(second.task_store().count().unwrap(), tasks_after_first);
}

#[tokio::test]
async fn parameter_conflict_without_override_fails() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    open_and_settle(&dir, toolchain.clone(), options("pt1", "bd1")).await;

    match Project::open(&dir, toolchain, options("pt2", "bd1")).await {
        Err(HdlflowError::ConfigConflict(msg)) => {
            assert!(msg.contains("pt1"));
            assert!(msg.contains("pt2"));
        }
        Err(e) => panic!("expected ConfigConflict, got: {:?}", e),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[tokio::test]
async fn parameter_conflict_with_override_rebuilds_with_new_params() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    open_and_settle(&dir, toolchain.clone(), options("pt1", "bd1")).await;

    let mut opts = options("pt2", "bd2");
    opts.overwrite_ok = true;
    let project = open_and_settle(&dir, toolchain, opts).await;

    assert_eq!(project.params().part.as_deref(), Some("pt2"));
    assert_eq!(project.params().board.as_deref(), Some("bd2"));
    assert!(project.creation_task().is_some());
}

#[tokio::test]
async fn changed_dependencies_without_override_fail_stale() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps.clone()));
    let dir = tmp.path().join("project");

    open_and_settle(&dir, toolchain.clone(), options("pt1", "bd1")).await;

    fs::write(&deps[0], "entity top -- edited").unwrap();

    match Project::open(&dir, toolchain, options("pt1", "bd1")).await {
        Err(HdlflowError::StaleProject(_)) => {}
        Err(e) => panic!("expected StaleProject, got: {:?}", e),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[tokio::test]
async fn stale_rebuild_removes_prior_artifacts() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps.clone()));
    let dir = tmp.path().join("project");

    open_and_settle(&dir, toolchain.clone(), options("pt1", "bd1")).await;

    // Artifact from the stale generation.
    let leftover = dir.join("stale_artifact.txt");
    fs::write(&leftover, "old build output").unwrap();

    fs::write(&deps[0], "entity top -- edited").unwrap();

    let mut opts = options("pt1", "bd1");
    opts.overwrite_ok = true;
    let project = open_and_settle(&dir, toolchain, opts).await;

    assert!(!leftover.exists());
    assert!(project.marker_path().exists());
    // The regenerated history starts with exactly the new creation job.
    assert_eq!(project.task_store().count().unwrap(), 1);
}

#[tokio::test]
async fn existing_directory_without_marker_is_corrupt() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    fs::create_dir_all(&dir).unwrap();

    match Project::open(&dir, toolchain, options("pt1", "bd1")).await {
        Err(HdlflowError::CorruptProject(msg)) => {
            assert!(msg.contains(PROJECT_MARKER));
        }
        Err(e) => panic!("expected CorruptProject, got: {:?}", e),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[tokio::test]
async fn reopen_through_registry_uses_persisted_factory_name() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let fake = FakeToolchain::new(deps).with_factory_name("fake_bench");
    let dir = tmp.path().join("project");

    open_and_settle(&dir, Arc::new(fake.clone()), options("pt1", "bd1")).await;

    let registry = registry_with(fake);
    let project = Project::open_registered(&dir, &registry, ProjectOptions::default())
        .await
        .unwrap();

    assert!(project.creation_task().is_none());
    assert_eq!(project.params().part.as_deref(), Some("pt1"));
}

#[tokio::test]
async fn unknown_factory_name_is_a_hard_error() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let fake = FakeToolchain::new(deps).with_factory_name("registered_elsewhere");
    let dir = tmp.path().join("project");

    open_and_settle(&dir, Arc::new(fake), options("pt1", "bd1")).await;

    // A registry that never heard of the persisted factory name.
    let registry = registry_with(FakeToolchain::new(Vec::new()));

    match Project::open_registered(&dir, &registry, ProjectOptions::default()).await {
        Err(HdlflowError::UnknownToolchain(msg)) => {
            assert!(msg.contains("registered_elsewhere"));
        }
        Err(e) => panic!("expected UnknownToolchain, got: {:?}", e),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[tokio::test]
async fn operations_run_against_the_project_store() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    let project = open_and_settle(&dir, toolchain, options("pt1", "bd1")).await;

    let synth = project.synthesize(false).await.unwrap();
    with_timeout(synth.wait(None)).await.unwrap();
    assert!(synth.get_errors().unwrap().is_empty());

    let impl_task = project.implement().await.unwrap();
    with_timeout(impl_task.wait(None)).await.unwrap();

    let reports = project.generate_reports(true).await.unwrap();
    with_timeout(reports.wait(None)).await.unwrap();

    // creation + synthesize + implement + reports
    assert_eq!(project.task_store().count().unwrap(), 4);
}

#[tokio::test]
async fn simulation_returns_errors_and_output_path() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(FakeToolchain::new(deps));
    let dir = tmp.path().join("project");

    let project = open_and_settle(&dir, toolchain, options("pt1", "bd1")).await;

    let (errors, output) = with_timeout(project.run_simulation(
        "smoke",
        "100ns",
        hdlflow::project::SimType::Hdl,
        None,
    ))
    .await
    .unwrap();

    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    assert!(output.ends_with("smoke/hdl_output.data"));
    assert!(output.exists());
}

#[tokio::test]
async fn simulation_without_output_file_reports_it() {
    common::init_tracing();
    let tmp = TempDir::new().unwrap();
    let deps = write_deps(tmp.path(), &[("top.vhd", "entity top")]);
    let toolchain = Arc::new(
        FakeToolchain::new(deps).with_simulation_command("echo 'no output written'"),
    );
    let dir = tmp.path().join("project");

    let project = open_and_settle(&dir, toolchain, options("pt1", "bd1")).await;

    let (errors, output) = with_timeout(project.run_simulation(
        "smoke",
        "100ns",
        hdlflow::project::SimType::Hdl,
        None,
    ))
    .await
    .unwrap();

    assert!(!errors.is_empty());
    assert!(!output.exists());
}
