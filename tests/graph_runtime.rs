use std::sync::Arc;
use std::time::Duration;

use assetpipe::dag::scheduler::RunState;
use assetpipe::engine::{run_build, run_series};
use assetpipe::tasks::{TaskOutcome, TaskRunner};
use assetpipe::types::{BuildMode, TaskId};
use assetpipe_test_utils::builders::ProjectFixture;
use assetpipe_test_utils::fake_runner::{FakeRunner, Scripted};
use assetpipe_test_utils::{init_tracing, with_timeout};

#[tokio::test]
async fn build_runs_svg_after_the_fan_out() {
    init_tracing();
    let fixture = ProjectFixture::new();
    let runner = Arc::new(FakeRunner::new().with(TaskId::Css, Scripted::Slow(Duration::from_millis(30))));

    let report = with_timeout(run_build(runner.clone(), fixture.session(BuildMode::Development)))
        .await
        .unwrap();

    assert!(report.is_success());
    let started = runner.started();
    assert_eq!(started.len(), 10);
    assert_eq!(started.last(), Some(&TaskId::Svg));
    assert!(!started.contains(&TaskId::HtmlTemplates));

    // css was still sleeping while the others finished.
    let finished = runner.finished();
    let css = finished.iter().position(|t| *t == TaskId::Css).unwrap();
    assert_eq!(css, finished.len() - 2);
}

#[tokio::test]
async fn isolated_failure_still_runs_svg() {
    init_tracing();
    let fixture = ProjectFixture::new();
    let runner = Arc::new(FakeRunner::new().with(TaskId::Img, Scripted::Fail));

    let report = with_timeout(run_build(runner.clone(), fixture.session(BuildMode::Development)))
        .await
        .unwrap();

    assert!(!report.is_fatal());
    assert_eq!(report.failed(), vec![TaskId::Img]);
    assert_eq!(report.outcome(TaskId::Svg), Some(TaskOutcome::Success));
}

#[tokio::test]
async fn fatal_error_drains_running_tasks_and_skips_the_rest() {
    init_tracing();
    let fixture = ProjectFixture::new();
    let runner = Arc::new(
        FakeRunner::new()
            .with(TaskId::Css, Scripted::Fatal)
            .with(TaskId::Fonts, Scripted::Slow(Duration::from_millis(50))),
    );

    let report = with_timeout(run_build(runner.clone(), fixture.session(BuildMode::Development)))
        .await
        .unwrap();

    assert!(report.is_fatal());
    assert_eq!(report.skipped(), vec![TaskId::Svg]);
    // The slow sibling was not cancelled.
    assert_eq!(report.outcome(TaskId::Fonts), Some(TaskOutcome::Success));
    assert!(runner.finished().contains(&TaskId::Fonts));
    assert_eq!(report.states[&TaskId::Svg], RunState::Skipped);
}

#[tokio::test]
async fn panicking_task_counts_as_failed() {
    init_tracing();
    let fixture = ProjectFixture::new();
    let runner = Arc::new(FakeRunner::new().with(TaskId::Js, Scripted::Panic));

    let report = with_timeout(run_build(runner, fixture.session(BuildMode::Development)))
        .await
        .unwrap();

    assert_eq!(report.outcome(TaskId::Js), Some(TaskOutcome::Failed));
    assert_eq!(report.outcome(TaskId::Svg), Some(TaskOutcome::Success));
}

#[tokio::test]
async fn series_waits_for_each_task() {
    init_tracing();
    let fixture = ProjectFixture::new();
    let fake = Arc::new(FakeRunner::new().with(TaskId::SvgIcons, Scripted::Slow(Duration::from_millis(20))));
    let runner: Arc<dyn TaskRunner> = fake.clone();

    let outcomes = run_series(
        &[TaskId::SvgIcons, TaskId::Svg, TaskId::Html],
        &runner,
        &fixture.session(BuildMode::Development),
    )
    .await;

    assert!(outcomes.iter().all(|(_, o)| *o == TaskOutcome::Success));
    assert_eq!(fake.finished(), vec![TaskId::SvgIcons, TaskId::Svg, TaskId::Html]);
    assert_eq!(fake.started(), fake.finished());
}
