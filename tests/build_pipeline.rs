use std::sync::Arc;

use assetpipe::config::ConfigFile;
use assetpipe::engine::run_build;
use assetpipe::tasks::{PipelineRunner, TaskOutcome, TaskRunner};
use assetpipe::types::{BuildMode, TaskId};
use assetpipe_test_utils::builders::ProjectFixture;
use assetpipe_test_utils::{init_tracing, with_timeout};

fn runner() -> Arc<dyn TaskRunner> {
    Arc::new(PipelineRunner)
}

#[tokio::test]
async fn build_without_optional_sources_succeeds() {
    init_tracing();
    let fixture = ProjectFixture::new()
        .with_file("src/css/style.css", "body { color: red; }\n")
        .with_file("src/js/main.js", "console.log('ok');\n");

    let report = with_timeout(run_build(runner(), fixture.session(BuildMode::Production)))
        .await
        .unwrap();

    assert!(report.is_success(), "{report:?}");
    assert!(fixture.exists("build/css/style.css"));
    assert!(fixture.exists("build/js/main.js"));
    assert!(!fixture.exists("build/libs"));
}

#[tokio::test]
async fn missing_stylesheet_entry_is_fatal() {
    init_tracing();
    let fixture = ProjectFixture::new().with_file("src/js/main.js", "console.log('ok');\n");

    let report = with_timeout(run_build(runner(), fixture.session(BuildMode::Production)))
        .await
        .unwrap();

    assert!(report.is_fatal());
    assert_eq!(report.outcome(TaskId::Css), Some(TaskOutcome::Fatal));
}

#[tokio::test]
async fn sample_site_builds_every_output() {
    init_tracing();
    let fixture = ProjectFixture::sample_site();

    let report = with_timeout(run_build(runner(), fixture.session(BuildMode::Production)))
        .await
        .unwrap();
    assert!(report.is_success(), "{report:?}");

    assert!(fixture.read("build/index.html").contains("<header>Home</header>"));
    assert!(fixture.read("build/about.html").contains("<header>About</header>"));
    assert!(!fixture.exists("build/templates/header.html"));
    assert!(fixture.exists("build/img/logo.png"));
    assert!(fixture.exists("build/images/photos/team.png"));
    assert!(fixture.exists("build/img/svg/arrow.svg"));
    assert!(fixture.exists("build/fonts/roboto/roboto.woff2"));
    assert!(fixture.exists("build/favicon.ico"));

    // The sprite lands in the source tree and `svg` copies it afterwards.
    let sprite = fixture.read("src/img/svg/svg-symbols.svg");
    assert!(sprite.contains(r#"<symbol id="cart" viewBox="0 0 24 24">"#));
    assert!(!sprite.contains("<title>"));
    assert_eq!(fixture.read("build/img/svg/svg-symbols.svg"), sprite);

    // Production images have their metadata stripped.
    let png = std::fs::read(fixture.path("build/img/logo.png")).unwrap();
    assert!(!png.windows(4).any(|w| w == b"tEXt"));
}

#[tokio::test]
async fn stylesheet_partials_are_inlined_prefixed_and_packed() {
    init_tracing();
    let fixture = ProjectFixture::sample_site();
    let session = fixture.session(BuildMode::Production);

    PipelineRunner.run(TaskId::Css, &session).await.unwrap();
    let css = fixture.read("build/css/style.css");

    assert!(!css.contains("@import"));
    assert!(css.contains("-webkit-backdrop-filter"));
    assert_eq!(css.matches("@media").count(), 2, "{css}");
    let small = css.find("480px").unwrap();
    let large = css.find("768px").unwrap();
    assert!(small < large, "mobile-first order: {css}");
    assert!(css.find(".row{").is_some_and(|plain| plain < small), "plain rules first: {css}");
    assert!(!fixture.exists("build/css/style.css.map"));
}

#[tokio::test]
async fn html_rerun_without_changes_writes_nothing() {
    init_tracing();
    let fixture = ProjectFixture::sample_site();
    let session = fixture.session(BuildMode::Development);

    let first = PipelineRunner.run(TaskId::Html, &session).await.unwrap();
    assert_eq!(first.written.len(), 2);

    let second = PipelineRunner.run(TaskId::Html, &session).await.unwrap();
    assert!(second.written.is_empty());
    assert_eq!(second.skipped, 2);

    // html:templates ignores the last-run filter.
    let templates = PipelineRunner.run(TaskId::HtmlTemplates, &session).await.unwrap();
    assert_eq!(templates.written.len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn switching_to_production_replaces_links_and_drops_maps() {
    init_tracing();
    let fixture = ProjectFixture::sample_site();

    let dev = with_timeout(run_build(runner(), fixture.session(BuildMode::Development)))
        .await
        .unwrap();
    assert!(dev.is_success(), "{dev:?}");
    assert!(fixture.is_symlink("build/img/logo.png"));
    assert!(fixture.is_symlink("build/fonts/roboto/roboto.woff2"));
    assert!(fixture.exists("build/css/style.css.map"));
    assert!(fixture.read("build/css/style.css").contains("sourceMappingURL=style.css.map"));
    assert!(fixture.read("build/js/main.js").contains("sourceURL="));

    let prod = with_timeout(run_build(runner(), fixture.session(BuildMode::Production)))
        .await
        .unwrap();
    assert!(prod.is_success(), "{prod:?}");
    assert!(!fixture.is_symlink("build/img/logo.png"));
    assert!(fixture.exists("build/img/logo.png"));
    assert!(!fixture.is_symlink("build/fonts/roboto/roboto.woff2"));
    assert!(!fixture.exists("build/css/style.css.map"));
    assert!(!fixture.exists("build/js/main.js.map"));
    assert!(!fixture.read("build/js/main.js").contains("sourceURL="));
}

#[tokio::test]
async fn profiles_change_output_locations() {
    init_tracing();
    let fixture = ProjectFixture::sample_site();
    let cfg = ConfigFile::default().with_profile("modx").unwrap();

    let report = with_timeout(run_build(runner(), fixture.session_with(cfg, BuildMode::Production)))
        .await
        .unwrap();
    assert!(report.is_success(), "{report:?}");
    assert!(fixture.exists("build/assets/css/style.css"));
    assert!(fixture.exists("build/assets/img/logo.png"));
    assert!(fixture.exists("build/index.html"));
}
