// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod incremental;
pub mod logging;
pub mod serve;
pub mod tasks;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::watch as signal_watch;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, default_config_path, load_or_default};
use crate::dag::{TaskGraph, build_composition};
use crate::engine::{BuildSession, RunReport, run_build};
use crate::serve::{Origin, Proxy, Upstream};
use crate::tasks::{PipelineRunner, TaskDescriptor, TaskRunner};
use crate::types::BuildMode;
use crate::watch::{WatchCoordinator, registrations, spawn_watcher};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let explicit = args.config.is_some();
    let config_path = args.config.map(PathBuf::from).unwrap_or_else(default_config_path);

    let mut cfg = load_or_default(&config_path, explicit)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(name) = &args.profile {
        cfg = cfg.with_profile(name)?;
    }

    let root = config_root_dir(&config_path);
    let mode = BuildMode::from_env();
    let session = Arc::new(BuildSession::from_config(&root, &cfg, mode)?);
    info!(profile = %session.profile().name(), %mode, root = ?root, "assetpipe starting");

    let runner: Arc<dyn TaskRunner> = Arc::new(PipelineRunner);
    match args.command {
        Command::Build { fail_on_error } => {
            let report = run_build(runner, session).await?;
            check_build(&report, fail_on_error)
        }
        Command::Dev => dev(&cfg, runner, session).await,
        Command::Clean => clean(&session).await,
        Command::Plan => {
            print_plan(&session)?;
            Ok(())
        }
    }
}

fn check_build(report: &RunReport, fail_on_error: bool) -> Result<()> {
    if report.is_fatal() {
        bail!("build aborted by a fatal error (skipped: {:?})", report.skipped());
    }
    let failed = report.failed();
    if !failed.is_empty() {
        if fail_on_error {
            bail!("tasks failed: {failed:?}");
        }
        warn!(?failed, "build finished with failed tasks");
    }
    Ok(())
}

/// `series(build, parallel(watch, serve))` until Ctrl-C.
async fn dev(cfg: &ConfigFile, runner: Arc<dyn TaskRunner>, session: Arc<BuildSession>) -> Result<()> {
    let report = run_build(runner.clone(), session.clone()).await?;
    check_build(&report, false)?;

    let origin = match &cfg.serve().proxy {
        Some(target) => Origin::Proxy(Proxy::new(Upstream::parse(target)?)),
        None => Origin::Static(session.output_dir(types::AssetKind::Html)),
    };

    let source_root = session.root().join(&session.layout().source_dir);
    let (_watcher, changes) = spawn_watcher(session.root(), &source_root)?;
    let coordinator = WatchCoordinator::new(session.clone(), runner, registrations(session.layout())?);

    let (stop_tx, stop_rx) = signal_watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received; shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
        let _ = stop_tx.send(true);
    });

    let stopped = |mut rx: signal_watch::Receiver<bool>| async move {
        let _ = rx.wait_for(|stop| *stop).await;
    };

    let serve_cfg = cfg.serve().clone();
    let (_, served) = tokio::join!(
        coordinator.run(changes, stopped(stop_rx.clone())),
        serve::serve(
            &serve_cfg.host,
            serve_cfg.port,
            session.reload().clone(),
            origin,
            stopped(stop_rx),
        ),
    );
    served?;
    Ok(())
}

async fn clean(session: &BuildSession) -> Result<()> {
    let out = session.output_root();
    if out == session.root() || session.root().starts_with(&out) {
        bail!("refusing to remove {}: it contains the project", out.display());
    }
    match tokio::fs::remove_dir_all(&out).await {
        Ok(()) => info!(path = ?out, "removed output root"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => debug!(path = ?out, "nothing to clean"),
        Err(e) => return Err(e).with_context(|| format!("removing {}", out.display())),
    }
    Ok(())
}

/// Print what `build` and `dev` would do, without running anything.
fn print_plan(session: &BuildSession) -> Result<()> {
    let profile = session.profile();
    println!("assetpipe plan");
    println!("  profile: {}", profile.name());
    println!("  mode: {}", session.mode());
    println!("  root: {}", session.root().display());
    for kind in types::AssetKind::ALL {
        println!("    {:<5} -> {}", kind.as_str(), profile.dir(kind).display());
    }
    println!();

    println!("tasks:");
    for d in TaskDescriptor::all(session.layout()) {
        println!("  - {}", d.id);
        println!("      inputs: {:?}", d.inputs);
        println!("      chain: {}", d.chain.join(" -> "));
        if let Some(kind) = d.output {
            println!("      output: {}", kind.as_str());
        }
        println!("      policy: {:?}", d.policy);
    }
    println!();

    let graph = TaskGraph::from_composition(&build_composition())?;
    println!("build order:");
    for task in graph.order() {
        let deps = graph.dependencies_of(*task);
        if deps.is_empty() {
            println!("  - {task}");
        } else {
            println!("  - {task} (after {} tasks)", deps.len());
        }
    }
    println!();

    println!("watch:");
    for reg in registrations(session.layout())? {
        println!("  - {} <- {:?}", reg.task, reg.patterns);
        if let Some(rule) = &reg.on_delete {
            println!("      on delete: {rule:?}");
        }
    }
    Ok(())
}

/// Project directory: the config file's parent, else the working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    let dir = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::path::absolute(&dir).unwrap_or(dir)
}
