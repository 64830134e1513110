use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use coursewatch::{
    cli::{Cli, Command},
    config::CoursewatchConfig,
    core::{start_ticker, AppEvent, InboxWatcher, Snapshot},
    export::{CourseReport, ReportExporter, ReportFormatter},
    ChangeDetector, CheckOutcome, CourseMonitor, JsonFileStore, ScanStats, SnapshotStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(err) = cli.validate() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }

    cli.setup_logging();

    let config = cli.load_config()?;
    if let Err(err) = config.validate() {
        eprintln!("Invalid configuration: {}", err);
        std::process::exit(1);
    }

    match &cli.command {
        Command::Diff { old, new, initial, no_filter } => {
            run_diff(&cli, &config, old, new, *initial, *no_filter)?
        }
        Command::Check { snapshots, .. } => run_check(&cli, &config, snapshots)?,
        Command::Watch { consume, .. } => run_watch(&cli, &config, *consume)?,
        Command::History { course_id, .. } => run_history(&config, course_id)?,
        Command::Stats { reset, .. } => run_stats(&config, *reset)?,
    }

    Ok(())
}

fn exporter(cli: &Cli, config: &CoursewatchConfig) -> ReportExporter {
    ReportExporter::new(ReportFormatter::new(config.notify.clone()), cli.output)
}

fn monitor(config: &CoursewatchConfig) -> CourseMonitor<JsonFileStore> {
    CourseMonitor::new(
        JsonFileStore::new(&config.store.root),
        ChangeDetector::new(config.detector.clone()),
    )
    .with_courses(config.courses.clone())
}

fn print_outcome(exporter: &ReportExporter, outcome: &CheckOutcome) -> Result<()> {
    if !outcome.has_changes() {
        return Ok(());
    }
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    exporter.export_to_writer(&CourseReport::from(outcome), &mut handle)?;
    handle.flush()?;
    Ok(())
}

fn run_diff(
    cli: &Cli,
    config: &CoursewatchConfig,
    old: &Path,
    new: &Path,
    initial: bool,
    no_filter: bool,
) -> Result<()> {
    let old_snapshot = Snapshot::from_path(old)?;
    let new_snapshot = Snapshot::from_path(new)?;
    let detector = ChangeDetector::new(config.detector.clone());
    let now = chrono::Utc::now();

    let changes = if no_filter && !initial {
        detector.raw_changes(&old_snapshot, &new_snapshot, now)
    } else {
        detector.detect_changes_at(Some(&old_snapshot), &new_snapshot, initial, now)
    };
    tracing::info!(changes = changes.len(), "Diff complete");

    let report = CourseReport {
        course_id: &new_snapshot.course_id,
        course_name: config.courses.name(&new_snapshot.course_id),
        course_url: match config.courses.url(&new_snapshot.course_id) {
            Some(url) if new_snapshot.url.is_empty() => url,
            _ => new_snapshot.url.as_str(),
        },
        changes: &changes,
        detected_at: now,
    };
    exporter(cli, config).export_to_writer(&report, &mut std::io::stdout())?;
    Ok(())
}

fn run_check(cli: &Cli, config: &CoursewatchConfig, snapshots: &[PathBuf]) -> Result<()> {
    let monitor = monitor(config);
    let exporter = exporter(cli, config);
    let mut failures = 0;

    for path in snapshots {
        // One broken course must not stop the others
        match monitor.check_file(path) {
            Ok(outcome) => print_outcome(&exporter, &outcome)?,
            Err(err) => {
                failures += 1;
                tracing::error!(path = %path.display(), "Check failed: {:#}", err);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} snapshot checks failed", failures, snapshots.len());
    }
    Ok(())
}

fn run_watch(cli: &Cli, config: &CoursewatchConfig, consume: bool) -> Result<()> {
    let monitor = monitor(config);
    let exporter = exporter(cli, config);
    let watcher = InboxWatcher::new(&config.watch.inbox, config.watch.event_debounce_duration())?;

    tracing::info!(
        inbox = %watcher.inbox().display(),
        store = %config.store.root.display(),
        "Watching for course snapshots"
    );
    eprintln!("Press Ctrl+C to quit");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    let quit_tx = watcher.sender();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        let _ = quit_tx.send(AppEvent::Quit);
    })?;

    start_ticker(watcher.sender(), config.watch.poll_interval_duration());

    // Snapshots whose check failed are retried on the next tick
    let mut failed: BTreeSet<PathBuf> = BTreeSet::new();

    let process = |path: &Path, failed: &mut BTreeSet<PathBuf>| {
        if !path.exists() {
            failed.remove(path);
            return;
        }
        match monitor.check_file(path) {
            Ok(outcome) => {
                failed.remove(path);
                if let Err(err) = print_outcome(&exporter, &outcome) {
                    tracing::error!("Failed to print report: {:#}", err);
                }
                if consume {
                    if let Err(err) = std::fs::remove_file(path) {
                        tracing::warn!(path = %path.display(), "Failed to remove checked snapshot: {}", err);
                    }
                }
            }
            Err(err) => {
                tracing::error!(path = %path.display(), "Check failed, will retry: {:#}", err);
                failed.insert(path.to_path_buf());
            }
        }
    };

    for path in watcher.pending_snapshots()? {
        process(path.as_path(), &mut failed);
    }

    while running.load(Ordering::SeqCst) {
        match watcher.recv_timeout(Duration::from_millis(500)) {
            Ok(AppEvent::SnapshotReady(file)) => process(file.path.as_path(), &mut failed),
            Ok(AppEvent::Tick) => {
                let mut due: BTreeSet<PathBuf> = failed.clone();
                // Sweep catches files whose events were missed
                if consume {
                    due.extend(watcher.pending_snapshots()?);
                }
                for path in due {
                    process(path.as_path(), &mut failed);
                }
            }
            Ok(AppEvent::Quit) => break,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::info!("Stopped watching");
    Ok(())
}

fn run_history(config: &CoursewatchConfig, course_id: &str) -> Result<()> {
    let store = JsonFileStore::new(&config.store.root);
    let history = store.change_history(course_id)?;

    if history.is_empty() {
        println!("No recorded changes for course {}", course_id);
        return Ok(());
    }

    for entry in history {
        println!(
            "{}  {} change(s)",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.changes.len()
        );
        for change in entry.changes.iter().filter(|c| !c.kind.is_inventory()) {
            println!("  {} {}", ReportFormatter::code(&change.kind), change.message);
        }
    }
    Ok(())
}

fn run_stats(config: &CoursewatchConfig, reset: bool) -> Result<()> {
    let store = JsonFileStore::new(&config.store.root);
    let now = chrono::Utc::now();

    if reset {
        store.save_stats(&ScanStats::new(now))?;
        tracing::info!(store = %config.store.root.display(), "Scan statistics reset");
    }

    println!("{}", store.load_stats()?.report(now));
    Ok(())
}
