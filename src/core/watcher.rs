use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use super::events::{AppEvent, SnapshotFile};

/// Watches the directory the scraper drops snapshot files into
pub struct InboxWatcher {
    _watcher: RecommendedWatcher,
    event_rx: Receiver<AppEvent>,
    event_tx: Sender<AppEvent>,
    inbox: PathBuf,
}

impl InboxWatcher {
    pub fn new<P: AsRef<Path>>(inbox: P, debounce: Duration) -> Result<Self> {
        let inbox = inbox.as_ref().to_path_buf();
        std::fs::create_dir_all(&inbox)
            .with_context(|| format!("Failed to create inbox directory {}", inbox.display()))?;

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let (event_tx, event_rx) = mpsc::channel::<AppEvent>();

        let mut watcher = notify::recommended_watcher(tx)
            .context("Failed to create file system watcher")?;

        watcher
            .watch(&inbox, RecursiveMode::NonRecursive)
            .context("Failed to start watching inbox")?;

        let forward_tx = event_tx.clone();
        thread::spawn(move || {
            let mut debouncer = Debouncer::new(debounce);
            let tick = (debounce / 4).clamp(Duration::from_millis(5), Duration::from_millis(100));

            loop {
                match rx.recv_timeout(tick) {
                    Ok(Ok(event)) => {
                        if !matches!(
                            event.kind,
                            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
                        ) {
                            continue;
                        }
                        let now = Instant::now();
                        for path in event.paths {
                            if SnapshotFile::is_snapshot_path(&path) {
                                debouncer.record(path, now);
                            }
                        }
                    }
                    Ok(Err(err)) => tracing::error!("Inbox watcher error: {}", err),
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }

                for path in debouncer.due(Instant::now()) {
                    tracing::debug!(path = %path.display(), "Snapshot file settled");
                    if forward_tx
                        .send(AppEvent::SnapshotReady(SnapshotFile::new(path)))
                        .is_err()
                    {
                        return; // Receiver dropped, exit thread
                    }
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            event_rx,
            event_tx,
            inbox,
        })
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    /// Sender for injecting `Tick`/`Quit` into the event stream
    pub fn sender(&self) -> Sender<AppEvent> {
        self.event_tx.clone()
    }

    pub fn try_recv(&self) -> Result<AppEvent, mpsc::TryRecvError> {
        self.event_rx.try_recv()
    }

    pub fn recv(&self) -> Result<AppEvent, mpsc::RecvError> {
        self.event_rx.recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, mpsc::RecvTimeoutError> {
        self.event_rx.recv_timeout(timeout)
    }

    /// Snapshot files already waiting in the inbox, oldest name first
    pub fn pending_snapshots(&self) -> Result<Vec<PathBuf>> {
        pending_snapshots(&self.inbox)
    }
}

/// Trailing-edge debounce: a path is due once no event touched it for
/// `quiet`, so a file being written is only reported after its last write.
#[derive(Debug)]
pub struct Debouncer {
    pending: HashMap<PathBuf, Instant>,
    quiet: Duration,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            quiet,
        }
    }

    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Paths quiet for at least `quiet`, removed from the pending set
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let quiet = self.quiet;
        let mut ready: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(**last) >= quiet)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

pub fn pending_snapshots<P: AsRef<Path>>(inbox: P) -> Result<Vec<PathBuf>> {
    let inbox = inbox.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(inbox)
        .with_context(|| format!("Failed to list inbox {}", inbox.display()))?
    {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() && SnapshotFile::is_snapshot_path(&path) {
                    files.push(path);
                }
            }
            Err(err) => {
                tracing::warn!("Error reading inbox entry: {}", err);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Send `Tick` every `interval` until the receiver goes away
pub fn start_ticker(sender: Sender<AppEvent>, interval: Duration) {
    thread::spawn(move || loop {
        thread::sleep(interval);
        if sender.send(AppEvent::Tick).is_err() {
            break;
        }
    });
}
