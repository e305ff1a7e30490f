use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use notify::{EventKind, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::Result;

/// Emitted when a modification passes the debounce gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Reindex { trigger: PathBuf },
}

/// Accepts an event only if more than `window` has elapsed since the last
/// accepted one. The first event is always accepted.
#[derive(Debug, Clone)]
pub struct DebounceGate {
    window: Duration,
    last_fired: Option<Instant>,
}

impl DebounceGate {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event at `now` and report whether it should trigger.
    pub fn should_fire(&mut self, now: Instant) -> bool {
        let fire = self
            .last_fired
            .is_none_or(|last| now.saturating_duration_since(last) > self.window);
        if fire {
            self.last_fired = Some(now);
        }
        fire
    }
}

#[derive(Debug, Default)]
struct WatchCounters {
    events: AtomicU64,
    triggered: AtomicU64,
    suppressed: AtomicU64,
}

/// Counters since the watcher started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WatchStats {
    pub events: u64,
    pub triggered: u64,
    pub suppressed: u64,
}

/// Recursive watch over a source tree that forwards debounced
/// [`WatchEvent`]s to a channel.
pub struct IndexWatcher {
    root: PathBuf,
    watcher: notify::RecommendedWatcher,
    handle: tokio::task::JoinHandle<()>,
    counters: Arc<WatchCounters>,
}

impl std::fmt::Debug for IndexWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl IndexWatcher {
    /// Watch `root` recursively. Only content/metadata modifications of
    /// non-directory paths count as events.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem watcher cannot be initialized or
    /// `root` cannot be watched.
    pub fn start(root: &Path, window: Duration, tx: mpsc::Sender<WatchEvent>) -> Result<Self> {
        let (notify_tx, mut notify_rx) = mpsc::channel::<PathBuf>(64);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!("source watcher error: {e}");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_)) {
                    return;
                }
                for path in event.paths {
                    if path.is_dir() {
                        continue;
                    }
                    // Full channel means a burst; the gate would drop these anyway.
                    let _ = notify_tx.try_send(path);
                }
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let counters = Arc::new(WatchCounters::default());
        let task_counters = Arc::clone(&counters);
        let handle = tokio::spawn(async move {
            let mut gate = DebounceGate::new(window);
            while let Some(path) = notify_rx.recv().await {
                task_counters.events.fetch_add(1, Ordering::Relaxed);
                if !gate.should_fire(Instant::now()) {
                    task_counters.suppressed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %path.display(), "change suppressed by debounce");
                    continue;
                }
                task_counters.triggered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(path = %path.display(), "source change detected, requesting reindex");
                if tx.send(WatchEvent::Reindex { trigger: path }).await.is_err() {
                    break;
                }
            }
        });

        tracing::info!(root = %root.display(), window_secs = window.as_secs(), "watching source tree");
        Ok(Self {
            root: root.to_path_buf(),
            watcher,
            handle,
            counters,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn stats(&self) -> WatchStats {
        WatchStats {
            events: self.counters.events.load(Ordering::Relaxed),
            triggered: self.counters.triggered.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        }
    }

    /// Stop watching and wait for the forwarding task to finish.
    pub async fn stop(self) -> WatchStats {
        drop(self.watcher);
        if let Err(e) = self.handle.await {
            tracing::warn!("watcher task ended abnormally: {e}");
        }
        let stats = WatchStats {
            events: self.counters.events.load(Ordering::Relaxed),
            triggered: self.counters.triggered.load(Ordering::Relaxed),
            suppressed: self.counters.suppressed.load(Ordering::Relaxed),
        };
        tracing::info!(root = %self.root.display(), "stopped watching source tree");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_event_fires_immediately() {
        let mut gate = DebounceGate::new(Duration::from_secs(30));
        assert!(gate.should_fire(Instant::now()));
    }

    #[test]
    fn event_inside_window_is_suppressed() {
        let mut gate = DebounceGate::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(gate.should_fire(t0));
        assert!(!gate.should_fire(t0 + Duration::from_secs(5)));
        assert!(gate.should_fire(t0 + Duration::from_secs(40)));
    }

    #[test]
    fn suppressed_events_do_not_extend_window() {
        let mut gate = DebounceGate::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(gate.should_fire(t0));
        assert!(!gate.should_fire(t0 + Duration::from_secs(29)));
        assert!(gate.should_fire(t0 + Duration::from_secs(31)));
    }

    #[test]
    fn exact_window_boundary_is_suppressed() {
        let mut gate = DebounceGate::new(Duration::from_secs(30));
        let t0 = Instant::now();
        assert!(gate.should_fire(t0));
        assert!(!gate.should_fire(t0 + Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn start_with_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let watcher = IndexWatcher::start(dir.path(), Duration::from_secs(30), tx).unwrap();
        assert_eq!(watcher.root(), dir.path());
        assert_eq!(watcher.stop().await, WatchStats::default());
    }

    #[tokio::test]
    async fn start_with_nonexistent_directory_fails() {
        let (tx, _rx) = mpsc::channel(4);
        let result = IndexWatcher::start(
            Path::new("/nonexistent/path/xyz"),
            Duration::from_secs(30),
            tx,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn modification_triggers_reindex_event() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.py");
        std::fs::write(&file, "x = 1\n").unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let watcher = IndexWatcher::start(dir.path(), Duration::from_secs(30), tx).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&file, "x = 2\n").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within timeout")
            .expect("channel closed");
        let WatchEvent::Reindex { trigger } = event;
        assert_eq!(trigger.file_name().unwrap(), "app.py");

        let stats = watcher.stop().await;
        assert_eq!(stats.triggered, 1);
    }
}
