//!
//! datadock change watcher
//! -----------------------
//! Observes the data directory for filesystem events and triggers registry
//! reloads. Raw `notify` events are filtered at the source (direct children
//! of the watched directory with a recognized extension, directories and
//! access events ignored) and pushed into a channel consumed by a single
//! debounce loop task, decoupling event delivery from reload execution.
//!
//! The debounce is trailing: a burst of rapid changes collapses into exactly
//! one reload, executed once the configured quiet period has elapsed after
//! the last qualifying event. Reload failures are logged and the watcher
//! stays up; the next qualifying event starts a fresh attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dataset::{discover, DataRegistry};

/// Handle to a running directory watch. Dropping it without calling
/// `shutdown` detaches the debounce loop; prefer `shutdown` so any in-flight
/// reload finishes cleanly.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

/// Start watching `dir` and reload `registry` after changes settle.
pub fn spawn(
    registry: Arc<DataRegistry>,
    dir: PathBuf,
    debounce: Duration,
) -> Result<DirectoryWatcher> {
    // Event paths arrive absolute; compare against the canonical directory.
    let dir = dir.canonicalize().unwrap_or(dir);

    let (tx, rx) = mpsc::unbounded_channel();
    let filter_dir = dir.clone();
    let mut watcher = notify::recommended_watcher(
        move |event: std::result::Result<Event, notify::Error>| match event {
            Ok(event) => {
                if qualifies(&event, &filter_dir) {
                    let _ = tx.send(());
                }
            }
            Err(err) => error!(target: "datadock::watch", "watch error: {err}"),
        },
    )
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;
    info!(target: "datadock::watch", "directory watching enabled for: {}", dir.display());

    let task = tokio::spawn(debounce_loop(rx, debounce, move || {
        let registry = registry.clone();
        let dir = dir.clone();
        async move {
            info!(target: "datadock::watch", "changes settled, reloading: {}", dir.display());
            // Reload is synchronous file I/O; keep it off the runtime workers.
            match tokio::task::spawn_blocking(move || registry.reload(&dir)).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(target: "datadock::watch", "failed to reload directory: {err}")
                }
                Err(err) => error!(target: "datadock::watch", "reload task failed: {err}"),
            }
        }
    }));

    Ok(DirectoryWatcher { watcher, task })
}

impl DirectoryWatcher {
    /// Stop delivering events and wait for the debounce loop, including any
    /// reload it is currently running, to finish.
    pub async fn shutdown(self) {
        // Dropping the watcher closes the event channel; the loop exits once
        // it has drained.
        drop(self.watcher);
        if let Err(err) = self.task.await {
            error!(target: "datadock::watch", "watcher task failed: {err}");
        }
        info!(target: "datadock::watch", "directory watching stopped");
    }
}

/// A filesystem event is relevant when it touches a direct child of the
/// watched directory with a recognized extension. Create and delete events
/// count the same as modifications; access events never do.
fn qualifies(event: &Event, dir: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| {
        path.parent() == Some(dir) && !path.is_dir() && discover::has_supported_extension(path)
    })
}

/// Trailing debounce: each event pushes the deadline out; `fire` runs once
/// per settled burst. Exits when the event channel closes.
async fn debounce_loop<F, Fut>(
    mut events: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    mut fire: F,
) where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut deadline: Option<tokio::time::Instant> = None;
    loop {
        let wait = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now));
        tokio::select! {
            event = events.recv() => match event {
                Some(()) => deadline = Some(tokio::time::Instant::now() + debounce),
                None => break,
            },
            _ = wait, if deadline.is_some() => {
                deadline = None;
                fire().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, ModifyKind, RemoveKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn event_filter_matches_direct_children_with_known_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().canonicalize().unwrap();
        std::fs::write(dir.join("data.csv"), "a\n1\n").unwrap();
        std::fs::create_dir(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub").join("nested.csv"), "a\n1\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "x").unwrap();

        let modify = EventKind::Modify(ModifyKind::Any);
        assert!(qualifies(
            &Event::new(modify).add_path(dir.join("data.csv")),
            &dir
        ));
        // Deleted files cannot be stat'ed; they qualify by extension alone.
        assert!(qualifies(
            &Event::new(EventKind::Remove(RemoveKind::Any)).add_path(dir.join("gone.json")),
            &dir
        ));
        assert!(!qualifies(
            &Event::new(modify).add_path(dir.join("sub").join("nested.csv")),
            &dir
        ));
        assert!(!qualifies(
            &Event::new(modify).add_path(dir.join("notes.txt")),
            &dir
        ));
        assert!(!qualifies(&Event::new(modify).add_path(dir.join("sub")), &dir));
        assert!(!qualifies(
            &Event::new(EventKind::Access(AccessKind::Any)).add_path(dir.join("data.csv")),
            &dir
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_collapses_into_one_trailing_fire() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let task = tokio::spawn(debounce_loop(
            rx,
            Duration::from_millis(500),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        for _ in 0..5 {
            tx.send(()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // A later event triggers a second, separate reload.
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn events_inside_the_quiet_window_extend_it() {
        let (tx, rx) = mpsc::unbounded_channel();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let task = tokio::spawn(debounce_loop(
            rx,
            Duration::from_millis(500),
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        // 600ms since the first event, but only 300ms since the last one.
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(tx);
        task.await.unwrap();
    }
}
