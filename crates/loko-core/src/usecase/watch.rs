//! Debounced watch-and-rebuild loop

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::ports::{FileWatcher, ProgressReporter, WatchEvent};

/// Default debounce window between the last event and a rebuild.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Coalesces event bursts into single rebuilds.
///
/// Each event resets the debounce timer; when it fires, the rebuild runs
/// synchronously in the loop. Events arriving mid-rebuild queue in the
/// watcher channel and re-arm the timer afterwards, so at most one rebuild
/// is ever pending.
pub struct WatchLoop<W: FileWatcher> {
    watcher: W,
    debounce: Duration,
}

impl<W: FileWatcher> WatchLoop<W> {
    pub fn new(watcher: W) -> Self {
        WatchLoop { watcher, debounce: DEFAULT_DEBOUNCE }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = if debounce.is_zero() { Duration::from_millis(1) } else { debounce };
        self
    }

    /// Run until cancellation. `rebuild` is invoked once per quiet period.
    pub async fn run<F, Fut>(
        mut self,
        root: &std::path::Path,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
        mut rebuild: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.watcher.watch(root).await?;
        reporter.info(&format!("watching {} (debounce {:?})", root.display(), self.debounce));

        let mut deadline: Option<Instant> = None;
        loop {
            // Deadline is copied into the timer future so the event arm can
            // re-arm it without a borrow conflict.
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    reporter.info("watch loop stopping");
                    return Ok(());
                }
                event = self.watcher.next_event() => {
                    match event {
                        Some(WatchEvent { path, .. }) => {
                            reporter.info(&format!("change detected: {}", path.display()));
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        None => {
                            reporter.info("watch event stream closed");
                            return Ok(());
                        }
                    }
                }
                _ = timer => {
                    deadline = None;
                    if let Err(err) = rebuild().await {
                        reporter.error(&format!("rebuild failed: {err}"));
                    } else {
                        reporter.success("rebuild complete");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::test_support::RecordingReporter;
    use crate::ports::WatchEventKind;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct ChannelWatcher {
        rx: mpsc::UnboundedReceiver<WatchEvent>,
    }

    #[async_trait]
    impl FileWatcher for ChannelWatcher {
        async fn watch(&mut self, _root: &Path) -> Result<()> {
            Ok(())
        }

        async fn next_event(&mut self) -> Option<WatchEvent> {
            self.rx.recv().await
        }
    }

    fn event(path: &str) -> WatchEvent {
        WatchEvent { path: PathBuf::from(path), kind: WatchEventKind::Modified }
    }

    #[tokio::test]
    async fn burst_of_events_triggers_one_rebuild() {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();
        let rebuilds = Arc::new(AtomicUsize::new(0));

        tx.send(event("src/a/system.md")).unwrap();
        tx.send(event("src/a/a.d2")).unwrap();
        tx.send(event("src/a/b/container.md")).unwrap();

        let counter = Arc::clone(&rebuilds);
        let stopper = cancel.clone();
        let waiter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            stopper.cancel();
        });

        let watch = WatchLoop::new(ChannelWatcher { rx }).with_debounce(Duration::from_millis(50));
        watch
            .run(Path::new("."), &reporter, &cancel, move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();
        waiter.await.unwrap();

        assert_eq!(rebuilds.load(Ordering::SeqCst), 1);
        let infos = reporter.infos();
        assert!(infos.iter().any(|m| m.contains("system.md")));
        assert!(reporter
            .events()
            .iter()
            .any(|e| matches!(e, crate::ports::Progress::Success(m) if m.contains("rebuild"))));
    }

    #[tokio::test]
    async fn events_after_rebuild_arm_the_next_cycle() {
        let (tx, rx) = mpsc::unbounded_channel();
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();
        let rebuilds = Arc::new(AtomicUsize::new(0));

        tx.send(event("src/one.md")).unwrap();
        let tx2 = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tx2.send(event("src/two.md")).unwrap();
        });

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            stopper.cancel();
        });

        let counter = Arc::clone(&rebuilds);
        let watch = WatchLoop::new(ChannelWatcher { rx }).with_debounce(Duration::from_millis(40));
        watch
            .run(Path::new("."), &reporter, &cancel, move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(rebuilds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let reporter = RecordingReporter::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let watch = WatchLoop::new(ChannelWatcher { rx });
        watch
            .run(Path::new("."), &reporter, &cancel, || async { Ok(()) })
            .await
            .unwrap();
        assert!(reporter.infos().iter().any(|m| m.contains("stopping")));
    }
}
