//! Change debouncer.
//!
//! Coalesces bursts of "cache changed" signals into one version bump. Every
//! call restarts the quiescence window; the bump fires once the window
//! elapses with no further calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::debounce";
const METRIC_VERSION_BUMPS: &str = "livetable_version_bumps_total";

struct PendingWindow {
    task: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

pub struct ChangeDebouncer {
    window: Duration,
    version: Arc<watch::Sender<u64>>,
    pending: Mutex<Option<PendingWindow>>,
}

impl ChangeDebouncer {
    pub fn new(window: Duration) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            window,
            version: Arc::new(version),
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a change, (re)starting the quiescence window.
    ///
    /// Outside a Tokio runtime there is nothing to schedule on, so the
    /// version is bumped immediately.
    pub fn notify_changed(&self) {
        let Ok(runtime) = Handle::try_current() else {
            debug!("No runtime available; bumping cache version without debounce");
            bump(&self.version);
            return;
        };

        let mut pending = mutex_lock(&self.pending, SOURCE, "notify_changed");
        if let Some(previous) = pending.take() {
            cancel(&previous);
        }

        let fired = Arc::new(AtomicBool::new(false));
        let version = Arc::clone(&self.version);
        let window = self.window;
        let task_fired = Arc::clone(&fired);
        let task = runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if !task_fired.swap(true, Ordering::SeqCst) {
                bump(&version);
            }
        });

        *pending = Some(PendingWindow { task, fired });
    }

    /// Fire a pending window now instead of waiting for it to elapse.
    ///
    /// Returns true if a pending notification was delivered.
    pub fn flush(&self) -> bool {
        let Some(window) = mutex_lock(&self.pending, SOURCE, "flush").take() else {
            return false;
        };
        window.task.abort();
        if window.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        bump(&self.version);
        true
    }

    /// Current cache version.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Watch the cache version; the receiver wakes once per delivered bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl Drop for ChangeDebouncer {
    fn drop(&mut self) {
        if let Some(window) = mutex_lock(&self.pending, SOURCE, "drop").take() {
            cancel(&window);
        }
    }
}

fn cancel(window: &PendingWindow) {
    window.fired.store(true, Ordering::SeqCst);
    window.task.abort();
}

fn bump(version: &watch::Sender<u64>) {
    version.send_modify(|current| *current += 1);
    counter!(METRIC_VERSION_BUMPS).increment(1);
    debug!(version = *version.borrow(), "Cache version bumped");
}
