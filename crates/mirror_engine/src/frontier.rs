use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashSet;
use engine_logging::engine_info;
use mirror_core::{MirrorReport, Outcome, SkipReason};
use tokio::sync::Notify;
use url::Url;

/// Dedup key for a URL: the absolute URL without its fragment.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

/// Absolute URLs admitted for fetching. Grows monotonically.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: DashSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-insert: true only for the first caller per URL.
    pub fn insert(&self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn count(&self) -> usize {
        self.urls.len()
    }
}

struct PendingInner {
    count: AtomicUsize,
    idle: Notify,
    report: Mutex<MirrorReport>,
}

/// Count of discovered URLs that have not reached a terminal outcome.
///
/// Every increment hands out a [`WorkTicket`]; dropping the ticket is the
/// only decrement, so a URL can neither leak nor be counted down twice.
#[derive(Clone)]
pub struct PendingWork {
    inner: Arc<PendingInner>,
}

impl Default for PendingWork {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingWork {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PendingInner {
                count: AtomicUsize::new(0),
                idle: Notify::new(),
                report: Mutex::new(MirrorReport::default()),
            }),
        }
    }

    /// Register one unit of outstanding work for `url`.
    pub fn open(&self, url: impl Into<String>) -> WorkTicket {
        self.inner.count.fetch_add(1, Ordering::SeqCst);
        WorkTicket {
            url: url.into(),
            inner: Arc::clone(&self.inner),
            resolved: false,
        }
    }

    pub fn count(&self) -> usize {
        self.inner.count.load(Ordering::SeqCst)
    }

    /// Wait until every open ticket has been resolved or dropped.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn report(&self) -> MirrorReport {
        self.inner
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One outstanding URL. Resolve it with its terminal outcome; a ticket
/// dropped unresolved is recorded as failed.
#[must_use = "dropping a ticket records the URL as failed"]
pub struct WorkTicket {
    url: String,
    inner: Arc<PendingInner>,
    resolved: bool,
}

impl WorkTicket {
    pub fn resolve(mut self, outcome: Outcome) {
        self.record(&outcome);
        self.resolved = true;
    }

    fn record(&self, outcome: &Outcome) {
        if let Some(line) = outcome_line(&self.url, outcome) {
            engine_info!("{}", line);
        }
        self.inner
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&self.url, outcome);
    }
}

/// Log line for a terminal outcome; duplicates are not logged.
fn outcome_line(url: &str, outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Succeeded { path, bytes, .. } => {
            Some(format!("saved {url} -> {path:?} ({bytes} bytes)"))
        }
        Outcome::Failed { reason } => Some(format!("failed {url}: {reason}")),
        Outcome::Skipped(SkipReason::Duplicate) => None,
        Outcome::Skipped(reason) => Some(format!("skipped {url}: {reason}")),
    }
}

impl Drop for WorkTicket {
    fn drop(&mut self) {
        if !self.resolved {
            self.record(&Outcome::Failed {
                reason: "abandoned before completion".to_string(),
            });
        }
        if self.inner.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

impl std::fmt::Debug for WorkTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkTicket")
            .field("url", &self.url)
            .field("resolved", &self.resolved)
            .finish()
    }
}
