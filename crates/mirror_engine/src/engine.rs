use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::future::join_all;
use mirror_core::{same_domain, MirrorReport, MirrorSession, Outcome, SkipReason};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::decode::decode_document;
use crate::extract::{extract_links, ContentKind};
use crate::fetch::{Destination, FetchRequest, Fetcher, NullProgressSink, ProgressSink};
use crate::frontier::{normalize_url, PendingWork, VisitedSet, WorkTicket};
use crate::limiter::RequestLimiter;
use crate::persist::{ensure_output_dir, PersistError};
use crate::rewrite::rewrite_mirror;
use crate::{
    DownloadedFile, EngineEvent, FailureKind, FetchError, FileToProcess, JobId, JobOutcome,
    JobProgress, Stage,
};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("output directory: {0}")]
    OutputDir(#[from] PersistError),
    #[error("mirror task failed: {0}")]
    Task(String),
}

/// A newly found URL and the ticket that accounts for it.
struct Discovered {
    url: Url,
    ticket: WorkTicket,
}

/// A downloaded HTML or CSS file waiting for link extraction. The ticket
/// is resolved with `outcome` once its links are queued.
struct ReadyFile {
    file: FileToProcess,
    content_type: Option<String>,
    kind: ContentKind,
    ticket: WorkTicket,
    outcome: Outcome,
}

struct Crawl {
    session: MirrorSession,
    fetcher: Arc<dyn Fetcher>,
    limiter: RequestLimiter,
    visited: VisitedSet,
    pending: PendingWork,
    fetch_slots: Semaphore,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    next_job: AtomicU64,
}

impl Crawl {
    fn next_job_id(&self) -> JobId {
        self.next_job.fetch_add(1, Ordering::Relaxed)
    }
}

/// Recursive same-domain mirror of one seed URL.
///
/// One dispatcher task dedups and filters discovered URLs and spawns a
/// fetch per admitted URL; one extractor task turns downloaded pages into
/// new discoveries. The run ends when every discovered URL has resolved.
pub struct MirrorEngine {
    crawl: Arc<Crawl>,
}

impl MirrorEngine {
    pub fn new(session: MirrorSession, fetcher: Arc<dyn Fetcher>) -> Self {
        let limiter = RequestLimiter::new(session.request_interval);
        let fetch_slots = Semaphore::new(session.max_concurrent.max(1));
        Self {
            crawl: Arc::new(Crawl {
                session,
                fetcher,
                limiter,
                visited: VisitedSet::new(),
                pending: PendingWork::new(),
                fetch_slots,
                sink: Arc::new(NullProgressSink),
                cancel: CancellationToken::new(),
                next_job: AtomicU64::new(1),
            }),
        }
    }

    /// Route fetch progress to `sink`. Has no effect once a run started.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        if let Some(crawl) = Arc::get_mut(&mut self.crawl) {
            crawl.sink = sink;
        }
        self
    }

    pub fn session(&self) -> &MirrorSession {
        &self.crawl.session
    }

    pub fn visited(&self) -> &VisitedSet {
        &self.crawl.visited
    }

    /// Cancelling fails every fetch that has not started and lets the run
    /// drain to completion.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.crawl.cancel.clone()
    }

    pub async fn run(&self) -> Result<MirrorReport, MirrorError> {
        let crawl = &self.crawl;
        let host_root = crawl.session.host_root();
        ensure_output_dir(&host_root)?;
        engine_info!(
            "mirroring {} into {:?}, one request per {:?}",
            crawl.session.base_url,
            host_root,
            crawl.limiter.interval()
        );

        let (discovered_tx, discovered_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let seed = normalize_url(&crawl.session.base_url);
        let ticket = crawl.pending.open(seed.as_str());
        let _ = discovered_tx.send(Discovered { url: seed, ticket });

        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(crawl),
            discovered_rx,
            ready_tx,
            shutdown.clone(),
        ));
        let extractor = tokio::spawn(extract_ready(
            Arc::clone(crawl),
            ready_rx,
            discovered_tx,
            shutdown.clone(),
        ));

        crawl.pending.wait_idle().await;
        shutdown.cancel();
        dispatcher
            .await
            .map_err(|err| MirrorError::Task(err.to_string()))?;
        extractor
            .await
            .map_err(|err| MirrorError::Task(err.to_string()))?;

        let report = crawl.pending.report();
        engine_info!(
            "mirror finished: {} ({} urls visited)",
            report.summary(),
            crawl.visited.count()
        );

        if crawl.session.convert_links {
            let session = crawl.session.clone();
            let ledger = report.clone();
            tokio::task::spawn_blocking(move || rewrite_mirror(&session, &ledger))
                .await
                .map_err(|err| MirrorError::Task(err.to_string()))?;
        }
        Ok(report)
    }
}

async fn dispatch(
    crawl: Arc<Crawl>,
    mut discovered: UnboundedReceiver<Discovered>,
    ready: UnboundedSender<ReadyFile>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = discovered.recv() => match next {
                Some(Discovered { url, ticket }) => admit(&crawl, url, ticket, &ready),
                None => break,
            },
        }
    }
}

fn admit(crawl: &Arc<Crawl>, url: Url, ticket: WorkTicket, ready: &UnboundedSender<ReadyFile>) {
    if !crawl.visited.insert(url.as_str()) {
        ticket.resolve(Outcome::Skipped(SkipReason::Duplicate));
        return;
    }
    if let Err(reason) = crawl.session.filters.check_url(&crawl.session.base_url, &url) {
        ticket.resolve(Outcome::Skipped(reason));
        return;
    }
    tokio::spawn(fetch_page(Arc::clone(crawl), url, ticket, ready.clone()));
}

async fn fetch_page(
    crawl: Arc<Crawl>,
    url: Url,
    ticket: WorkTicket,
    ready: UnboundedSender<ReadyFile>,
) {
    let job_id = crawl.next_job_id();
    crawl.sink.emit(EngineEvent::Progress(JobProgress {
        job_id,
        stage: Stage::Queued,
        bytes: None,
        total: None,
    }));
    let Ok(_slot) = crawl.fetch_slots.acquire().await else {
        ticket.resolve(failed("fetch pool closed"));
        return;
    };
    if let Err(err) = crawl.limiter.acquire(&crawl.cancel).await {
        ticket.resolve(failed(err));
        return;
    }

    let request = FetchRequest {
        url: &url,
        destination: Destination::Mirror {
            root: &crawl.session.output_root,
        },
        filters: Some(&crawl.session.filters),
        bandwidth_limit: crawl.session.bandwidth_limit,
    };
    let result = tokio::select! {
        _ = crawl.cancel.cancelled() => Err(FetchError::new(FailureKind::Cancelled, url.as_str())),
        result = crawl.fetcher.fetch(job_id, request, crawl.sink.as_ref()) => result,
    };
    let result = match result {
        Ok(file) if !same_domain(&crawl.session.base_url, &file.final_url) => {
            discard(&file.path).await;
            Err(FetchError::new(
                FailureKind::OffDomainRedirect,
                format!("{url} -> {}", file.final_url),
            ))
        }
        other => other,
    };
    crawl.sink.emit(completion_event(job_id, &url, &result));

    match result {
        Ok(file) => {
            let final_url = normalize_url(&file.final_url);
            let redirected_to = (final_url != url).then(|| {
                crawl.visited.insert(final_url.as_str());
                final_url.to_string()
            });
            let outcome = Outcome::Succeeded {
                path: file.path.clone(),
                relative: file.relative.clone(),
                bytes: file.bytes_written,
                redirected_to,
            };
            let kind = ContentKind::detect(&file.path, file.content_type.as_deref());
            if !kind.has_links() {
                ticket.resolve(outcome);
                return;
            }
            let pending = ReadyFile {
                file: FileToProcess {
                    path: file.path,
                    url: final_url,
                },
                content_type: file.content_type,
                kind,
                ticket,
                outcome,
            };
            if let Err(mpsc::error::SendError(unsent)) = ready.send(pending) {
                unsent.ticket.resolve(unsent.outcome);
            }
        }
        Err(err) if matches!(err.kind, FailureKind::Rejected { .. }) => {
            engine_debug!("{} rejected after HEAD: {}", url, err);
            ticket.resolve(Outcome::Skipped(SkipReason::RejectedExtension));
        }
        Err(err) if err.kind == FailureKind::OffDomainRedirect => {
            engine_debug!("{}", err);
            ticket.resolve(Outcome::Skipped(SkipReason::OffDomain));
        }
        Err(err) => ticket.resolve(failed(err)),
    }
}

async fn extract_ready(
    crawl: Arc<Crawl>,
    mut ready: UnboundedReceiver<ReadyFile>,
    discovered: UnboundedSender<Discovered>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            next = ready.recv() => match next {
                Some(file) => enqueue_links(&crawl, file, &discovered).await,
                None => break,
            },
        }
    }
}

async fn enqueue_links(crawl: &Crawl, ready: ReadyFile, discovered: &UnboundedSender<Discovered>) {
    let ReadyFile {
        file,
        content_type,
        kind,
        ticket,
        outcome,
    } = ready;

    match links_in(&file, content_type, kind).await {
        Ok(links) => {
            let base = &crawl.session.base_url;
            for link in links {
                if !same_domain(base, &link) || crawl.visited.contains(link.as_str()) {
                    continue;
                }
                let child = crawl.pending.open(link.as_str());
                // A closed channel drops the child ticket, which records it.
                let _ = discovered.send(Discovered {
                    url: link,
                    ticket: child,
                });
            }
        }
        Err(err) => engine_warn!("no links extracted from {:?}: {}", file.path, err),
    }
    ticket.resolve(outcome);
}

async fn links_in(
    file: &FileToProcess,
    content_type: Option<String>,
    kind: ContentKind,
) -> Result<Vec<Url>, String> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|err| err.to_string())?;
    let source = file.url.clone();
    tokio::task::spawn_blocking(move || {
        let decoded = decode_document(&bytes, content_type.as_deref());
        if decoded.lossy {
            engine_debug!(
                "{} is not valid {}; extracting from a lossy decode",
                source,
                decoded.encoding_label
            );
        }
        extract_links(&decoded.text, kind, &source)
    })
    .await
    .map_err(|err| err.to_string())
}

/// Remove a download that must not stay in the mirror.
async fn discard(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        engine_debug!("could not remove {:?}: {}", path, err);
    }
}

fn failed(reason: impl ToString) -> Outcome {
    Outcome::Failed {
        reason: reason.to_string(),
    }
}

fn completion_event(
    job_id: JobId,
    url: &Url,
    result: &Result<DownloadedFile, FetchError>,
) -> EngineEvent {
    EngineEvent::JobCompleted {
        job_id,
        url: url.to_string(),
        result: result
            .as_ref()
            .map(|file| JobOutcome {
                path: file.path.clone(),
                bytes_written: file.bytes_written,
            })
            .map_err(|err| err.kind.clone()),
    }
}

/// One single-file download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: Url,
    /// Overrides the server-suggested file name.
    pub output_name: Option<String>,
}

/// Download every job concurrently into `dir`. Failures are per job; the
/// results are in job order.
pub async fn download_files(
    fetcher: &dyn Fetcher,
    jobs: &[DownloadJob],
    dir: &Path,
    bandwidth_limit: Option<u64>,
    sink: &dyn ProgressSink,
) -> Result<Vec<Result<DownloadedFile, FetchError>>, MirrorError> {
    ensure_output_dir(dir)?;
    let next_job = AtomicU64::new(1);
    let downloads = jobs.iter().map(|job| {
        let job_id = next_job.fetch_add(1, Ordering::Relaxed);
        async move {
            let request = FetchRequest {
                url: &job.url,
                destination: Destination::File {
                    dir,
                    name: job.output_name.as_deref(),
                },
                filters: None,
                bandwidth_limit,
            };
            let result = fetcher.fetch(job_id, request, sink).await;
            match &result {
                Ok(file) => engine_info!(
                    "saved {} -> {:?} ({} bytes)",
                    job.url,
                    file.path,
                    file.bytes_written
                ),
                Err(err) => engine_info!("failed {}: {}", job.url, err),
            }
            sink.emit(completion_event(job_id, &job.url, &result));
            result
        }
    });
    Ok(join_all(downloads).await)
}
