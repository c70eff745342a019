//! Mirror engine: fetch pipeline, crawl scheduling and link conversion.
mod decode;
mod engine;
mod extract;
mod fetch;
mod frontier;
mod limiter;
mod persist;
mod rewrite;
mod throttle;
mod types;

pub use decode::{decode_document, DecodedText};
pub use engine::{download_files, DownloadJob, MirrorEngine, MirrorError};
pub use extract::{css_urls, extract_links, is_link_attribute, resolve_link, ContentKind};
pub use fetch::{
    Destination, FetchRequest, FetchSettings, Fetcher, NullProgressSink, ProgressSink,
    ReqwestFetcher, DEFAULT_USER_AGENT,
};
pub use frontier::{normalize_url, PendingWork, VisitedSet, WorkTicket};
pub use limiter::RequestLimiter;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use rewrite::{
    relative_reference, rewrite_css_urls, rewrite_file, rewrite_html, rewrite_mirror, PageLinks,
    RewriteError,
};
pub use throttle::BandwidthThrottle;
pub use types::{
    DownloadedFile, EngineEvent, FailureKind, FetchError, FileToProcess, JobId, JobOutcome,
    JobProgress, Stage,
};
