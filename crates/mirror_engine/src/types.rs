use std::fmt;
use std::path::PathBuf;

use url::Url;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    Requesting,
    Downloading,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub job_id: JobId,
    pub stage: Stage,
    pub bytes: Option<u64>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    JobCompleted {
        job_id: JobId,
        url: String,
        result: Result<JobOutcome, FailureKind>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub path: PathBuf,
    pub bytes_written: u64,
}

/// A file written by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub url: Url,
    /// Where the body came from once redirects were followed.
    pub final_url: Url,
    pub path: PathBuf,
    /// Path below the host directory (mirror mode) or the bare file name.
    pub relative: String,
    pub content_type: Option<String>,
    pub bytes_written: u64,
}

/// A downloaded artifact waiting for link extraction and rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileToProcess {
    pub path: PathBuf,
    pub url: Url,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    /// A mirrored page redirected to another host; a skip, not a failure.
    OffDomainRedirect,
    /// Filtered out once HEAD metadata was known; a skip, not a failure.
    Rejected { content_type: Option<String> },
    Io,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::OffDomainRedirect => write!(f, "redirected to another host"),
            FailureKind::Rejected { content_type } => match content_type {
                Some(ct) => write!(f, "rejected content type {ct}"),
                None => write!(f, "rejected extension"),
            },
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}
