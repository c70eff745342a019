use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::filter::{excluded_by_directory, excluded_by_extension, extension_of, same_domain};
use crate::outcome::SkipReason;

/// Environment variable set by the background launcher.
pub const BACKGROUND_ENV: &str = "WGET_BACKGROUND";

pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_CONCURRENT: usize = 16;

/// True when this process was started by the background launcher.
pub fn is_background() -> bool {
    std::env::var(BACKGROUND_ENV).is_ok_and(|value| value == "1")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid url {url:?}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("url {0:?} has no host")]
    MissingHost(String),
    #[error("unsupported scheme {scheme:?} in {url:?}")]
    UnsupportedScheme { url: String, scheme: String },
    #[error("max concurrent fetches must be at least 1")]
    ZeroConcurrency,
}

/// Parse and check a seed URL: absolute, http(s), with a host.
pub fn parse_seed_url(raw: &str) -> Result<Url, SessionError> {
    let url = Url::parse(raw.trim()).map_err(|err| SessionError::InvalidUrl {
        url: raw.to_string(),
        message: err.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SessionError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(SessionError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// Rejection lists applied before and after a fetch's metadata is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    pub reject_extensions: Vec<String>,
    pub exclude_directories: Vec<String>,
}

impl Filters {
    /// Checks that need only the URL: domain, excluded directory, extension.
    pub fn check_url(&self, base: &Url, url: &Url) -> Result<(), SkipReason> {
        if !same_domain(base, url) {
            return Err(SkipReason::OffDomain);
        }
        if excluded_by_directory(url.path(), &self.exclude_directories) {
            return Err(SkipReason::ExcludedDirectory);
        }
        let last = url.path().rsplit('/').next().unwrap_or_default();
        if extension_of(last).is_some()
            && excluded_by_extension(last, None, &self.reject_extensions)
        {
            return Err(SkipReason::RejectedExtension);
        }
        Ok(())
    }

    /// Check once the filename and content type are known from HEAD.
    pub fn check_file(&self, filename: &str, content_type: Option<&str>) -> Result<(), SkipReason> {
        if excluded_by_extension(filename, content_type, &self.reject_extensions) {
            return Err(SkipReason::RejectedExtension);
        }
        Ok(())
    }
}

/// Parsed, validated inputs for one invocation. Built by the CLI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub seed_url: String,
    pub output_root: PathBuf,
    pub filters: Filters,
    pub request_interval: Duration,
    pub bandwidth_limit: Option<u64>,
    pub convert_links: bool,
    pub max_concurrent: usize,
}

impl MirrorConfig {
    pub fn new(seed_url: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            seed_url: seed_url.into(),
            output_root: output_root.into(),
            filters: Filters::default(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            bandwidth_limit: None,
            convert_links: false,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn into_session(self) -> Result<MirrorSession, SessionError> {
        let base_url = parse_seed_url(&self.seed_url)?;
        if self.max_concurrent == 0 {
            return Err(SessionError::ZeroConcurrency);
        }
        Ok(MirrorSession {
            base_url,
            output_root: self.output_root,
            filters: self.filters,
            request_interval: self.request_interval,
            bandwidth_limit: self.bandwidth_limit.filter(|limit| *limit > 0),
            convert_links: self.convert_links,
            max_concurrent: self.max_concurrent,
        })
    }
}

/// Immutable per-run mirror settings shared by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSession {
    pub base_url: Url,
    pub output_root: PathBuf,
    pub filters: Filters,
    pub request_interval: Duration,
    /// Bytes per second for each individual download; `None` is unbounded.
    pub bandwidth_limit: Option<u64>,
    pub convert_links: bool,
    pub max_concurrent: usize,
}

impl MirrorSession {
    /// Directory holding the mirrored host: `<output_root>/<host>`.
    pub fn host_root(&self) -> PathBuf {
        self.output_root
            .join(self.base_url.host_str().unwrap_or_default())
    }
}
