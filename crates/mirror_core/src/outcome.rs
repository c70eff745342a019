use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::rate::format_bytes;

/// Why a URL was resolved without being downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    OffDomain,
    ExcludedDirectory,
    RejectedExtension,
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OffDomain => write!(f, "different domain"),
            SkipReason::ExcludedDirectory => write!(f, "excluded directory"),
            SkipReason::RejectedExtension => write!(f, "rejected extension"),
            SkipReason::Duplicate => write!(f, "already visited"),
        }
    }
}

/// Terminal state of one discovered URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded {
        path: PathBuf,
        /// Path below the host directory, `/`-separated.
        relative: String,
        bytes: u64,
        /// Final URL when the server redirected the request.
        redirected_to: Option<String>,
    },
    Failed {
        reason: String,
    },
    Skipped(SkipReason),
}

/// Tally of every terminal outcome reached during a mirror run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duplicates: usize,
    pub bytes_written: u64,
    pub files: Vec<PathBuf>,
    /// Absolute URL -> path below the host directory, for every download.
    pub link_map: BTreeMap<String, String>,
    /// Requested URL -> final URL, for downloads that were redirected.
    pub redirects: BTreeMap<String, String>,
}

impl MirrorReport {
    pub fn record(&mut self, url: &str, outcome: &Outcome) {
        match outcome {
            Outcome::Succeeded {
                path,
                relative,
                bytes,
                redirected_to,
            } => {
                self.succeeded += 1;
                self.bytes_written += bytes;
                self.files.push(path.clone());
                self.link_map.insert(url.to_string(), relative.clone());
                if let Some(target) = redirected_to {
                    self.link_map
                        .entry(target.clone())
                        .or_insert_with(|| relative.clone());
                    self.redirects.insert(url.to_string(), target.clone());
                }
            }
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Skipped(SkipReason::Duplicate) => self.duplicates += 1,
            Outcome::Skipped(_) => self.skipped += 1,
        }
    }

    /// URL a downloaded document's relative links resolve against.
    pub fn page_url<'a>(&'a self, url: &'a str) -> &'a str {
        self.redirects.get(url).map_or(url, String::as_str)
    }

    /// Number of URLs that reached the network.
    pub fn fetched(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn summary(&self) -> String {
        format!(
            "{} downloaded ({}), {} failed, {} skipped",
            self.succeeded,
            format_bytes(self.bytes_written),
            self.failed,
            self.skipped
        )
    }
}
