//! Mirror core: pure filtering, path derivation and session configuration.
mod filter;
mod outcome;
mod paths;
mod rate;
mod session;

pub use filter::{
    excluded_by_directory, excluded_by_extension, extension_of, is_html_content_type,
    same_domain,
};
pub use outcome::{MirrorReport, Outcome, SkipReason};
pub use paths::{
    disposition_filename, download_filename, local_path, relative_file_path, rewrite_target,
    INDEX_FILENAME,
};
pub use rate::{format_bytes, parse_rate, RateParseError};
pub use session::{
    is_background, parse_seed_url, Filters, MirrorConfig, MirrorSession, SessionError,
    BACKGROUND_ENV, DEFAULT_MAX_CONCURRENT, DEFAULT_REQUEST_INTERVAL,
};
