use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use futures_util::TryStreamExt;
use mirror_core::{
    download_filename, is_html_content_type, local_path, relative_file_path, Filters,
};
use reqwest::header::{
    HeaderMap, HeaderName, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use url::Url;

use crate::throttle::BandwidthThrottle;
use crate::{DownloadedFile, EngineEvent, FailureKind, FetchError, JobId, JobProgress, Stage};

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

const COPY_BUFFER: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Bounds the wait for response headers and any stall while reading the
    /// body. A throttled body may take longer than this in total.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Where a fetched body is written.
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// `<root>/<host>/<url path>`, with index and `.html` substitution.
    Mirror { root: &'a Path },
    /// `<dir>/<name>`; the name defaults to the server-suggested filename.
    File { dir: &'a Path, name: Option<&'a str> },
}

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a Url,
    pub destination: Destination<'a>,
    /// Extension/content-type rejection applied once metadata is known.
    pub filters: Option<&'a Filters>,
    /// Bytes per second for this download.
    pub bandwidth_limit: Option<u64>,
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        job_id: JobId,
        request: FetchRequest<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadedFile, FetchError>;
}

/// Response metadata gathered from HEAD, or from the GET headers when the
/// server refuses HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Metadata {
    content_length: Option<u64>,
    content_type: Option<String>,
    filename: String,
}

impl Metadata {
    fn from_headers(url: &Url, headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        Self {
            content_length: header(CONTENT_LENGTH).and_then(|len| len.trim().parse().ok()),
            content_type: header(CONTENT_TYPE),
            filename: download_filename(url, header(CONTENT_DISPOSITION).as_deref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// Send `request` and wait for the response headers.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FetchError> {
        let request = request.header(USER_AGENT, &self.settings.user_agent).send();
        match tokio::time::timeout(self.settings.request_timeout, request).await {
            Ok(response) => response.map_err(map_reqwest_error),
            Err(_) => Err(FetchError::new(
                FailureKind::Timeout,
                format!("no response within {:?}", self.settings.request_timeout),
            )),
        }
    }

    async fn head(&self, url: &Url) -> Option<Metadata> {
        match self.send(self.client.head(url.clone())).await {
            Ok(response) if response.status().is_success() => {
                Some(Metadata::from_headers(url, response.headers()))
            }
            Ok(response) => {
                engine_debug!("HEAD {} returned {}", url, response.status());
                None
            }
            Err(err) => {
                engine_debug!("HEAD {} failed: {}", url, err);
                None
            }
        }
    }

    fn target_path(request: &FetchRequest<'_>, metadata: &Metadata) -> (PathBuf, String) {
        match request.destination {
            Destination::Mirror { root } => {
                let is_html = is_html_content_type(metadata.content_type.as_deref());
                (
                    local_path(root, request.url, is_html),
                    relative_file_path(request.url, is_html),
                )
            }
            Destination::File { dir, name } => {
                let name = name.unwrap_or(&metadata.filename).to_string();
                (dir.join(&name), name)
            }
        }
    }
}

fn check_filters(request: &FetchRequest<'_>, metadata: &Metadata) -> Result<(), FetchError> {
    let Some(filters) = request.filters else {
        return Ok(());
    };
    filters
        .check_file(&metadata.filename, metadata.content_type.as_deref())
        .map_err(|reason| {
            FetchError::new(
                FailureKind::Rejected {
                    content_type: metadata.content_type.clone(),
                },
                format!("{} ({reason})", metadata.filename),
            )
        })
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(
        &self,
        job_id: JobId,
        request: FetchRequest<'_>,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadedFile, FetchError> {
        let url = request.url;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::new(FailureKind::InvalidUrl, url.to_string()));
        }

        sink.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Requesting,
            bytes: None,
            total: None,
        }));

        let head = self.head(url).await;
        if let Some(metadata) = &head {
            check_filters(&request, metadata)?;
        }

        let response = self.send(self.client.get(url.clone())).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                format!("{url}: {status}"),
            ));
        }

        let metadata = match head {
            Some(metadata) => metadata,
            None => {
                let metadata = Metadata::from_headers(url, response.headers());
                check_filters(&request, &metadata)?;
                metadata
            }
        };
        let final_url = response.url().clone();
        let total = response.content_length().or(metadata.content_length);

        let (path, relative) = Self::target_path(&request, &metadata);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(&path, err))?;
        }
        sink.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Downloading,
            bytes: Some(0),
            total,
        }));

        let body = StreamReader::new(Box::pin(
            response.bytes_stream().map_err(io::Error::other),
        ));
        let reader = BandwidthThrottle::new(body, request.bandwidth_limit);
        let written = save_body(reader, &path, |written| {
            sink.emit(EngineEvent::Progress(JobProgress {
                job_id,
                stage: Stage::Downloading,
                bytes: Some(written),
                total,
            }));
        })
        .await?;
        engine_trace!("wrote {} bytes from {} to {:?}", written, url, path);

        sink.emit(EngineEvent::Progress(JobProgress {
            job_id,
            stage: Stage::Done,
            bytes: Some(written),
            total,
        }));

        Ok(DownloadedFile {
            url: url.clone(),
            final_url,
            path,
            relative,
            content_type: metadata.content_type,
            bytes_written: written,
        })
    }
}

/// Write the whole body to `path`, reporting the running byte count. A
/// body that fails part way leaves no file behind.
async fn save_body<R: AsyncRead + Unpin>(
    reader: R,
    path: &Path,
    on_progress: impl FnMut(u64),
) -> Result<u64, FetchError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|err| io_error(path, err))?;
    let copied = copy_body(reader, &mut file, path, on_progress).await;
    drop(file);
    if copied.is_err() {
        if let Err(err) = tokio::fs::remove_file(path).await {
            engine_debug!("could not remove partial {:?}: {}", path, err);
        }
    }
    copied
}

async fn copy_body<R: AsyncRead + Unpin>(
    mut reader: R,
    file: &mut tokio::fs::File,
    path: &Path,
    mut on_progress: impl FnMut(u64),
) -> Result<u64, FetchError> {
    let mut buffer = vec![0u8; COPY_BUFFER];
    let mut written: u64 = 0;
    loop {
        let read = reader.read(&mut buffer).await.map_err(map_stream_error)?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .await
            .map_err(|err| io_error(path, err))?;
        written += read as u64;
        on_progress(written);
    }
    file.flush().await.map_err(|err| io_error(path, err))?;
    Ok(written)
}

fn io_error(path: &Path, err: io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, format!("{}: {err}", path.display()))
}

fn map_stream_error(err: io::Error) -> FetchError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
    {
        Some(inner) if inner.is_timeout() => FetchError::new(FailureKind::Timeout, err.to_string()),
        Some(_) => FetchError::new(FailureKind::Network, err.to_string()),
        None => FetchError::new(FailureKind::Io, err.to_string()),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
