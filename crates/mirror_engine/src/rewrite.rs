use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use encoding_rs::Encoding;
use engine_logging::{engine_debug, engine_info, engine_warn};
use lol_html::{element, HtmlRewriter, Settings};
use mirror_core::{extension_of, rewrite_target, same_domain, MirrorReport, MirrorSession};
use thiserror::Error;
use url::Url;

use crate::decode::decode_document;
use crate::extract::{is_link_attribute, resolve_link, ContentKind, CSS_URL};
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("html rewrite failed: {0}")]
    Html(String),
    #[error("rewritten html is not valid utf-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("reading {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A downloaded page and the download ledger its links are rewritten with.
#[derive(Debug, Clone, Copy)]
pub struct PageLinks<'a> {
    /// URL the page was fetched from; relative references resolve against it.
    pub url: &'a Url,
    /// The page's own path below the host directory.
    pub relative: &'a str,
    /// Absolute URL -> path below the host directory, for every download.
    pub link_map: &'a BTreeMap<String, String>,
}

impl PageLinks<'_> {
    /// Local reference for a same-domain link, relative to this page's
    /// directory and keeping any fragment. `None` leaves the value as is.
    pub fn local_reference(&self, value: &str) -> Option<String> {
        let target_url = resolve_link(value, self.url)?;
        if !same_domain(self.url, &target_url) {
            return None;
        }
        let target = self
            .link_map
            .get(target_url.as_str())
            .cloned()
            .unwrap_or_else(|| rewrite_target(&target_url));
        let mut local = relative_reference(self.relative, &target)?;
        let fragment = self.url.join(value.trim()).ok().and_then(|joined| {
            joined.fragment().map(str::to_string)
        });
        if let Some(fragment) = fragment {
            local.push('#');
            local.push_str(&fragment);
        }
        Some(local)
    }
}

/// `/`-separated path from the directory of `from_file` to `to_file`, both
/// relative to the host directory.
pub fn relative_reference(from_file: &str, to_file: &str) -> Option<String> {
    let from_dir = Path::new(from_file).parent().unwrap_or(Path::new(""));
    let relative = pathdiff::diff_paths(to_file, from_dir)?;
    let joined = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    (!joined.is_empty()).then_some(joined)
}

/// Point every same-domain link attribute and `url(...)` of an HTML page
/// at its local copy. Rewriting an already rewritten page is a no-op.
pub fn rewrite_html(html: &str, page: &PageLinks<'_>) -> Result<String, RewriteError> {
    let mut output = Vec::with_capacity(html.len());
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let links: Vec<(String, String)> = el
                    .attributes()
                    .iter()
                    .filter(|attr| is_link_attribute(&attr.name()))
                    .map(|attr| (attr.name(), attr.value()))
                    .collect();
                for (name, value) in links {
                    if let Some(local) = page.local_reference(&value) {
                        if local != value {
                            el.set_attribute(&name, &local)?;
                        }
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter
        .write(html.as_bytes())
        .map_err(|err| RewriteError::Html(err.to_string()))?;
    rewriter
        .end()
        .map_err(|err| RewriteError::Html(err.to_string()))?;

    let rewritten = String::from_utf8(output)?;
    Ok(rewrite_css_urls(&rewritten, page).into_owned())
}

/// Rewrite same-domain `url(...)` references, preserving the quote style.
/// `/img/a.png` seen from the host root becomes `./img/a.png`.
pub fn rewrite_css_urls<'t>(text: &'t str, page: &PageLinks<'_>) -> Cow<'t, str> {
    CSS_URL.replace_all(text, |caps: &regex::Captures<'_>| {
        let quote = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str());
        let local = page.local_reference(value).map(|local| {
            if local.starts_with("../") {
                local
            } else {
                format!("./{local}")
            }
        });
        match local {
            Some(local) if local != value => format!("url({quote}{local}{quote})"),
            _ => caps[0].to_string(),
        }
    })
}

/// Rewrite one downloaded document in place, keeping its original encoding.
/// Returns whether the file changed.
pub fn rewrite_file(path: &Path, page: &PageLinks<'_>) -> Result<bool, RewriteError> {
    let bytes = std::fs::read(path).map_err(|source| RewriteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let kind = ContentKind::detect(path, None);
    let decoded = decode_document(&bytes, None);
    let rewritten = match kind {
        ContentKind::Html => rewrite_html(&decoded.text, page)?,
        ContentKind::Css => rewrite_css_urls(&decoded.text, page).into_owned(),
        ContentKind::Other => return Ok(false),
    };
    if rewritten == decoded.text {
        return Ok(false);
    }

    let encoding =
        Encoding::for_label(decoded.encoding_label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (encoded, _, _) = encoding.encode(&rewritten);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    AtomicFileWriter::for_file(path).write(&filename, &encoded)?;
    Ok(true)
}

/// Link conversion pass over a finished mirror. Every downloaded HTML and
/// CSS file is rewritten; a file that can not be rewritten is logged and
/// left untouched. Returns the number of files changed.
pub fn rewrite_mirror(session: &MirrorSession, report: &MirrorReport) -> usize {
    let host_root = session.host_root();
    let mut changed = 0;
    for (url, relative) in &report.link_map {
        let is_document = extension_of(relative)
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| matches!(ext.as_str(), "html" | "htm" | "css"));
        if !is_document {
            continue;
        }
        let Ok(page_url) = Url::parse(report.page_url(url)) else {
            continue;
        };
        let mut path = host_root.clone();
        path.extend(relative.split('/'));

        let page = PageLinks {
            url: &page_url,
            relative,
            link_map: &report.link_map,
        };
        match rewrite_file(&path, &page) {
            Ok(true) => {
                engine_debug!("converted links in {:?}", path);
                changed += 1;
            }
            Ok(false) => {}
            Err(err) => engine_warn!("link conversion skipped {:?}: {}", path, err),
        }
    }
    engine_info!("converted links in {} files", changed);
    changed
}
