use std::path::{Path, PathBuf};

use url::Url;

use crate::filter::extension_of;

pub const INDEX_FILENAME: &str = "index.html";

/// Path of a mirrored URL relative to its host directory, using `/` as the
/// separator: `http://a.com/` -> `index.html`, `http://a.com/dir/` ->
/// `dir/index.html`, and `http://a.com/file` served as HTML -> `file.html`.
pub fn relative_file_path(url: &Url, is_html: bool) -> String {
    let mut relative = path_with_index(url);
    if is_html && !has_html_suffix(&relative) {
        relative.push_str(".html");
    }
    relative
}

/// On-disk location of a mirrored URL: `<root>/<host>/<relative_file_path>`.
pub fn local_path(root: &Path, url: &Url, is_html: bool) -> PathBuf {
    let mut path = root.join(url.host_str().unwrap_or_default());
    for segment in relative_file_path(url, is_html).split('/') {
        path.push(segment);
    }
    path
}

/// Mirror-relative target used when rewriting a link whose file was never
/// downloaded: the URL path with `index.html` substituted, and `.html`
/// appended when the last segment has no extension at all.
pub fn rewrite_target(url: &Url) -> String {
    let mut relative = path_with_index(url);
    if extension_of(&relative).is_none() {
        relative.push_str(".html");
    }
    relative
}

/// File name for a single-file download: the `Content-Disposition`
/// filename, else the last URL path segment, else `index.html`.
pub fn download_filename(url: &Url, content_disposition: Option<&str>) -> String {
    if let Some(name) = content_disposition.and_then(disposition_filename) {
        return name;
    }
    url.path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|last| !last.is_empty())
        .unwrap_or_else(|| INDEX_FILENAME.to_string())
}

/// Extract the `filename` parameter of a `Content-Disposition` header.
///
/// Only the final path component is kept so a hostile header can not
/// escape the output directory.
pub fn disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for param in header.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "filename" => plain = Some(value.trim_matches('"').to_string()),
            "filename*" => {
                // RFC 5987: charset'lang'value; keep the value part only.
                extended = value.rsplit('\'').next().map(str::to_string);
            }
            _ => {}
        }
    }
    extended
        .or(plain)
        .map(|name| {
            name.rsplit(['/', '\\'])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

fn path_with_index(url: &Url) -> String {
    let path = url.path();
    let trimmed = path.trim_start_matches('/');
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let mut relative = segments.join("/");
    if trimmed.is_empty() || path.ends_with('/') {
        if !relative.is_empty() {
            relative.push('/');
        }
        relative.push_str(INDEX_FILENAME);
    }
    relative
}

fn has_html_suffix(path: &str) -> bool {
    extension_of(path).is_some_and(|ext| {
        ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm")
    })
}
