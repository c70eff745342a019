use url::Url;

/// True if the URL path contains the excluded directory as a run of whole
/// path segments. `img`, `/img` and `/img/` all exclude `/img/logo.png`
/// and `/static/img/a.png`, but not `/images/a.png`.
pub fn excluded_by_directory(url_path: &str, excluded_dirs: &[String]) -> bool {
    let segments: Vec<&str> = url_path.split('/').filter(|s| !s.is_empty()).collect();
    excluded_dirs.iter().any(|dir| {
        let wanted: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
        if wanted.is_empty() || wanted.len() > segments.len() {
            return false;
        }
        // the last segment is the file itself unless the path ends in '/'
        let dir_segments = if url_path.ends_with('/') {
            &segments[..]
        } else {
            &segments[..segments.len().saturating_sub(1)]
        };
        dir_segments
            .windows(wanted.len())
            .any(|window| window == wanted.as_slice())
    })
}

/// True if the filename carries a rejected extension, or the content type
/// (ignoring parameters) ends with a rejected suffix token.
///
/// Rejected entries may be written with or without a leading dot.
pub fn excluded_by_extension(
    filename: &str,
    content_type: Option<&str>,
    rejected_extensions: &[String],
) -> bool {
    let ext = extension_of(filename).map(|e| e.to_ascii_lowercase());
    let mime = content_type.map(|ct| {
        ct.split(';')
            .next()
            .unwrap_or(ct)
            .trim()
            .to_ascii_lowercase()
    });

    rejected_extensions.iter().any(|rejected| {
        let token = rejected.trim().trim_start_matches('.').to_ascii_lowercase();
        if token.is_empty() {
            return false;
        }
        if ext.as_deref() == Some(token.as_str()) {
            return true;
        }
        match mime.as_deref() {
            Some(mime) if !mime.is_empty() => {
                mime.ends_with(&format!("/{token}"))
                    || mime.ends_with(&format!("+{token}"))
                    || mime.ends_with(&format!("-{token}"))
                    || mime.ends_with(&format!(".{token}"))
            }
            _ => false,
        }
    })
}

/// Hostname equality, ignoring scheme and port.
pub fn same_domain(base: &Url, candidate: &Url) -> bool {
    match (base.host_str(), candidate.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Extension of the last path component, without the dot.
pub fn extension_of(filename: &str) -> Option<&str> {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 < name.len() => Some(&name[idx + 1..]),
        Some(_) => None,
    }
}

/// Whether a content type names an HTML document.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .is_some_and(|ct| ct == "text/html" || ct == "application/xhtml+xml")
}
