use std::collections::BTreeMap;
use std::fs;

use mirror_core::{MirrorConfig, MirrorReport};
use mirror_engine::{rewrite_css_urls, rewrite_file, rewrite_html, rewrite_mirror, PageLinks};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use url::Url;

fn link_map() -> BTreeMap<String, String> {
    [
        ("http://a.com/", "index.html"),
        ("http://a.com/about", "about.html"),
        ("http://a.com/img/logo.png", "img/logo.png"),
        ("http://a.com/blog/post", "blog/post.html"),
        ("http://a.com/css/site.css", "css/site.css"),
    ]
    .into_iter()
    .map(|(url, path)| (url.to_string(), path.to_string()))
    .collect()
}

#[test]
fn root_page_links_become_relative() {
    let map = link_map();
    let url = Url::parse("http://a.com/").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "index.html",
        link_map: &map,
    };
    let html = r#"<html><body><a href="/about">About</a><img src="http://a.com/img/logo.png"><a href="https://b.com/x">ext</a><a href="/missing/">m</a></body></html>"#;

    let rewritten = rewrite_html(html, &page).unwrap();
    assert_eq!(
        rewritten,
        r#"<html><body><a href="about.html">About</a><img src="img/logo.png"><a href="https://b.com/x">ext</a><a href="missing/index.html">m</a></body></html>"#
    );
}

#[test]
fn nested_page_links_climb_and_keep_fragments() {
    let map = link_map();
    let url = Url::parse("http://a.com/blog/post").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "blog/post.html",
        link_map: &map,
    };
    let html = r##"<a href="/about#team">t</a><a href="other">o</a><link href="/css/site.css"><a href="#local">l</a>"##;

    let rewritten = rewrite_html(html, &page).unwrap();
    assert_eq!(
        rewritten,
        r##"<a href="../about.html#team">t</a><a href="other.html">o</a><link href="../css/site.css"><a href="#local">l</a>"##
    );
}

#[test]
fn rewriting_twice_changes_nothing() {
    let map = link_map();
    let url = Url::parse("http://a.com/blog/post").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "blog/post.html",
        link_map: &map,
    };
    let html = r#"<html><head><style>h1 { background: url(/img/logo.png) }</style></head>
<body><a href="/">home</a><a href="/about#x">about</a><img src="/img/logo.png"><a href="/docs/">docs</a></body></html>"#;

    let once = rewrite_html(html, &page).unwrap();
    let twice = rewrite_html(&once, &page).unwrap();
    assert_ne!(once, html);
    assert_eq!(twice, once);
}

#[test]
fn stylesheet_urls_are_rewritten_relative_to_the_stylesheet() {
    let map = link_map();
    let url = Url::parse("http://a.com/css/site.css").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "css/site.css",
        link_map: &map,
    };
    let css = "body { background: url('/img/logo.png'); } .x { background: url(https://cdn.net/a.png); }";

    let rewritten = rewrite_css_urls(css, &page);
    assert_eq!(
        rewritten,
        "body { background: url('../img/logo.png'); } .x { background: url(https://cdn.net/a.png); }"
    );
    assert_eq!(rewrite_css_urls(&rewritten, &page), rewritten);
}

#[test]
fn absolute_css_paths_at_the_root_become_dot_relative() {
    let map = link_map();
    let url = Url::parse("http://a.com/main.css").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "main.css",
        link_map: &map,
    };
    let rewritten = rewrite_css_urls("a { b: url(/img/logo.png) }", &page);
    assert_eq!(rewritten, "a { b: url(./img/logo.png) }");
}

#[test]
fn rewrite_file_reports_whether_it_changed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.html");
    fs::write(&path, r#"<a href="/about">About</a>"#).unwrap();

    let map = link_map();
    let url = Url::parse("http://a.com/").unwrap();
    let page = PageLinks {
        url: &url,
        relative: "index.html",
        link_map: &map,
    };

    assert!(rewrite_file(&path, &page).unwrap());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        r#"<a href="about.html">About</a>"#
    );
    assert!(!rewrite_file(&path, &page).unwrap());
}

#[test]
fn rewrite_mirror_converts_downloaded_documents_only() {
    let out = TempDir::new().unwrap();
    let session = MirrorConfig::new("http://a.com/", out.path())
        .into_session()
        .unwrap();
    let host = session.host_root();
    fs::create_dir_all(host.join("img")).unwrap();
    fs::create_dir_all(host.join("css")).unwrap();
    fs::write(
        host.join("index.html"),
        r#"<a href="/about">About</a><img src="/img/logo.png">"#,
    )
    .unwrap();
    fs::write(host.join("about.html"), r#"<a href="/">Home</a>"#).unwrap();
    fs::write(host.join("css/site.css"), "p { background: url(/img/logo.png) }").unwrap();
    fs::write(host.join("img/logo.png"), b"url(/img/logo.png)").unwrap();

    let mut report = MirrorReport::default();
    report.link_map.insert("http://a.com/".into(), "index.html".into());
    report.link_map.insert("http://a.com/about".into(), "about.html".into());
    report
        .link_map
        .insert("http://a.com/css/site.css".into(), "css/site.css".into());
    report
        .link_map
        .insert("http://a.com/img/logo.png".into(), "img/logo.png".into());

    assert_eq!(rewrite_mirror(&session, &report), 3);
    assert_eq!(
        fs::read_to_string(host.join("index.html")).unwrap(),
        r#"<a href="about.html">About</a><img src="img/logo.png">"#
    );
    assert_eq!(
        fs::read_to_string(host.join("about.html")).unwrap(),
        r#"<a href="index.html">Home</a>"#
    );
    assert_eq!(
        fs::read_to_string(host.join("css/site.css")).unwrap(),
        "p { background: url(../img/logo.png) }"
    );
    assert_eq!(fs::read(host.join("img/logo.png")).unwrap(), b"url(/img/logo.png)");

    assert_eq!(rewrite_mirror(&session, &report), 0);
}
