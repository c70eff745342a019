use std::path::PathBuf;
use std::time::Duration;

use mirror_core::{
    format_bytes, parse_rate, MirrorConfig, MirrorReport, Outcome, RateParseError,
    SessionError, SkipReason,
};

#[test]
fn rates_use_decimal_suffixes() {
    assert_eq!(parse_rate("400k"), Ok(400_000));
    assert_eq!(parse_rate("2M"), Ok(2_000_000));
    assert_eq!(parse_rate("1.5m"), Ok(1_500_000));
    assert_eq!(parse_rate("1g"), Ok(1_000_000_000));
    assert_eq!(parse_rate("800"), Ok(800));
    assert_eq!(parse_rate(" 64B "), Ok(64));
}

#[test]
fn malformed_rates_are_rejected() {
    assert_eq!(parse_rate(""), Err(RateParseError::Empty));
    assert_eq!(parse_rate("12x"), Err(RateParseError::UnknownSuffix('x')));
    assert!(matches!(parse_rate("k"), Err(RateParseError::Invalid(_))));
    assert!(matches!(parse_rate("-3k"), Err(RateParseError::Invalid(_))));
    assert!(matches!(parse_rate("0k"), Err(RateParseError::Invalid(_))));
}

#[test]
fn byte_formatting_scales_units() {
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1_000), "1.0 kB");
    assert_eq!(format_bytes(2_500_000), "2.5 MB");
    assert_eq!(format_bytes(1_000_000_000), "1.0 GB");
}

#[test]
fn config_defaults_match_documented_values() {
    let config = MirrorConfig::new("http://a.com/", "out");
    assert_eq!(config.request_interval, Duration::from_millis(250));
    assert_eq!(config.bandwidth_limit, None);
    assert!(!config.convert_links);
}

#[test]
fn session_requires_http_seed_with_host() {
    let session = MirrorConfig::new("https://a.com/docs/", "out")
        .into_session()
        .unwrap();
    assert_eq!(session.base_url.host_str(), Some("a.com"));
    assert_eq!(session.host_root(), PathBuf::from("out/a.com"));

    assert!(matches!(
        MirrorConfig::new("not a url", "out").into_session(),
        Err(SessionError::InvalidUrl { .. })
    ));
    assert!(matches!(
        MirrorConfig::new("ftp://a.com/", "out").into_session(),
        Err(SessionError::UnsupportedScheme { .. })
    ));
}

#[test]
fn zero_bandwidth_means_unbounded() {
    let mut config = MirrorConfig::new("http://a.com/", "out");
    config.bandwidth_limit = Some(0);
    assert_eq!(config.into_session().unwrap().bandwidth_limit, None);
}

#[test]
fn zero_concurrency_is_a_config_error() {
    let mut config = MirrorConfig::new("http://a.com/", "out");
    config.max_concurrent = 0;
    assert_eq!(config.into_session(), Err(SessionError::ZeroConcurrency));
}

#[test]
fn report_tallies_each_outcome_kind() {
    engine_logging::initialize_for_tests();
    let mut report = MirrorReport::default();
    report.record(
        "http://a.com/",
        &Outcome::Succeeded {
            path: PathBuf::from("out/a.com/index.html"),
            relative: "index.html".into(),
            bytes: 1_200,
            redirected_to: None,
        },
    );
    report.record(
        "http://a.com/gone",
        &Outcome::Failed {
            reason: "http status 404".into(),
        },
    );
    report.record("http://a.com/", &Outcome::Skipped(SkipReason::Duplicate));
    report.record(
        "http://a.com/x.png",
        &Outcome::Skipped(SkipReason::RejectedExtension),
    );

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.fetched(), 2);
    assert_eq!(report.link_map.get("http://a.com/").map(String::as_str), Some("index.html"));
    assert_eq!(report.summary(), "1 downloaded (1.2 kB), 1 failed, 1 skipped");
}

#[test]
fn redirected_download_is_reachable_under_both_urls() {
    let mut report = MirrorReport::default();
    report.record(
        "http://a.com/docs",
        &Outcome::Succeeded {
            path: PathBuf::from("out/a.com/docs.html"),
            relative: "docs.html".into(),
            bytes: 10,
            redirected_to: Some("http://a.com/docs/".into()),
        },
    );

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.link_map.get("http://a.com/docs").map(String::as_str), Some("docs.html"));
    assert_eq!(report.link_map.get("http://a.com/docs/").map(String::as_str), Some("docs.html"));
    assert_eq!(report.page_url("http://a.com/docs"), "http://a.com/docs/");
    assert_eq!(report.page_url("http://a.com/"), "http://a.com/");
}
