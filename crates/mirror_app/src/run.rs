use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use engine_logging::engine_warn;
use mirror_core::{format_bytes, is_background, parse_seed_url};
use mirror_engine::{
    download_files, DownloadJob, FetchSettings, MirrorEngine, NullProgressSink, ProgressSink,
    ReqwestFetcher,
};

use crate::cli::Cli;
use crate::progress::ConsoleProgress;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Run the requested downloads. Only configuration problems are errors;
/// individual URLs that fail are reported and skipped.
pub async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let urls = cli.collect_urls()?;
    let sink: Arc<dyn ProgressSink> = if is_background() {
        Arc::new(NullProgressSink)
    } else {
        Arc::new(ConsoleProgress)
    };
    let fetcher =
        Arc::new(ReqwestFetcher::new(FetchSettings::default()).context("building HTTP client")?);

    println!("#Start time: {}", timestamp());
    if cli.mirror {
        mirror_sites(cli, &urls, fetcher, sink).await?;
    } else {
        download_urls(cli, &urls, &fetcher, sink.as_ref()).await?;
    }
    println!("#End time: {}", timestamp());
    Ok(())
}

async fn mirror_sites(
    cli: &Cli,
    seeds: &[String],
    fetcher: Arc<ReqwestFetcher>,
    sink: Arc<dyn ProgressSink>,
) -> anyhow::Result<()> {
    for seed in seeds {
        let session = cli
            .mirror_config(seed)
            .into_session()
            .with_context(|| format!("cannot mirror {seed}"))?;
        let engine = MirrorEngine::new(session, fetcher.clone()).with_progress(Arc::clone(&sink));
        let report = engine
            .run()
            .await
            .with_context(|| format!("mirroring {seed}"))?;
        println!("{seed}: {}", report.summary());
    }
    Ok(())
}

async fn download_urls(
    cli: &Cli,
    urls: &[String],
    fetcher: &ReqwestFetcher,
    sink: &dyn ProgressSink,
) -> anyhow::Result<()> {
    let ignored = cli.mirror_only_flags();
    if !ignored.is_empty() {
        engine_warn!("{} only apply together with --mirror", ignored.join(", "));
    }

    let jobs = urls
        .iter()
        .map(|raw| {
            let url = parse_seed_url(raw).with_context(|| format!("cannot download {raw}"))?;
            Ok(DownloadJob {
                url,
                output_name: cli.output.clone(),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let results = download_files(fetcher, &jobs, &cli.path, cli.rate_limit, sink)
        .await
        .with_context(|| format!("preparing {}", cli.path.display()))?;

    let saved: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok()).collect();
    let bytes: u64 = saved.iter().map(|file| file.bytes_written).sum();
    println!("#Files: {}", saved.len());
    println!(
        "{} downloaded ({}), {} failed",
        saved.len(),
        format_bytes(bytes),
        results.len() - saved.len()
    );
    Ok(())
}
