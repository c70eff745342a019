use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use mirror_core::{parse_rate, Filters, MirrorConfig, DEFAULT_MAX_CONCURRENT};

/// Download files over HTTP(S) or mirror a whole site for offline use.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "wget-mirror", version)]
pub struct Cli {
    /// URLs to download, or the site to mirror with --mirror.
    pub urls: Vec<String>,

    /// Read URLs from a file, one per line.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Save the download under this name (single URL only).
    #[arg(short = 'O', long = "output", value_name = "NAME")]
    pub output: Option<String>,

    /// Directory downloads and mirrors are written to.
    #[arg(short = 'P', long = "path", value_name = "DIR", default_value = ".")]
    pub path: PathBuf,

    /// Cap per-download speed, e.g. 400k or 2M (bytes per second).
    #[arg(long = "rate-limit", value_name = "RATE", value_parser = parse_rate)]
    pub rate_limit: Option<u64>,

    /// Continue in the background, logging to ./wget-log.
    #[arg(short = 'B', long = "background")]
    pub background: bool,

    /// Recursively download every same-domain page and asset.
    #[arg(long)]
    pub mirror: bool,

    /// Rewrite links in mirrored pages to point at the local copies.
    #[arg(long = "convert-links")]
    pub convert_links: bool,

    /// File extensions to skip while mirroring, comma separated.
    #[arg(short = 'R', long = "reject", value_delimiter = ',', value_name = "LIST")]
    pub reject: Vec<String>,

    /// Directories to skip while mirroring, comma separated.
    #[arg(short = 'X', long = "exclude", value_delimiter = ',', value_name = "LIST")]
    pub exclude: Vec<String>,

    /// Minimum delay between two requests while mirroring.
    #[arg(long = "request-interval-ms", value_name = "MS", default_value_t = 250)]
    pub request_interval_ms: u64,

    /// Maximum number of fetches in flight while mirroring.
    #[arg(long = "max-concurrent", value_name = "N", default_value_t = DEFAULT_MAX_CONCURRENT)]
    pub max_concurrent: usize,

    /// Log debug detail.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Positional URLs followed by the non-blank lines of `--input`.
    pub fn collect_urls(&self) -> anyhow::Result<Vec<String>> {
        let mut urls = self.urls.clone();
        if let Some(input) = &self.input {
            let listing = std::fs::read_to_string(input)
                .with_context(|| format!("reading URL list {}", input.display()))?;
            urls.extend(
                listing
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }
        if urls.is_empty() {
            bail!("no URL given; pass one or more URLs or --input <file>");
        }
        if self.output.is_some() {
            if self.mirror {
                bail!("-O can not be combined with --mirror");
            }
            if urls.len() > 1 {
                bail!("-O needs exactly one URL, got {}", urls.len());
            }
        }
        Ok(urls)
    }

    /// Mirror settings for one seed URL.
    pub fn mirror_config(&self, seed: &str) -> MirrorConfig {
        MirrorConfig {
            filters: Filters {
                reject_extensions: trimmed(&self.reject),
                exclude_directories: trimmed(&self.exclude),
            },
            request_interval: Duration::from_millis(self.request_interval_ms),
            bandwidth_limit: self.rate_limit,
            convert_links: self.convert_links,
            max_concurrent: self.max_concurrent,
            ..MirrorConfig::new(seed, &self.path)
        }
    }

    /// Options that only mean something with --mirror.
    pub fn mirror_only_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.convert_links {
            flags.push("--convert-links");
        }
        if !self.reject.is_empty() {
            flags.push("--reject");
        }
        if !self.exclude.is_empty() {
            flags.push("--exclude");
        }
        flags
    }
}

fn trimmed(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("wget-mirror").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn mirror_flags_build_a_config() {
        let cli = parse(&[
            "--mirror",
            "--convert-links",
            "-R",
            "jpg, gif",
            "-X",
            "/img,/private",
            "--rate-limit=400k",
            "-P",
            "out",
            "https://example.com/",
        ]);
        let config = cli.mirror_config("https://example.com/");
        assert_eq!(config.filters.reject_extensions, vec!["jpg", "gif"]);
        assert_eq!(config.filters.exclude_directories, vec!["/img", "/private"]);
        assert_eq!(config.bandwidth_limit, Some(400_000));
        assert_eq!(config.output_root, PathBuf::from("out"));
        assert!(config.convert_links);
        assert_eq!(config.request_interval, Duration::from_millis(250));
    }

    #[test]
    fn bad_rate_is_a_parse_error() {
        let result = Cli::try_parse_from(["wget-mirror", "--rate-limit", "fast", "http://a.com/"]);
        assert!(result.is_err());
    }

    #[test]
    fn output_name_needs_a_single_url() {
        let cli = parse(&["-O", "x.bin", "http://a.com/1", "http://a.com/2"]);
        assert!(cli.collect_urls().is_err());

        let cli = parse(&["-O", "x.bin", "--mirror", "http://a.com/"]);
        assert!(cli.collect_urls().is_err());

        let cli = parse(&["-O", "x.bin", "http://a.com/1"]);
        assert_eq!(cli.collect_urls().unwrap(), vec!["http://a.com/1"]);
    }

    #[test]
    fn input_file_lines_are_appended() {
        let dir = tempfile::TempDir::new().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "http://a.com/x\n\n  http://a.com/y  \n").unwrap();
        let cli = parse(&["-i", list.to_str().unwrap(), "http://a.com/first"]);
        assert_eq!(
            cli.collect_urls().unwrap(),
            vec!["http://a.com/first", "http://a.com/x", "http://a.com/y"]
        );
    }

    #[test]
    fn no_urls_is_an_error() {
        assert!(parse(&[]).collect_urls().is_err());
    }
}
