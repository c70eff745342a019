use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use engine_logging::LOG_FILENAME;
use mirror_core::BACKGROUND_ENV;

/// Start a detached copy of this process with the same arguments minus the
/// background flag. Its output goes to `wget-log` in `dir`. Returns the pid.
pub fn relaunch(dir: &Path) -> anyhow::Result<u32> {
    let exe = std::env::current_exe().context("locating the running executable")?;
    let args: Vec<OsString> = std::env::args_os()
        .skip(1)
        .filter_map(|arg| without_background_flag(&arg))
        .collect();

    let log_path = dir.join(LOG_FILENAME);
    let log = File::create(&log_path)
        .with_context(|| format!("creating {}", log_path.display()))?;
    let log_err = log
        .try_clone()
        .with_context(|| format!("duplicating handle to {}", log_path.display()))?;

    let child = Command::new(exe)
        .args(args)
        .env(BACKGROUND_ENV, "1")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .spawn()
        .context("starting background process")?;
    Ok(child.id())
}

/// The argument with `-B`/`--background` removed; `None` when nothing is
/// left. Short flag clusters such as `-vB` keep their other flags.
fn without_background_flag(arg: &OsStr) -> Option<OsString> {
    let Some(text) = arg.to_str() else {
        return Some(arg.to_os_string());
    };
    if text == "--background" {
        return None;
    }
    let is_flag_cluster = text.len() > 1
        && text.starts_with('-')
        && !text.starts_with("--")
        && text[1..].chars().all(|c| c == 'B' || c == 'v');
    if !is_flag_cluster {
        return Some(arg.to_os_string());
    }
    let rest: String = text[1..].chars().filter(|c| *c != 'B').collect();
    (!rest.is_empty()).then(|| OsString::from(format!("-{rest}")))
}
