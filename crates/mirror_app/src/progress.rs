use mirror_core::format_bytes;
use mirror_engine::{EngineEvent, FailureKind, ProgressSink};

/// Prints one line per finished download for an interactive run.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&self, event: EngineEvent) {
        match completion_line(&event) {
            Some(Ok(line)) => println!("{line}"),
            Some(Err(line)) => eprintln!("{line}"),
            None => {}
        }
    }
}

/// `Ok` lines go to stdout, `Err` lines to stderr.
fn completion_line(event: &EngineEvent) -> Option<Result<String, String>> {
    let EngineEvent::JobCompleted { url, result, .. } = event else {
        return None;
    };
    Some(match result {
        Ok(outcome) => Ok(format!(
            "saved {url} -> {} [{}]",
            outcome.path.display(),
            format_bytes(outcome.bytes_written)
        )),
        Err(FailureKind::Rejected { .. }) => Ok(format!("skipped {url} (rejected)")),
        Err(FailureKind::OffDomainRedirect) => Ok(format!("skipped {url} (redirected off site)")),
        Err(kind) => Err(format!("failed {url}: {kind}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_engine::{JobOutcome, JobProgress, Stage};

    #[test]
    fn only_completions_are_printed() {
        let progress = EngineEvent::Progress(JobProgress {
            job_id: 1,
            stage: Stage::Downloading,
            bytes: Some(10),
            total: None,
        });
        assert_eq!(completion_line(&progress), None);

        let saved = EngineEvent::JobCompleted {
            job_id: 1,
            url: "http://a.com/logo.png".to_string(),
            result: Ok(JobOutcome {
                path: "out/a.com/logo.png".into(),
                bytes_written: 2_500,
            }),
        };
        assert_eq!(
            completion_line(&saved),
            Some(Ok("saved http://a.com/logo.png -> out/a.com/logo.png [2.5 kB]".to_string()))
        );

        let failed = EngineEvent::JobCompleted {
            job_id: 2,
            url: "http://a.com/gone".to_string(),
            result: Err(FailureKind::HttpStatus(404)),
        };
        assert_eq!(
            completion_line(&failed),
            Some(Err("failed http://a.com/gone: http status 404".to_string()))
        );

        let moved = EngineEvent::JobCompleted {
            job_id: 3,
            url: "http://a.com/away".to_string(),
            result: Err(FailureKind::OffDomainRedirect),
        };
        assert_eq!(
            completion_line(&moved),
            Some(Ok("skipped http://a.com/away (redirected off site)".to_string()))
        );
    }
}
