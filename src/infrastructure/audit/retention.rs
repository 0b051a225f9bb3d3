//! Retention pruning for the audit log file

use std::io;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tokio::fs;
use tracing::info;

use super::FIELD_SEPARATOR;

/// Outcome of a pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub kept: usize,
    pub removed: usize,
}

/// Rewrite the audit log at `path`, dropping entries older than `retention`.
///
/// Lines whose leading timestamp cannot be parsed are kept. A missing file is
/// not an error. The rewrite goes through a temporary file and a rename, so a
/// sink still holding the old file open keeps appending to the unlinked copy;
/// run this while the server is stopped or restart it afterwards.
pub async fn prune_audit_log(
    path: &Path,
    retention: Duration,
    now: DateTime<Utc>,
) -> io::Result<PruneReport> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PruneReport::default()),
        Err(e) => return Err(e),
    };

    let cutoff = now - retention;
    let mut report = PruneReport::default();
    let mut kept = String::with_capacity(contents.len());

    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        if is_expired(line, cutoff) {
            report.removed += 1;
        } else {
            report.kept += 1;
            kept.push_str(line);
            kept.push('\n');
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    fs::write(tmp_path, kept).await?;
    fs::rename(tmp_path, path).await?;

    info!(
        path = %path.display(),
        kept = report.kept,
        removed = report.removed,
        "Audit log pruned"
    );
    Ok(report)
}

fn is_expired(line: &str, cutoff: DateTime<Utc>) -> bool {
    let stamp = line.split(FIELD_SEPARATOR).next().unwrap_or_default();
    match DateTime::parse_from_rfc3339(stamp.trim()) {
        Ok(ts) => ts.with_timezone(&Utc) < cutoff,
        Err(_) => false,
    }
}
