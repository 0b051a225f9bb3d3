//! Audit entry rendering and sinks

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::FIELD_SEPARATOR;

/// How the presented credential appears in audit lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialLogging {
    /// The full credential, as presented.
    #[default]
    Plain,
    /// First four characters followed by `...`.
    Masked,
    /// Replaced by `-`.
    Omit,
}

impl CredentialLogging {
    pub fn render(&self, credential: Option<&str>) -> String {
        let Some(credential) = credential else {
            return "-".to_string();
        };
        match self {
            Self::Plain => credential.to_string(),
            Self::Masked => {
                let head: String = credential.chars().take(4).collect();
                format!("{}...", head)
            }
            Self::Omit => "-".to_string(),
        }
    }
}

/// One audited request.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub credential: Option<String>,
    pub method: String,
    pub endpoint: String,
    pub client_addr: Option<String>,
    /// `allow` or the denial kind, e.g. `INVALID_CREDENTIAL`.
    pub outcome: String,
}

impl AuditEntry {
    /// Render as a single line (no trailing newline). The timestamp always
    /// comes first so retention can filter on it.
    pub fn render(&self, credentials: CredentialLogging) -> String {
        [
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            format!("key={}", credentials.render(self.credential.as_deref())),
            format!("{} {}", self.method, self.endpoint),
            format!("client={}", self.client_addr.as_deref().unwrap_or("-")),
            self.outcome.clone(),
        ]
        .join(FIELD_SEPARATOR)
    }
}

/// Destination for audit entries.
///
/// Recording never fails the request being audited; write errors are logged.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry);

    async fn flush(&self) -> io::Result<()>;
}

/// Emits entries on the `audit` tracing target only.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink {
    credentials: CredentialLogging,
}

impl TracingAuditSink {
    pub fn new(credentials: CredentialLogging) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) {
        info!(
            target: "audit",
            key = %self.credentials.render(entry.credential.as_deref()),
            method = %entry.method,
            endpoint = %entry.endpoint,
            client = entry.client_addr.as_deref().unwrap_or("-"),
            outcome = %entry.outcome,
        );
    }

    async fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Appends rendered entries to a file, one line each.
pub struct FileAuditSink {
    path: PathBuf,
    credentials: CredentialLogging,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open `path` for appending, creating it and its parent directories.
    pub async fn open(path: impl AsRef<Path>, credentials: CredentialLogging) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!("Audit log opened at {}", path.display());
        Ok(Self {
            path,
            credentials,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: &AuditEntry) {
        let mut line = entry.render(self.credentials);
        debug!(target: "audit", "{}", line);
        line.push('\n');

        let mut writer = self.writer.lock().await;
        if let Err(e) = write_line(&mut writer, &line).await {
            warn!("Failed to write audit entry to {}: {}", self.path.display(), e);
        }
    }

    async fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        writer.get_ref().sync_all().await
    }
}

async fn write_line(writer: &mut BufWriter<File>, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(credential: Option<&str>) -> AuditEntry {
        AuditEntry {
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            credential: credential.map(String::from),
            method: "GET".to_string(),
            endpoint: "/api/keys/1".to_string(),
            client_addr: Some("127.0.0.1:5000".to_string()),
            outcome: "allow".to_string(),
        }
    }

    #[test]
    fn renders_all_fields_in_order() {
        let line = entry(Some("abcdefgh")).render(CredentialLogging::Plain);
        assert_eq!(
            line,
            "2024-05-01T10:00:00.000Z | key=abcdefgh | GET /api/keys/1 | client=127.0.0.1:5000 | allow"
        );
    }

    #[test]
    fn credential_rendering_modes() {
        assert_eq!(CredentialLogging::Masked.render(Some("abcdefgh")), "abcd...");
        assert_eq!(CredentialLogging::Omit.render(Some("abcdefgh")), "-");
        assert_eq!(CredentialLogging::Plain.render(None), "-");
    }

    #[tokio::test]
    async fn file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.log");

        let sink = FileAuditSink::open(&path, CredentialLogging::Masked)
            .await
            .unwrap();
        sink.record(&entry(Some("abcdefgh"))).await;
        sink.record(&entry(None)).await;
        sink.flush().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("key=abcd..."));
        assert!(lines[1].contains("key=-"));
    }
}
