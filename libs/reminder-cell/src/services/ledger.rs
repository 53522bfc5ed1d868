use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use crate::models::{ReminderRecord, ReminderStatus};

/// Append-only record of reminder attempts. Any existing record for a pair
/// (success or error) excludes it from re-selection; errors are surfaced for
/// operators rather than retried automatically.
#[async_trait]
pub trait ReminderLedger: Send + Sync {
    /// Is there any record for this appointment under this template key?
    async fn has_record(&self, appointment_id: &str, template_key: &str) -> Result<bool>;

    async fn append(&self, record: ReminderRecord) -> Result<()>;
}

/// JSON-lines file ledger. One line per attempt, never rewritten.
pub struct FileLedger {
    path: PathBuf,
    // Serializes appends so concurrent writers cannot interleave lines.
    write_lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<ReminderRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to read reminder ledger"),
        };

        let mut records = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str::<ReminderRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed ledger line: {}", e),
            }
        }
        Ok(records)
    }

    /// Is there a successful record for this appointment under this key?
    pub async fn has_success(&self, appointment_id: &str, template_key: &str) -> Result<bool> {
        Ok(self.load().await?.iter().any(|r| {
            r.appointment_id == appointment_id
                && r.template_key == template_key
                && r.status == ReminderStatus::Success
        }))
    }
}

#[async_trait]
impl ReminderLedger for FileLedger {
    async fn has_record(&self, appointment_id: &str, template_key: &str) -> Result<bool> {
        Ok(self
            .load()
            .await?
            .iter()
            .any(|r| r.appointment_id == appointment_id && r.template_key == template_key))
    }

    async fn append(&self, record: ReminderRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create ledger directory")?;
            }
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open reminder ledger")?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// In-memory ledger for tests.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<ReminderRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ReminderRecord> {
        self.records.lock().await.clone()
    }

    /// Is there a successful record for this appointment under this key?
    pub async fn has_success(&self, appointment_id: &str, template_key: &str) -> Result<bool> {
        Ok(self.records.lock().await.iter().any(|r| {
            r.appointment_id == appointment_id
                && r.template_key == template_key
                && r.status == ReminderStatus::Success
        }))
    }
}

#[async_trait]
impl ReminderLedger for MemoryLedger {
    async fn has_record(&self, appointment_id: &str, template_key: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .any(|r| r.appointment_id == appointment_id && r.template_key == template_key))
    }

    async fn append(&self, record: ReminderRecord) -> Result<()> {
        self.records.lock().await.push(record);
        Ok(())
    }
}
