//! Central audit log
//!
//! One text object shared by every run. Appends read the whole object and
//! write it back with the new line, so two processes appending at the same
//! moment can lose a line. Appends from one process are serialized through
//! the handle's lock.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::kind::FileKind;
use crate::storage::LogObjectStore;

/// Timestamp layout used in log lines and notifications
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Handle to a central log that is known to exist
#[derive(Clone)]
pub struct LogHandle {
    store: Arc<dyn LogObjectStore>,
    write_lock: Arc<Mutex<()>>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CentralLogger;

impl CentralLogger {
    pub fn new() -> Self {
        Self
    }

    /// Create the log as an empty object if it does not exist yet
    #[instrument(skip_all)]
    pub async fn ensure_log(&self, store: Arc<dyn LogObjectStore>) -> Result<LogHandle> {
        if !store.exists().await.context("Failed to check central log")? {
            info!("Central log missing, creating it");
            store
                .write_text("")
                .await
                .context("Failed to create central log")?;
        }

        Ok(LogHandle {
            store,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Append `line` plus a line feed by rewriting the whole object
    #[instrument(skip(self, handle))]
    pub async fn append(&self, handle: &LogHandle, line: &str) -> Result<()> {
        let _guard = handle.write_lock.lock().await;

        let mut contents = handle
            .store
            .read_text()
            .await
            .context("Failed to read central log")?;
        contents.push_str(line);
        contents.push('\n');

        handle
            .store
            .write_text(&contents)
            .await
            .context("Failed to write central log")?;

        debug!("Central log now {} bytes", contents.len());
        Ok(())
    }
}

/// `"{timestamp} {kind} File, Reference number is {n}, Last Record is {content}"`
pub fn format_entry(
    at: DateTime<Local>,
    kind: FileKind,
    reference_number: u32,
    content: &str,
) -> String {
    format!(
        "{} {} File, Reference number is {}, Last Record is {}",
        at.format(TIMESTAMP_FORMAT),
        kind.log_label(),
        reference_number,
        content
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::LocalLogObject;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_format_entry() {
        let at = Local.with_ymd_and_hms(2026, 10, 19, 8, 5, 0).unwrap();
        assert_eq!(
            format_entry(at, FileKind::DelimitedText, 1, "2,20"),
            "2026-10-19 08:05:00 CSV File, Reference number is 1, Last Record is 2,20"
        );
        assert_eq!(
            format_entry(at, FileKind::Spreadsheet, 3, ""),
            "2026-10-19 08:05:00 Excel File, Reference number is 3, Last Record is "
        );
    }

    #[tokio::test]
    async fn test_ensure_log_creates_empty_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("central.log");
        let logger = CentralLogger::new();

        let handle = logger
            .ensure_log(Arc::new(LocalLogObject::new(&path)))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        logger.append(&handle, "first").await.unwrap();

        // a second bootstrap must not truncate
        logger
            .ensure_log(Arc::new(LocalLogObject::new(&path)))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\n");
    }

    #[tokio::test]
    async fn test_append_preserves_existing_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("central.log");
        std::fs::write(&path, "older\n").unwrap();

        let logger = CentralLogger::new();
        let handle = logger
            .ensure_log(Arc::new(LocalLogObject::new(&path)))
            .await
            .unwrap();

        logger.append(&handle, "a").await.unwrap();
        logger.append(&handle, "b").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "older\na\nb\n");
    }

    #[tokio::test]
    async fn test_concurrent_appends_in_one_process_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("central.log");
        let logger = CentralLogger::new();
        let handle = logger
            .ensure_log(Arc::new(LocalLogObject::new(&path)))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    CentralLogger::new()
                        .append(&handle, &format!("line {}", i))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 8);
    }
}
