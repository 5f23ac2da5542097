//! File ingestion pipeline
//!
//! One pass lists the source directory and walks every supported file
//! through the same linear sequence:
//!
//! ```text
//! classify -> extract -> log -> transfer -> (delete) -> resolve title -> notify
//! ```
//!
//! Files are processed strictly one after another. Every per-file failure is
//! absorbed so the next file still runs; only listing the source and
//! bootstrapping the central log can abort a pass.
//!
//! A file whose copy verified but whose delete failed stays in the source and
//! is picked up again, and copied again, on the next pass.

use anyhow::{Context, Result};
use chrono::Local;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

pub mod central_log;
pub mod extract;
pub mod kind;
pub mod notify;
pub mod title;
pub mod transfer;

pub use central_log::{CentralLogger, LogHandle};
pub use extract::RecordExtractor;
pub use kind::{FileEntry, FileKind};
pub use notify::{MailTransport, NotificationDispatcher, OutgoingMail, SmtpMailer};
pub use title::{TitleResolver, TITLE_NOT_FOUND};
pub use transfer::{TransferCoordinator, TransferOutcome};

use crate::config::IngestSettings;
use crate::storage::{self, join_path, DirectoryEndpoint, LogObjectStore};

/// Per-pass state threaded through file processing
///
/// Reference numbers start at 1 and grow by one per supported file. They are
/// not tied to file identity: the same file can get a different number on
/// the next pass.
#[derive(Debug, Default)]
pub struct RunContext {
    reference_number: u32,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_reference(&mut self) -> u32 {
        self.reference_number += 1;
        self.reference_number
    }

    pub fn current(&self) -> u32 {
        self.reference_number
    }
}

/// What one pass did, for diagnostics only
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub skipped: usize,
    pub processed: usize,
    pub transferred: usize,
    pub deleted: usize,
    /// Another pass in this process held the run lease
    pub overlapped: bool,
}

/// Endpoints one pipeline instance reads from and writes to
#[derive(Clone)]
pub struct PipelineEndpoints {
    pub source: Arc<dyn DirectoryEndpoint>,
    pub source_dir: String,
    pub destination: Arc<dyn DirectoryEndpoint>,
    pub destination_dir: String,
    pub log: Arc<dyn LogObjectStore>,
}

struct FileResult {
    transferred: bool,
    deleted: bool,
}

pub struct IngestPipeline {
    endpoints: PipelineEndpoints,
    csv_enabled: bool,
    extractor: RecordExtractor,
    transfers: TransferCoordinator,
    logger: CentralLogger,
    titles: TitleResolver,
    notifier: NotificationDispatcher,
    run_lease: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(
        endpoints: PipelineEndpoints,
        titles: TitleResolver,
        notifier: NotificationDispatcher,
        csv_enabled: bool,
    ) -> Self {
        Self {
            endpoints,
            csv_enabled,
            extractor: RecordExtractor::new(),
            transfers: TransferCoordinator::new(),
            logger: CentralLogger::new(),
            titles,
            notifier,
            run_lease: Mutex::new(()),
        }
    }

    /// Wire up storage, title lookup and SMTP from loaded settings
    pub fn from_settings(settings: &IngestSettings) -> Result<Self> {
        let credentials = settings.credentials.as_ref();
        let endpoints = PipelineEndpoints {
            source: storage::open_endpoint(&settings.source, credentials)?,
            source_dir: settings.source.directory.clone(),
            destination: storage::open_endpoint(&settings.destination, credentials)?,
            destination_dir: settings.destination.directory.clone(),
            log: storage::open_log_object(&settings.log, credentials)?,
        };

        let mailer = Arc::new(SmtpMailer::new(&settings.mail)?);

        Ok(Self::new(
            endpoints,
            TitleResolver::new(settings.title_endpoint.clone()),
            NotificationDispatcher::new(mailer, &settings.mail),
            settings.csv_enabled,
        ))
    }

    /// Run one pass over the source directory
    pub async fn run_once(&self) -> Result<RunReport> {
        let Ok(_lease) = self.run_lease.try_lock() else {
            warn!("Previous pass still running, skipping this trigger");
            return Ok(RunReport {
                overlapped: true,
                ..Default::default()
            });
        };

        info!("Starting ingestion pass");

        let log = self
            .logger
            .ensure_log(self.endpoints.log.clone())
            .await
            .context("Failed to bootstrap central log")?;

        let names = self
            .endpoints
            .source
            .list_files(&self.endpoints.source_dir)
            .await
            .context("Failed to list source directory")?;

        let mut context = RunContext::new();
        let mut report = RunReport {
            discovered: names.len(),
            ..Default::default()
        };

        for name in names {
            let entry = FileEntry::new(name);
            let kind = entry.kind(self.csv_enabled);

            if !kind.is_supported() {
                debug!("Skipping unsupported file {}", entry.name);
                report.skipped += 1;
                continue;
            }

            let reference = context.next_reference();
            let span = info_span!("file", name = %entry.name, reference);
            let result = self
                .process_file(&log, &entry, kind, reference)
                .instrument(span)
                .await;

            report.processed += 1;
            report.transferred += usize::from(result.transferred);
            report.deleted += usize::from(result.deleted);
        }

        info!(
            "Ingestion pass complete: {} discovered, {} skipped, {} processed, {} transferred, {} deleted",
            report.discovered, report.skipped, report.processed, report.transferred, report.deleted
        );

        Ok(report)
    }

    async fn process_file(
        &self,
        log: &LogHandle,
        entry: &FileEntry,
        kind: FileKind,
        reference: u32,
    ) -> FileResult {
        let endpoints = &self.endpoints;
        let source_path = join_path(&endpoints.source_dir, &entry.name);
        let dest_path = join_path(&endpoints.destination_dir, &entry.name);

        let record = self
            .extractor
            .extract_last_record(endpoints.source.as_ref(), &source_path, kind)
            .await;

        let line = central_log::format_entry(Local::now(), kind, reference, &record);
        if let Err(e) = self.logger.append(log, &line).await {
            let reason = format!("{:#}", e);
            warn!(error = %reason, "Failed to append to central log");
        }

        let outcome = self
            .transfers
            .transfer(
                endpoints.source.as_ref(),
                &source_path,
                endpoints.destination.as_ref(),
                &dest_path,
            )
            .await;

        let mut deleted = false;
        if outcome.is_verified() {
            match endpoints.source.delete(&source_path).await {
                Ok(()) => deleted = true,
                Err(e) => warn!(error = %e, "Source delete failed; file will be reprocessed next pass"),
            }
        } else {
            warn!("Transfer not verified ({}), source retained", outcome);
        }

        let title = self.titles.resolve_title(reference).await;

        if !self.notifier.notify(reference, &title).await {
            debug!("Notification for reference {} was not delivered", reference);
        }

        FileResult {
            transferred: outcome.is_verified(),
            deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_context_starts_at_one() {
        let mut context = RunContext::new();
        assert_eq!(context.current(), 0);
        assert_eq!(context.next_reference(), 1);
        assert_eq!(context.next_reference(), 2);
        assert_eq!(context.current(), 2);
    }
}
