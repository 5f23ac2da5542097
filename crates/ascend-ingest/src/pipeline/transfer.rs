//! Copy-then-verify transfer between two directory endpoints
//!
//! The coordinator never deletes the source. Deleting is the caller's call,
//! made only on [`TransferOutcome::Verified`], so a crash between copy and
//! delete leaves both copies in place rather than none.

use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::storage::DirectoryEndpoint;

/// Result of one transfer attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Destination confirmed present right after the copy
    Verified,
    /// Nothing to copy; destination untouched
    SourceMissing,
    /// Copy was issued but the destination could not be confirmed
    Unconfirmed(String),
}

impl TransferOutcome {
    /// The only signal that deleting the source is safe
    pub fn is_verified(&self) -> bool {
        matches!(self, TransferOutcome::Verified)
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Verified => f.write_str("verified"),
            TransferOutcome::SourceMissing => f.write_str("source missing"),
            TransferOutcome::Unconfirmed(reason) => write!(f, "unconfirmed: {}", reason),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TransferCoordinator;

impl TransferCoordinator {
    pub fn new() -> Self {
        Self
    }

    /// Copy `source_path` on `source` to `dest_path` on `dest`
    ///
    /// Storage errors are folded into the outcome; nothing propagates.
    #[instrument(skip(self, source, dest))]
    pub async fn transfer(
        &self,
        source: &dyn DirectoryEndpoint,
        source_path: &str,
        dest: &dyn DirectoryEndpoint,
        dest_path: &str,
    ) -> TransferOutcome {
        match source.exists(source_path).await {
            Ok(true) => {},
            Ok(false) => {
                debug!("Source {} does not exist, skipping copy", source_path);
                return TransferOutcome::SourceMissing;
            },
            Err(e) => {
                warn!(error = %e, "Could not confirm source {} exists", source_path);
                return TransferOutcome::SourceMissing;
            },
        }

        // A rejected copy still falls through to the existence check below.
        if let Err(e) = dest.copy_from(&source.copy_source(source_path), dest_path).await {
            let reason = format!("{:#}", e);
            warn!(error = %reason, "Copy to {} was rejected", dest_path);
        }

        match dest.exists(dest_path).await {
            Ok(true) => {
                info!("Transferred {} to {}", source_path, dest_path);
                TransferOutcome::Verified
            },
            Ok(false) => TransferOutcome::Unconfirmed(format!("{} not found after copy", dest_path)),
            Err(e) => TransferOutcome::Unconfirmed(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::LocalEndpoint;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_transfer_verifies_destination() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(src_dir.path().join("in")).unwrap();
        std::fs::write(src_dir.path().join("in/a.csv"), b"id\n1").unwrap();

        let source = LocalEndpoint::new(src_dir.path());
        let dest = LocalEndpoint::new(dst_dir.path());

        let outcome = TransferCoordinator::new()
            .transfer(&source, "in/a.csv", &dest, "out/a.csv")
            .await;

        assert!(outcome.is_verified());
        assert_eq!(std::fs::read(dst_dir.path().join("out/a.csv")).unwrap(), b"id\n1");
        // the coordinator leaves the source alone
        assert!(src_dir.path().join("in/a.csv").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_a_no_op() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();

        let source = LocalEndpoint::new(src_dir.path());
        let dest = LocalEndpoint::new(dst_dir.path());

        let outcome = TransferCoordinator::new()
            .transfer(&source, "in/a.csv", &dest, "out/a.csv")
            .await;

        assert_eq!(outcome, TransferOutcome::SourceMissing);
        assert!(!outcome.is_verified());
        assert_eq!(std::fs::read_dir(dst_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(TransferOutcome::Verified.to_string(), "verified");
        assert_eq!(
            TransferOutcome::Unconfirmed("gone".to_string()).to_string(),
            "unconfirmed: gone"
        );
    }
}
