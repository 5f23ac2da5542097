//! Last-record extraction
//!
//! Extraction is best-effort metadata for the central log, never the item of
//! record. [`RecordExtractor::try_extract`] reports why it failed;
//! [`RecordExtractor::extract_last_record`] folds every failure into an empty
//! string.

use ascend_common::{AscendError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDateTime, Timelike};
use std::io::Cursor;
use std::iter;
use tracing::{debug, instrument, warn};

use super::kind::FileKind;
use crate::storage::DirectoryEndpoint;

/// Bytes read from the end of a delimited-text file.
///
/// A final record longer than this comes back truncated to its last
/// `TAIL_WINDOW` bytes. The whole file is never downloaded.
pub const TAIL_WINDOW: u64 = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct RecordExtractor;

impl RecordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Last record of `path`, or an empty string on any failure
    pub async fn extract_last_record(
        &self,
        endpoint: &dyn DirectoryEndpoint,
        path: &str,
        kind: FileKind,
    ) -> String {
        match self.try_extract(endpoint, path, kind).await {
            Ok(record) => record,
            Err(e) => {
                warn!(path, error = %e, "Record extraction failed, logging empty record");
                String::new()
            },
        }
    }

    #[instrument(skip(self, endpoint))]
    pub async fn try_extract(
        &self,
        endpoint: &dyn DirectoryEndpoint,
        path: &str,
        kind: FileKind,
    ) -> Result<String> {
        match kind {
            FileKind::DelimitedText => {
                let tail = endpoint
                    .read_tail(path, TAIL_WINDOW)
                    .await
                    .map_err(|e| AscendError::Extraction(format!("{:#}", e)))?;
                debug!("Read {} tail bytes from {}", tail.len(), path);
                Ok(last_line(&tail))
            },
            FileKind::Spreadsheet => {
                let data = endpoint
                    .read_all(path)
                    .await
                    .map_err(|e| AscendError::Extraction(format!("{:#}", e)))?;
                last_row(data)
            },
            FileKind::Unsupported => Err(AscendError::Extraction(format!(
                "{} is not an extractable file kind",
                path
            ))),
        }
    }
}

/// Text after the final line feed of a UTF-8 tail window
///
/// Invalid sequences (a multi-byte character cut by the window) are replaced,
/// not rejected.
pub fn last_line(tail: &[u8]) -> String {
    let text = String::from_utf8_lossy(tail);
    text.rsplit('\n').next().unwrap_or_default().to_string()
}

/// Comma-joined cells of the last row of the first worksheet
///
/// Columns are counted from A, so leading empty columns show up as empty
/// fields. An empty worksheet yields an empty string.
pub fn last_row(data: Vec<u8>) -> Result<String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| AscendError::Extraction(format!("Unreadable workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AscendError::Extraction("Workbook has no worksheets".to_string()))?
        .map_err(|e| AscendError::Extraction(format!("Unreadable worksheet: {}", e)))?;

    // calamine ranges start at the first used column
    let leading = range.start().map(|(_, col)| col as usize).unwrap_or(0);

    Ok(range
        .rows()
        .last()
        .map(|row| {
            iter::repeat(String::new())
                .take(leading)
                .chain(row.iter().map(cell_text))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(value) => match value.as_datetime() {
            Some(at) => date_text(at),
            None => cell.to_string(),
        },
        other => other.to_string(),
    }
}

/// Date cells print as dates; the time is kept only when it is not midnight
fn date_text(at: NaiveDateTime) -> String {
    if at.num_seconds_from_midnight() == 0 {
        at.format("%Y-%m-%d").to_string()
    } else {
        at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::LocalEndpoint;
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::TempDir;

    fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                match value.parse::<f64>() {
                    Ok(n) => sheet.write_number(r as u32, c as u16, n).unwrap(),
                    Err(_) => sheet.write_string(r as u32, c as u16, *value).unwrap(),
                };
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_last_line_of_small_file() {
        assert_eq!(last_line(b"id,val\n1,10\n2,20"), "2,20");
        assert_eq!(last_line(b"single"), "single");
        assert_eq!(last_line(b""), "");
    }

    #[test]
    fn test_trailing_newline_yields_empty_record() {
        assert_eq!(last_line(b"id,val\n1,10\n"), "");
    }

    #[test]
    fn test_last_row_joins_cells() {
        let data = workbook_bytes(&[&["id", "name", "amount"], &["1", "alpha", "10"], &["2", "beta", "20.5"]]);
        assert_eq!(last_row(data).unwrap(), "2,beta,20.5");
    }

    #[test]
    fn test_date_cells_render_as_dates() {
        let mut workbook = Workbook::new();
        let date = Format::new().set_num_format("yyyy-mm-dd");
        let stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "day").unwrap();
        sheet.write_string(0, 1, "qty").unwrap();
        sheet.write_string(0, 2, "at").unwrap();
        // 46314 is 2026-10-19 in the 1900 date system
        sheet.write_number_with_format(1, 0, 46314.0, &date).unwrap();
        sheet.write_number(1, 1, 10.0).unwrap();
        sheet.write_number_with_format(1, 2, 46314.5, &stamp).unwrap();
        let data = workbook.save_to_buffer().unwrap();

        assert_eq!(last_row(data).unwrap(), "2026-10-19,10,2026-10-19 12:00:00");
    }

    #[test]
    fn test_leading_empty_columns_are_kept() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 1, "id").unwrap();
        sheet.write_string(0, 2, "amount").unwrap();
        sheet.write_number(1, 1, 2.0).unwrap();
        sheet.write_number(1, 2, 20.0).unwrap();
        let data = workbook.save_to_buffer().unwrap();

        assert_eq!(last_row(data).unwrap(), ",2,20");
    }

    #[test]
    fn test_empty_worksheet_yields_empty_string() {
        let data = workbook_bytes(&[]);
        assert_eq!(last_row(data).unwrap(), "");
    }

    #[test]
    fn test_corrupt_workbook_is_an_error() {
        assert!(last_row(b"definitely not a workbook".to_vec()).is_err());
        assert!(last_row(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_long_file_reads_only_tail_window() {
        let dir = TempDir::new().unwrap();
        let header = "h".repeat(500);
        std::fs::write(dir.path().join("feed.csv"), format!("{}\n7,70", header)).unwrap();

        let endpoint = LocalEndpoint::new(dir.path());
        let record = RecordExtractor::new()
            .extract_last_record(&endpoint, "feed.csv", FileKind::DelimitedText)
            .await;

        assert_eq!(record, "7,70");
    }

    #[tokio::test]
    async fn test_oversized_final_line_is_truncated() {
        let dir = TempDir::new().unwrap();
        let last = "x".repeat(150);
        std::fs::write(dir.path().join("wide.csv"), format!("id\n{}", last)).unwrap();

        let endpoint = LocalEndpoint::new(dir.path());
        let record = RecordExtractor::new()
            .extract_last_record(&endpoint, "wide.csv", FileKind::DelimitedText)
            .await;

        assert_eq!(record.len(), TAIL_WINDOW as usize);
        assert!(last.ends_with(&record));
    }

    #[tokio::test]
    async fn test_missing_file_absorbed_as_empty() {
        let dir = TempDir::new().unwrap();
        let endpoint = LocalEndpoint::new(dir.path());
        let extractor = RecordExtractor::new();

        assert!(extractor
            .try_extract(&endpoint, "gone.xlsx", FileKind::Spreadsheet)
            .await
            .is_err());
        assert_eq!(
            extractor
                .extract_last_record(&endpoint, "gone.xlsx", FileKind::Spreadsheet)
                .await,
            ""
        );
    }
}
