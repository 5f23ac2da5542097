//! File classification by extension

use std::fmt;
use std::path::Path;

/// Spreadsheet extensions, always processed
pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xls"];

/// Delimited-text extension, processed only when CSV is enabled
pub const DELIMITED_EXTENSION: &str = "csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    DelimitedText,
    Spreadsheet,
    Unsupported,
}

impl FileKind {
    /// Case-insensitive match of the extension against the supported set
    pub fn classify(extension: &str, csv_enabled: bool) -> Self {
        let extension = extension.trim_start_matches('.');
        if csv_enabled && extension.eq_ignore_ascii_case(DELIMITED_EXTENSION) {
            FileKind::DelimitedText
        } else if SPREADSHEET_EXTENSIONS
            .iter()
            .any(|ext| extension.eq_ignore_ascii_case(ext))
        {
            FileKind::Spreadsheet
        } else {
            FileKind::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != FileKind::Unsupported
    }

    /// Label used in central log lines
    pub fn log_label(self) -> &'static str {
        match self {
            FileKind::DelimitedText => "CSV",
            FileKind::Spreadsheet => "Excel",
            FileKind::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.log_label())
    }
}

/// A file discovered by listing the source directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    /// Extension without the leading dot, empty when there is none
    pub extension: String,
}

impl FileEntry {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let extension = Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, extension }
    }

    pub fn kind(&self, csv_enabled: bool) -> FileKind {
        FileKind::classify(&self.extension, csv_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spreadsheets_are_unconditional() {
        assert_eq!(FileEntry::new("q1.XLSX").kind(false), FileKind::Spreadsheet);
        assert_eq!(FileEntry::new("q1.xls").kind(false), FileKind::Spreadsheet);
    }

    #[test]
    fn test_csv_requires_flag() {
        let entry = FileEntry::new("feed.Csv");
        assert_eq!(entry.kind(true), FileKind::DelimitedText);
        assert_eq!(entry.kind(false), FileKind::Unsupported);
    }

    #[test]
    fn test_unsupported_and_extensionless() {
        assert_eq!(FileEntry::new("b.txt").kind(true), FileKind::Unsupported);
        let bare = FileEntry::new("README");
        assert_eq!(bare.extension, "");
        assert!(!bare.kind(true).is_supported());
    }

    #[test]
    fn test_classify_accepts_dotted_extension() {
        assert_eq!(FileKind::classify(".CSV", true), FileKind::DelimitedText);
    }
}
