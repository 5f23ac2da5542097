//! Ingestion configuration
//!
//! Everything the pipeline needs is supplied through environment variables
//! (optionally seeded from a `.env` file). A missing required key fails at
//! startup, before any run begins.

use ascend_common::AscendError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default title lookup base; the reference number is appended verbatim.
pub const DEFAULT_TITLE_ENDPOINT: &str =
    "https://ascend-http-function.azurewebsites.net/api/title?refCounter=";

/// Default notification subject line.
pub const DEFAULT_EMAIL_SUBJECT: &str = "Email notification for ASCEND Capstone";

/// SMTP submission port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default region for S3-compatible endpoints.
pub const DEFAULT_STORAGE_REGION: &str = "us-east-1";

/// Default trigger interval in seconds (every five minutes).
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 300;

/// Credentials for S3-compatible endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub path_style: bool,
}

/// One directory endpoint: connection, share/container, relative path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// `file:///some/root` or an S3-compatible endpoint URL
    pub connection: String,
    pub bucket: String,
    pub directory: String,
}

/// Location of the central audit log object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogLocation {
    pub connection: String,
    pub container: String,
    pub name: String,
}

/// Mail envelope and transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Password for the `from` account
    #[serde(skip_serializing)]
    pub smtp_secret: String,
}

/// Complete ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub credentials: Option<StorageCredentials>,
    pub log: LogLocation,
    pub title_endpoint: String,
    pub mail: MailConfig,
    pub csv_enabled: bool,
    pub run_interval_secs: u64,
}

impl IngestSettings {
    /// Load settings from `.env` and the process environment
    pub fn load() -> ascend_common::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ascend_common::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> ascend_common::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AscendError::missing_key(key))
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let source = EndpointConfig {
            connection: required("SOURCE_STORAGE_URL")?,
            bucket: required("SOURCE_BUCKET")?,
            directory: optional("SOURCE_FILE_PATH").unwrap_or_default(),
        };
        let destination = EndpointConfig {
            connection: required("DESTINATION_STORAGE_URL")?,
            bucket: required("DESTINATION_BUCKET")?,
            directory: optional("DESTINATION_FILE_PATH").unwrap_or_default(),
        };

        let needs_credentials = !is_local(&source.connection) || !is_local(&destination.connection);
        let credentials = if needs_credentials {
            Some(StorageCredentials {
                access_key: required("STORAGE_ACCOUNT_NAME")?,
                secret_key: required("STORAGE_ACCOUNT_KEY")?,
                region: optional("STORAGE_REGION")
                    .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
                path_style: optional("STORAGE_PATH_STYLE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            })
        } else {
            None
        };

        let log = LogLocation {
            connection: source.connection.clone(),
            container: required("LOG_CONTAINER_NAME")?,
            name: required("LOG_BLOB_NAME")?,
        };

        let mail = MailConfig {
            from: required("EMAIL_FROM")?,
            to: required("EMAIL_TO")?,
            subject: optional("EMAIL_SUBJECT").unwrap_or_else(|| DEFAULT_EMAIL_SUBJECT.to_string()),
            smtp_host: required("SMTP_HOST")?,
            smtp_port: match optional("SMTP_PORT") {
                Some(port) => port
                    .parse()
                    .map_err(|_| AscendError::Config(format!("SMTP_PORT is not a port: {}", port)))?,
                None => DEFAULT_SMTP_PORT,
            },
            smtp_secret: required("SMTP_SECRET")?,
        };

        let settings = Self {
            source,
            destination,
            credentials,
            log,
            title_endpoint: optional("TITLE_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_TITLE_ENDPOINT.to_string()),
            mail,
            csv_enabled: optional("CSV_ENABLED").is_some_and(|v| parse_flag(&v)),
            run_interval_secs: optional("RUN_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RUN_INTERVAL_SECS),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ascend_common::Result<()> {
        if self.run_interval_secs == 0 {
            return Err(AscendError::Config(
                "RUN_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if self.mail.smtp_port == 0 {
            return Err(AscendError::Config("SMTP_PORT must be greater than 0".to_string()));
        }
        if !self.title_endpoint.starts_with("http://") && !self.title_endpoint.starts_with("https://")
        {
            return Err(AscendError::Config(format!(
                "TITLE_ENDPOINT must be an http(s) URL: {}",
                self.title_endpoint
            )));
        }
        Ok(())
    }

    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }
}

/// `file://` connections are served from the local filesystem
pub fn is_local(connection: &str) -> bool {
    connection.starts_with("file://")
}

// Only an explicit true enables the flag; anything else leaves it off.
fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
