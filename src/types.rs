//! Core types and events for ledger-import

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Ledger category codes that denote payments (supplier and customer invoices)
pub const PAYMENT_CATEGORIES: [&str; 2] = ["KDF", "KOF"];

/// Category assigned to every row of the budget file
pub const BUDGET_CATEGORY: &str = "ROZ";

/// Delimiter used when the request does not name one
pub const DEFAULT_DELIMITER: char = ';';

/// Unique identifier of one import run
///
/// The workspace directory is derived from it, so two runs that are active at
/// the same time must use different ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Create a RunId, rejecting anything that is unsafe in a directory name
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::config("run id must not be empty", "run_id"));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::config(
                format!("run id {id:?} may only contain ASCII letters, digits, '-' and '_'"),
                "run_id",
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Input of one import run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// URL of the ZIP archive (required)
    #[serde(default)]
    pub url: String,

    /// Last-Modified value remembered from the previous successful run
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,

    /// ETag remembered from the previous successful run
    #[serde(default)]
    pub etag: Option<String>,

    /// Field delimiter of the CSV files (default: ';')
    #[serde(default)]
    pub delimiter: Option<char>,
}

impl ImportRequest {
    /// Request without cache validators
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Carry the validators of a previous run over to this request
    ///
    /// A `Last-Modified` value that is not a valid HTTP date is dropped.
    pub fn with_validators_from(mut self, previous: &ImportResult) -> Self {
        if let Some(ts) = previous.last_modified_at() {
            self.last_modified = Some(ts);
        }
        if let Some(etag) = &previous.etag {
            self.etag = Some(etag.clone());
        }
        self
    }

    /// Check the request and return the parsed URL
    pub fn validate(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(Error::config("missing url in import settings", "url"));
        }
        let url = Url::parse(self.url.trim())
            .map_err(|e| Error::config(format!("invalid url {:?}: {}", self.url, e), "url"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                format!("unsupported url scheme {:?}", url.scheme()),
                "url",
            ));
        }
        self.delimiter_byte()?;
        Ok(url)
    }

    /// The delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        let delimiter = self.delimiter.unwrap_or(DEFAULT_DELIMITER);
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\n' | '\r') {
            return Err(Error::config(
                format!("delimiter {delimiter:?} must be a single ASCII character other than a quote or line break"),
                "delimiter",
            ));
        }
        Ok(delimiter as u8)
    }
}

/// Classification of a fetch response, independent of any I/O
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchDecision {
    /// 200: a full body follows
    NewData,
    /// 304: the cached copy is still current
    NotModified,
    /// 404
    NotFound,
    /// Anything else
    Unexpected(u16),
}

/// Result of the conditional fetch stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// HTTP status code
    pub status_code: u16,
    /// Canonical reason phrase of the status code; the phrase the server
    /// sent is not available
    pub status_message: String,
    /// True iff the server sent a new archive (200)
    pub modified: bool,
    /// Last-Modified response header (only captured on 200)
    pub last_modified: Option<String>,
    /// ETag response header (only captured on 200)
    pub etag: Option<String>,
    /// Number of body bytes written to the archive file
    pub bytes_written: u64,
    /// Hex SHA-256 of the downloaded archive (only on 200)
    pub sha256: Option<String>,
}

/// The two files every archive must contain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFile {
    /// Accounting journal, category taken from `DOKLAD_AGENDA`
    Sk,
    /// Budget, category is always [`BUDGET_CATEGORY`]
    Ru,
}

impl SourceFile {
    /// Processing order within a run
    pub const ALL: [SourceFile; 2] = [SourceFile::Sk, SourceFile::Ru];

    /// Name of the member inside the archive
    pub fn file_name(&self) -> &'static str {
        match self {
            SourceFile::Sk => "SK.csv",
            SourceFile::Ru => "RU.csv",
        }
    }

    /// Match an archive member name against the known files
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.file_name() == name)
    }
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// An organizational unit seen in a row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationEvent {
    /// Source identifier (`ORGANIZACE`)
    pub src_id: String,
    /// Display name (`ORGANIZACE_NAZEV`)
    pub name: String,
}

/// One ledger balance line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Ledger category code
    #[serde(rename = "type")]
    pub category: String,
    /// Budget paragraph (`PARAGRAF`)
    pub paragraph: String,
    /// Budget item (`POLOZKA`, verbatim)
    pub item: String,
    /// Organization reference (`ORGANIZACE`)
    pub event: String,
    /// Signed amount
    pub amount: Decimal,
}

impl BalanceEvent {
    /// Whether this line is a payment and gets a [`PaymentEvent`]
    pub fn is_payment(&self) -> bool {
        PAYMENT_CATEGORIES.contains(&self.category.as_str())
    }
}

/// A payment line: the balance fields plus counterparty details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Same fields as the balance event emitted just before
    #[serde(flatten)]
    pub balance: BalanceEvent,
    /// Document date (`DOKLAD_DATUM`)
    pub date: String,
    /// Counterparty identification number (`SUBJEKT_IC`)
    pub counterparty_id: String,
    /// Counterparty name (`SUBJEKT_NAZEV`)
    pub counterparty_name: String,
    /// Free text note (`POZNAMKA`)
    pub description: String,
}

/// Event emitted while transforming rows
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportEvent {
    /// Organization seen in a row
    Organization(OrganizationEvent),
    /// Ledger balance, one per row
    Balance(BalanceEvent),
    /// Payment, follows the balance of a payment row
    Payment(PaymentEvent),
}

/// Stages of an import run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing done yet
    Idle,
    /// Workspace directory exists
    WorkspaceCreated,
    /// Archive fetched (or found unchanged)
    Fetched,
    /// Archive unpacked (or skipped)
    Extracted,
    /// Both files transformed (or skipped)
    Parsed,
    /// Workspace removed, run finished
    CleanedUp,
    /// A stage failed
    Failed,
}

impl RunState {
    /// True for states a run ends in
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::CleanedUp | RunState::Failed)
    }
}

/// Terminal result of a successful run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// False when the server reported the archive unchanged
    pub modified: bool,
    /// HTTP status code of the fetch
    pub status_code: u16,
    /// Canonical reason phrase of the fetch status, see
    /// [`FetchOutcome::status_message`]
    pub status_message: String,
    /// Last-Modified to persist for the next run
    pub last_modified: Option<String>,
    /// ETag to persist for the next run
    pub etag: Option<String>,
    /// Number of events handed to the consumer
    pub events_emitted: u64,
    /// Number of data rows transformed across both files
    pub rows_processed: u64,
}

impl ImportResult {
    /// Parse the captured Last-Modified header as a timestamp
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_modified.as_deref()?;
        DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}
