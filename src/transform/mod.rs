//! Ledger row transformation
//!
//! [`RowTransformer`] reads one delimiter-separated source file and yields the
//! events of each row in file order. Rows are read on demand, so memory use is
//! bounded by a single row regardless of file size.

use crate::error::{Error, Result};
use crate::types::{
    BUDGET_CATEGORY, BalanceEvent, ImportEvent, OrganizationEvent, PaymentEvent, SourceFile,
};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;


/// Budget items above this value are income and flip the amount sign
pub const INCOME_ITEM_THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

const COL_ITEM: &str = "POLOZKA";
const COL_CREDIT: &str = "CASTKA_DAL";
const COL_DEBIT: &str = "CASTKA_MD";
const COL_ORGANIZATION: &str = "ORGANIZACE";
const COL_ORGANIZATION_NAME: &str = "ORGANIZACE_NAZEV";
const COL_CATEGORY: &str = "DOKLAD_AGENDA";
const COL_PARAGRAPH: &str = "PARAGRAF";
const COL_DATE: &str = "DOKLAD_DATUM";
const COL_COUNTERPARTY_ID: &str = "SUBJEKT_IC";
const COL_COUNTERPARTY_NAME: &str = "SUBJEKT_NAZEV";
const COL_NOTE: &str = "POZNAMKA";

/// Signed amount of a ledger line
///
/// Income items (above [`INCOME_ITEM_THRESHOLD`]) count credit minus debit,
/// everything else debit minus credit. `None` when the difference does not
/// fit a [`Decimal`].
pub fn signed_amount(item: Decimal, credit: Decimal, debit: Decimal) -> Option<Decimal> {
    if item > INCOME_ITEM_THRESHOLD {
        credit.checked_sub(debit)
    } else {
        debit.checked_sub(credit)
    }
}

/// Positions of the known columns in the header row
#[derive(Debug)]
struct Columns {
    item: usize,
    credit: usize,
    debit: usize,
    organization: usize,
    organization_name: usize,
    paragraph: usize,
    category: Option<usize>,
    date: Option<usize>,
    counterparty_id: Option<usize>,
    counterparty_name: Option<usize>,
    note: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, file: SourceFile) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let require = |name: &str| {
            find(name).ok_or_else(|| Error::RowParse {
                file: file.to_string(),
                row: 1,
                reason: format!("missing column {name}"),
            })
        };

        // RU.csv rows always get the budget category
        let category = match file {
            SourceFile::Sk => Some(require(COL_CATEGORY)?),
            SourceFile::Ru => find(COL_CATEGORY),
        };

        Ok(Self {
            item: require(COL_ITEM)?,
            credit: require(COL_CREDIT)?,
            debit: require(COL_DEBIT)?,
            organization: require(COL_ORGANIZATION)?,
            organization_name: require(COL_ORGANIZATION_NAME)?,
            paragraph: require(COL_PARAGRAPH)?,
            category,
            date: find(COL_DATE),
            counterparty_id: find(COL_COUNTERPARTY_ID),
            counterparty_name: find(COL_COUNTERPARTY_NAME),
            note: find(COL_NOTE),
        })
    }
}

/// Lazy, single-pass event iterator over one source file
///
/// Each row yields an optional [`ImportEvent::Organization`], exactly one
/// [`ImportEvent::Balance`] and, for payment categories, an
/// [`ImportEvent::Payment`]. The first error ends the iteration.
pub struct RowTransformer<R = File> {
    file: SourceFile,
    reader: csv::Reader<R>,
    columns: Columns,
    record: StringRecord,
    pending: VecDeque<ImportEvent>,
    rows_processed: u64,
    finished: bool,
}

impl RowTransformer<File> {
    /// Open an extracted source file and read its header row
    pub fn open(path: &Path, file: SourceFile, delimiter: u8) -> Result<Self> {
        let handle = File::open(path).map_err(|source| Error::Filesystem {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?path, %file, "opened source file");
        Self::from_reader(handle, file, delimiter)
    }
}

impl<R: Read> RowTransformer<R> {
    /// Transform rows read from any byte source
    pub fn from_reader(reader: R, file: SourceFile, delimiter: u8) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| csv_error(file, 1, &e))?
            .clone();
        let columns = Columns::from_headers(&headers, file)?;

        Ok(Self {
            file,
            reader,
            columns,
            record: StringRecord::new(),
            pending: VecDeque::with_capacity(3),
            rows_processed: 0,
            finished: false,
        })
    }

    /// Source file this transformer reads
    pub fn source_file(&self) -> SourceFile {
        self.file
    }

    /// Data rows transformed so far
    pub fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    fn field(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or_default().trim()
    }

    fn optional_field(&self, index: Option<usize>) -> Option<&str> {
        index.map(|i| self.field(i))
    }

    fn row_error(&self, row: u64, reason: String) -> Error {
        Error::RowParse {
            file: self.file.to_string(),
            row,
            reason,
        }
    }

    fn number(&self, row: u64, column: &str, index: usize, empty_is_zero: bool) -> Result<Decimal> {
        let raw = self.field(index);
        if raw.is_empty() && empty_is_zero {
            return Ok(Decimal::ZERO);
        }
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| self.row_error(row, format!("{column} is not a number: {raw:?}")))
    }

    fn payment_field(&self, row: u64, column: &str, index: Option<usize>) -> Result<String> {
        self.optional_field(index)
            .map(str::to_string)
            .ok_or_else(|| self.row_error(row, format!("payment row without column {column}")))
    }

    /// Turn the current record into its events
    fn transform_record(&mut self, row: u64) -> Result<()> {
        let columns = &self.columns;
        // Keep the item as written; only the comparison needs the number
        let item_raw = self.field(columns.item).to_string();
        let item = self.number(row, COL_ITEM, columns.item, false)?;
        let credit = self.number(row, COL_CREDIT, columns.credit, true)?;
        let debit = self.number(row, COL_DEBIT, columns.debit, true)?;
        let amount = signed_amount(item, credit, debit).ok_or_else(|| {
            self.row_error(
                row,
                format!("amount out of range ({COL_CREDIT} {credit}, {COL_DEBIT} {debit})"),
            )
        })?;

        let category = match self.file {
            SourceFile::Ru => BUDGET_CATEGORY.to_string(),
            SourceFile::Sk => self
                .optional_field(columns.category)
                .unwrap_or_default()
                .to_string(),
        };

        let organization = self.field(columns.organization).to_string();
        let organization_name = self.field(columns.organization_name).to_string();
        if !organization.is_empty() && !organization_name.is_empty() {
            self.pending
                .push_back(ImportEvent::Organization(OrganizationEvent {
                    src_id: organization.clone(),
                    name: organization_name,
                }));
        }

        let balance = BalanceEvent {
            category,
            paragraph: self.field(columns.paragraph).to_string(),
            item: item_raw,
            event: organization,
            amount,
        };

        if balance.is_payment() {
            let payment = PaymentEvent {
                balance: balance.clone(),
                date: self.payment_field(row, COL_DATE, columns.date)?,
                counterparty_id: self.payment_field(row, COL_COUNTERPARTY_ID, columns.counterparty_id)?,
                counterparty_name: self.payment_field(
                    row,
                    COL_COUNTERPARTY_NAME,
                    columns.counterparty_name,
                )?,
                description: self.payment_field(row, COL_NOTE, columns.note)?,
            };
            self.pending.push_back(ImportEvent::Balance(balance));
            self.pending.push_back(ImportEvent::Payment(payment));
        } else {
            self.pending.push_back(ImportEvent::Balance(balance));
        }

        Ok(())
    }

    fn fail(&mut self, error: Error) -> Option<Result<ImportEvent>> {
        self.finished = true;
        self.pending.clear();
        Some(Err(error))
    }
}

impl<R: Read> Iterator for RowTransformer<R> {
    type Item = Result<ImportEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.finished {
            return None;
        }

        match self.reader.read_record(&mut self.record) {
            Ok(false) => {
                self.finished = true;
                debug!(file = %self.file, rows = self.rows_processed, "source file exhausted");
                None
            }
            Ok(true) => {
                let row = self.record.position().map(|p| p.line()).unwrap_or_default();
                if let Err(e) = self.transform_record(row) {
                    return self.fail(e);
                }
                self.rows_processed += 1;
                self.pending.pop_front().map(Ok)
            }
            Err(e) => {
                let row = e.position().map(|p| p.line()).unwrap_or_default();
                let error = csv_error(self.file, row, &e);
                self.fail(error)
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RowTransformer<R> {}

fn csv_error(file: SourceFile, row: u64, error: &csv::Error) -> Error {
    let reason = match error.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {expected_len} fields, found {len}"),
        csv::ErrorKind::Utf8 { .. } => "row is not valid UTF-8".to_string(),
        _ => error.to_string(),
    };
    Error::RowParse {
        file: file.to_string(),
        row,
        reason,
    }
}
