//! Ledger store abstraction over a tabular remote store.
//!
//! A ledger is a set of named sheets holding rows of string cells. Callers
//! address a region of a sheet with a [`LedgerRange`] in A1 notation
//! (`Giselle!A2:C`) and talk to the store through three calls:
//!
//! - `get`: read the rows inside a range
//! - `append`: add rows after the last occupied row of a range
//! - `clear`: blank every cell inside a range
//!
//! The semantics follow the Google Sheets values API so that the in-memory
//! backend behaves like the real one:
//! - reads start at the range's first row, are restricted to its columns, and
//!   drop trailing empty rows and trailing empty cells
//! - a sheet or range with no values reads as an empty vec, never an error
//! - none of the calls are transactional with respect to each other

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};

/// One ledger row: cell values, left to right.
pub type Row = Vec<String>;

/// A rectangular region of one sheet, addressed in A1 notation.
///
/// Columns are zero-based internally (`A` = 0); rows are one-based like the
/// spreadsheet itself. An absent end column or end row leaves that side open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerRange {
    sheet: String,
    start_col: u32,
    start_row: u32,
    end_col: Option<u32>,
    end_row: Option<u32>,
}

impl LedgerRange {
    /// Creates a range spanning `start_col..=end_col` from `start_row` downward.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the sheet name is empty, the start row is
    /// zero, or the end column precedes the start column.
    pub fn columns(
        sheet: impl Into<String>,
        start_col: u32,
        end_col: u32,
        start_row: u32,
    ) -> Result<Self> {
        let range = Self {
            sheet: sheet.into(),
            start_col,
            start_row,
            end_col: Some(end_col),
            end_row: None,
        };
        range.validate()?;
        Ok(range)
    }

    /// Returns the sheet (tab) name.
    #[must_use]
    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Returns the zero-based first column.
    #[must_use]
    pub const fn start_col(&self) -> u32 {
        self.start_col
    }

    /// Returns the one-based first row.
    #[must_use]
    pub const fn start_row(&self) -> u32 {
        self.start_row
    }

    /// Returns the zero-based last column, if bounded.
    #[must_use]
    pub const fn end_col(&self) -> Option<u32> {
        self.end_col
    }

    /// Returns the one-based last row, if bounded.
    #[must_use]
    pub const fn end_row(&self) -> Option<u32> {
        self.end_row
    }

    /// Returns the number of columns covered, if bounded.
    #[must_use]
    pub fn width(&self) -> Option<usize> {
        self.end_col
            .map(|end| usize::try_from(end - self.start_col + 1).unwrap_or(usize::MAX))
    }

    /// Returns the single-column range covering this range's first column.
    #[must_use]
    pub fn first_column(&self) -> Self {
        Self {
            sheet: self.sheet.clone(),
            start_col: self.start_col,
            start_row: self.start_row,
            end_col: Some(self.start_col),
            end_row: self.end_row,
        }
    }

    /// Renders the range in A1 notation, quoting the sheet name when needed.
    #[must_use]
    pub fn a1(&self) -> String {
        self.to_string()
    }

    fn validate(&self) -> Result<()> {
        if self.sheet.trim().is_empty() {
            return Err(Error::InvalidInput("range sheet name is empty".to_string()));
        }
        if self.start_row == 0 {
            return Err(Error::InvalidInput(format!(
                "range {}: rows are numbered from 1",
                self.sheet
            )));
        }
        if self.end_col.is_some_and(|end| end < self.start_col) {
            return Err(Error::InvalidInput(format!(
                "range {}: end column precedes start column",
                self.sheet
            )));
        }
        if self.end_row.is_some_and(|end| end < self.start_row) {
            return Err(Error::InvalidInput(format!(
                "range {}: end row precedes start row",
                self.sheet
            )));
        }
        Ok(())
    }

    fn row_indices(&self, available: usize) -> std::ops::Range<usize> {
        let start = to_index(self.start_row - 1).min(available);
        let end = self
            .end_row
            .map_or(available, |end| to_index(end).min(available));
        start..end.max(start)
    }

    fn col_indices(&self, available: usize) -> std::ops::Range<usize> {
        let start = to_index(self.start_col).min(available);
        let end = self
            .end_col
            .map_or(available, |end| to_index(end + 1).min(available));
        start..end.max(start)
    }
}

impl fmt::Display for LedgerRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if needs_quotes(&self.sheet) {
            write!(f, "'{}'!", self.sheet.replace('\'', "''"))?;
        } else {
            write!(f, "{}!", self.sheet)?;
        }
        write!(f, "{}{}", column_letters(self.start_col), self.start_row)?;
        match (self.end_col, self.end_row) {
            (Some(col), Some(row)) => write!(f, ":{}{row}", column_letters(col)),
            (Some(col), None) => write!(f, ":{}", column_letters(col)),
            (None, Some(row)) => write!(f, ":{row}"),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for LedgerRange {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (sheet, cells) = raw
            .rsplit_once('!')
            .ok_or_else(|| Error::InvalidInput(format!("range {raw:?} is missing a sheet name")))?;
        let sheet = unquote_sheet(sheet);

        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };

        let (start_col, start_row) = parse_cell(start)
            .ok_or_else(|| Error::InvalidInput(format!("range {raw:?} has an invalid start cell")))?;
        let start_col = start_col
            .ok_or_else(|| Error::InvalidInput(format!("range {raw:?} has no start column")))?;
        let start_row = start_row.unwrap_or(1);

        let (end_col, end_row) = match end {
            Some(end) => parse_cell(end)
                .ok_or_else(|| Error::InvalidInput(format!("range {raw:?} has an invalid end cell")))?,
            // A bare cell (`Sheet!A2`) addresses exactly that cell.
            None => (Some(start_col), Some(start_row)),
        };

        let range = Self {
            sheet,
            start_col,
            start_row,
            end_col,
            end_row,
        };
        range.validate()?;
        Ok(range)
    }
}

impl TryFrom<&str> for LedgerRange {
    type Error = Error;

    fn try_from(raw: &str) -> Result<Self> {
        raw.parse()
    }
}

fn to_index(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn needs_quotes(sheet: &str) -> bool {
    !sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote_sheet(sheet: &str) -> String {
    let sheet = sheet.trim();
    sheet
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map_or_else(|| sheet.to_string(), |s| s.replace("''", "'"))
}

/// Parses `C`, `12`, or `C12` into (column, row).
fn parse_cell(cell: &str) -> Option<(Option<u32>, Option<u32>)> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);

    let col = if letters.is_empty() {
        None
    } else {
        Some(column_index(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(row)
    };
    Some((col, row))
}

fn column_index(letters: &str) -> Option<u32> {
    let mut index: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_uppercase()) - u32::from('A') + 1;
        index = index.checked_mul(26)?.checked_add(digit)?;
    }
    index.checked_sub(1)
}

fn column_letters(index: u32) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from_u32(u32::from('A') + rem).unwrap_or('A'));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Ledger store contract.
///
/// Implemented by the Google Sheets client in production and by
/// [`MemoryLedger`] for debug runs and tests.
#[async_trait]
pub trait LedgerStore: Send + Sync + fmt::Debug + 'static {
    /// Reads the rows inside `range`.
    ///
    /// Trailing empty rows and trailing empty cells are omitted. A range with
    /// no values yields an empty vec.
    async fn get(&self, range: &LedgerRange) -> Result<Vec<Row>>;

    /// Appends `rows` below the last occupied row of `range`.
    ///
    /// Appending an empty slice is a no-op.
    async fn append(&self, range: &LedgerRange, rows: &[Row]) -> Result<()>;

    /// Blanks every cell inside `range`.
    async fn clear(&self, range: &LedgerRange) -> Result<()>;
}

/// In-memory ledger for debug mode and tests.
///
/// Thread-safe via `RwLock`. Each sheet is a grid of rows where index 0 is
/// spreadsheet row 1.
#[derive(Debug, Default, Clone)]
pub struct MemoryLedger {
    sheets: Arc<RwLock<HashMap<String, Vec<Row>>>>,
}

impl MemoryLedger {
    /// Creates a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every row of `sheet`, starting at row 1.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the lock is poisoned.
    pub fn snapshot(&self, sheet: &str) -> Result<Vec<Row>> {
        let sheets = self.sheets.read().map_err(|_| poisoned())?;
        Ok(sheets.get(sheet).cloned().unwrap_or_default())
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

fn trim_row(mut row: Row) -> Row {
    while row.last().is_some_and(String::is_empty) {
        row.pop();
    }
    row
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn get(&self, range: &LedgerRange) -> Result<Vec<Row>> {
        let sheets = self.sheets.read().map_err(|_| poisoned())?;
        let Some(grid) = sheets.get(range.sheet()) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Row> = grid[range.row_indices(grid.len())]
            .iter()
            .map(|row| trim_row(row[range.col_indices(row.len())].to_vec()))
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn append(&self, range: &LedgerRange, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut sheets = self.sheets.write().map_err(|_| poisoned())?;
        let grid = sheets.entry(range.sheet().to_string()).or_default();

        let first = to_index(range.start_row() - 1);
        let occupied = range.row_indices(grid.len()).rev().find(|&index| {
            let row = &grid[index];
            row[range.col_indices(row.len())]
                .iter()
                .any(|cell| !cell.is_empty())
        });
        let mut target = occupied.map_or(first, |index| index + 1);

        let col = to_index(range.start_col());
        for values in rows {
            if grid.len() <= target {
                grid.resize_with(target + 1, Vec::new);
            }
            let row = &mut grid[target];
            if row.len() < col + values.len() {
                row.resize(col + values.len(), String::new());
            }
            for (offset, value) in values.iter().enumerate() {
                row[col + offset].clone_from(value);
            }
            target += 1;
        }
        Ok(())
    }

    async fn clear(&self, range: &LedgerRange) -> Result<()> {
        let mut sheets = self.sheets.write().map_err(|_| poisoned())?;
        let Some(grid) = sheets.get_mut(range.sheet()) else {
            return Ok(());
        };

        let indices = range.row_indices(grid.len());
        for row in &mut grid[indices] {
            let cols = range.col_indices(row.len());
            for cell in &mut row[cols] {
                cell.clear();
            }
            let trimmed = trim_row(std::mem::take(row));
            *row = trimmed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    #[test]
    fn parses_bounded_column_range() {
        let range: LedgerRange = "Giselle!A2:C".parse().unwrap();
        assert_eq!(range.sheet(), "Giselle");
        assert_eq!(range.start_col(), 0);
        assert_eq!(range.start_row(), 2);
        assert_eq!(range.end_col(), Some(2));
        assert_eq!(range.end_row(), None);
        assert_eq!(range.width(), Some(3));
        assert_eq!(range.a1(), "Giselle!A2:C");
    }

    #[test]
    fn parses_quoted_and_spaced_sheet_names() {
        let quoted: LedgerRange = "'Combined sheet'!A2:C".parse().unwrap();
        let bare: LedgerRange = "Combined sheet!A2:C".parse().unwrap();
        assert_eq!(quoted, bare);
        assert_eq!(quoted.sheet(), "Combined sheet");
        assert_eq!(quoted.a1(), "'Combined sheet'!A2:C");
    }

    #[test]
    fn bare_cell_addresses_a_single_cell() {
        let range: LedgerRange = "Combined sheet!A2".parse().unwrap();
        assert_eq!(range.end_col(), Some(0));
        assert_eq!(range.end_row(), Some(2));
    }

    #[test]
    fn whole_column_range_starts_at_row_one() {
        let range: LedgerRange = "Giselle!A:C".parse().unwrap();
        assert_eq!(range.start_row(), 1);
        assert_eq!(range.a1(), "Giselle!A1:C");
    }

    #[test]
    fn multi_letter_columns_round_trip() {
        let range: LedgerRange = "Log!Z3:AB10".parse().unwrap();
        assert_eq!(range.start_col(), 25);
        assert_eq!(range.end_col(), Some(27));
        assert_eq!(range.a1(), "Log!Z3:AB10");
    }

    #[test]
    fn first_column_narrows_to_the_id_column() {
        let range: LedgerRange = "Giselle!A2:C".parse().unwrap();
        assert_eq!(range.first_column().a1(), "Giselle!A2:A");
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!("A2:C".parse::<LedgerRange>().is_err());
        assert!("!A2:C".parse::<LedgerRange>().is_err());
        assert!("Giselle!2:C".parse::<LedgerRange>().is_err());
        assert!("Giselle!C2:A".parse::<LedgerRange>().is_err());
        assert!("Giselle!A0:C".parse::<LedgerRange>().is_err());
        assert!("Giselle!A-2:C".parse::<LedgerRange>().is_err());
    }

    #[tokio::test]
    async fn get_on_missing_sheet_is_empty() {
        let ledger = MemoryLedger::new();
        let range: LedgerRange = "peepee!A2:C".parse().unwrap();
        assert!(ledger.get(&range).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_lands_below_the_start_row_and_after_existing_rows() {
        let ledger = MemoryLedger::new();
        let range: LedgerRange = "Giselle!A2:C".parse().unwrap();

        ledger
            .append(&range, &[row(&["O1", "latte", "t1"])])
            .await
            .unwrap();
        ledger
            .append(&range, &[row(&["O2", "mocha", "t2"])])
            .await
            .unwrap();

        let grid = ledger.snapshot("Giselle").unwrap();
        assert!(grid[0].is_empty(), "header row must stay untouched");
        assert_eq!(grid[1], row(&["O1", "latte", "t1"]));
        assert_eq!(grid[2], row(&["O2", "mocha", "t2"]));

        let rows = ledger.get(&range).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn get_restricts_to_range_columns() {
        let ledger = MemoryLedger::new();
        let wide: LedgerRange = "Giselle!A2:C".parse().unwrap();
        let ids: LedgerRange = "Giselle!A2:A".parse().unwrap();
        ledger
            .append(&wide, &[row(&["O1", "latte", "t1"]), row(&["O2", "mocha", "t2"])])
            .await
            .unwrap();

        let rows = ledger.get(&ids).await.unwrap();
        assert_eq!(rows, vec![row(&["O1"]), row(&["O2"])]);
    }

    #[tokio::test]
    async fn clear_blanks_range_and_keeps_header() {
        let ledger = MemoryLedger::new();
        let header: LedgerRange = "Combined sheet!A1:C1".parse().unwrap();
        let body: LedgerRange = "Combined sheet!A2:C".parse().unwrap();
        ledger
            .append(&header, &[row(&["Form ID", "Coffee", "Time"])])
            .await
            .unwrap();
        ledger
            .append(&body, &[row(&["O1", "latte", "t1"])])
            .await
            .unwrap();

        ledger.clear(&body).await.unwrap();

        assert!(ledger.get(&body).await.unwrap().is_empty());
        assert_eq!(
            ledger.get(&header).await.unwrap(),
            vec![row(&["Form ID", "Coffee", "Time"])]
        );

        ledger
            .append(&body, &[row(&["O9", "flat white", "t9"])])
            .await
            .unwrap();
        assert_eq!(
            ledger.snapshot("Combined sheet").unwrap()[1],
            row(&["O9", "flat white", "t9"])
        );
    }
}
