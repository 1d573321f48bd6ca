use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::models::SalesRecord;

pub const DATE_COLUMN: &str = "fecha";
pub const TOTAL_COLUMN: &str = "total";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];
/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("cannot read workbook: {0}")]
    Open(String),

    #[error("workbook has no worksheets")]
    NoWorksheet,

    #[error("first worksheet is empty")]
    EmptySheet,

    #[error("column '{0}' not found")]
    MissingColumn(&'static str),

    #[error("row {row}: cannot parse {value:?} as a date")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: cannot parse {value:?} as a sales total")]
    InvalidTotal { row: usize, value: String },

    #[error("row {row}: sales total {value} is negative")]
    NegativeTotal { row: usize, value: f64 },

    #[error("worksheet contains no sales records")]
    NoRecords,
}

/// First worksheet of a workbook: lower-cased header plus data rows.
/// Rows with no non-empty cell are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    columns: Vec<String>,
    rows: Vec<Vec<Data>>,
}

impl SheetTable {
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self, SpreadsheetError> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| SpreadsheetError::Open(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or(SpreadsheetError::NoWorksheet)?
            .map_err(|e| SpreadsheetError::Open(e.to_string()))?;

        let mut rows = range
            .rows()
            .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)));
        let header = rows.next().ok_or(SpreadsheetError::EmptySheet)?;
        let columns = header
            .iter()
            .map(|cell| cell.to_string().trim().to_lowercase())
            .collect();
        let rows: Vec<Vec<Data>> = rows.map(<[Data]>::to_vec).collect();

        debug!(rows = rows.len(), "worksheet loaded");
        Ok(Self { columns, rows })
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Data>>) -> Self {
        Self {
            columns: columns.into_iter().map(|c| c.trim().to_lowercase()).collect(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First `limit` rows as JSON values, padded to the header width.
    pub fn preview(&self, limit: usize) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                (0..self.columns.len())
                    .map(|i| row.get(i).map(cell_to_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }

    /// Parses the `fecha` and `total` columns. Row numbers in errors are
    /// 1-based data rows.
    pub fn sales_records(&self) -> Result<Vec<SalesRecord>, SpreadsheetError> {
        let date_idx = self
            .column_index(DATE_COLUMN)
            .ok_or(SpreadsheetError::MissingColumn(DATE_COLUMN))?;
        let total_idx = self
            .column_index(TOTAL_COLUMN)
            .ok_or(SpreadsheetError::MissingColumn(TOTAL_COLUMN))?;

        let mut records = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            let number = i + 1;
            let date_cell = row.get(date_idx).unwrap_or(&Data::Empty);
            let total_cell = row.get(total_idx).unwrap_or(&Data::Empty);

            let date = parse_date_cell(date_cell).ok_or_else(|| SpreadsheetError::InvalidDate {
                row: number,
                value: date_cell.to_string(),
            })?;
            let total =
                parse_total_cell(total_cell).ok_or_else(|| SpreadsheetError::InvalidTotal {
                    row: number,
                    value: total_cell.to_string(),
                })?;
            if total < 0.0 {
                return Err(SpreadsheetError::NegativeTotal {
                    row: number,
                    value: total,
                });
            }
            records.push(SalesRecord::new(date, total));
        }

        if records.is_empty() {
            return Err(SpreadsheetError::NoRecords);
        }
        Ok(records)
    }
}

pub fn cell_to_json(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Value::String(format_datetime(datetime)),
            None => Value::String(cell.to_string()),
        },
        Data::Error(err) => Value::String(err.to_string()),
    }
}

fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.time() == chrono::NaiveTime::MIN {
        datetime.date().format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Accepts native date cells, ISO and common textual dates, and Excel serial numbers.
pub fn parse_date_cell(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::DateTimeIso(s) | Data::String(s) => parse_date_str(s),
        Data::Float(f) => excel_serial_to_date(*f),
        Data::Int(i) => excel_serial_to_date(*i as f64),
        _ => None,
    }
}

pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(serial.floor() as u64))
}

/// Numeric cells as-is; text is accepted when it parses as a finite number.
pub fn parse_total_cell(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        Data::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn table(rows: Vec<Vec<Data>>) -> SheetTable {
        SheetTable::from_rows(vec![" Fecha ".into(), "TOTAL".into(), "tienda".into()], rows)
    }

    #[rstest]
    #[case("2024-03-05")]
    #[case("2024/03/05")]
    #[case("03/05/2024")]
    #[case("05-03-2024")]
    #[case("2024-03-05 13:45:00")]
    #[case("2024-03-05T00:00:00")]
    fn parses_textual_dates(#[case] raw: &str) {
        assert_eq!(
            parse_date_str(raw),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
    }

    #[test]
    fn parses_excel_serial_dates() {
        assert_eq!(
            parse_date_cell(&Data::Float(45356.0)),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            parse_date_cell(&Data::Int(45356)),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_date_cell(&Data::Float(-3.0)), None);
        assert_eq!(parse_date_cell(&Data::Bool(true)), None);
    }

    #[test]
    fn totals_accept_numbers_and_numeric_text() {
        assert_eq!(parse_total_cell(&Data::Float(12.5)), Some(12.5));
        assert_eq!(parse_total_cell(&Data::Int(7)), Some(7.0));
        assert_eq!(parse_total_cell(&Data::String(" 3.25 ".into())), Some(3.25));
        assert_eq!(parse_total_cell(&Data::String("n/a".into())), None);
        assert_eq!(parse_total_cell(&Data::Float(f64::NAN)), None);
        assert_eq!(parse_total_cell(&Data::Empty), None);
    }

    #[test]
    fn header_is_normalised() {
        let t = table(vec![]);
        assert_eq!(t.columns(), ["fecha", "total", "tienda"]);
        assert_eq!(t.column_index("total"), Some(1));
    }

    #[test]
    fn extracts_sales_records() {
        let t = table(vec![
            vec![Data::String("2024-03-02".into()), Data::Float(20.0), Data::String("a".into())],
            vec![Data::String("2024-03-01".into()), Data::Int(10)],
        ]);
        let records = t.sales_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(records[1].total, 10.0);
    }

    #[test]
    fn missing_columns_are_reported() {
        let t = SheetTable::from_rows(vec!["fecha".into(), "monto".into()], vec![]);
        assert_matches!(t.sales_records(), Err(SpreadsheetError::MissingColumn("total")));
    }

    #[test]
    fn bad_cells_name_their_row() {
        let t = table(vec![
            vec![Data::String("2024-03-01".into()), Data::Float(1.0)],
            vec![Data::String("yesterday".into()), Data::Float(1.0)],
        ]);
        assert_matches!(
            t.sales_records(),
            Err(SpreadsheetError::InvalidDate { row: 2, .. })
        );

        let t = table(vec![vec![Data::String("2024-03-01".into()), Data::Float(-4.0)]]);
        assert_matches!(
            t.sales_records(),
            Err(SpreadsheetError::NegativeTotal { row: 1, .. })
        );

        let t = table(vec![vec![Data::String("2024-03-01".into()), Data::Empty]]);
        assert_matches!(
            t.sales_records(),
            Err(SpreadsheetError::InvalidTotal { row: 1, .. })
        );
    }

    #[test]
    fn header_only_sheet_has_no_records() {
        assert_matches!(table(vec![]).sales_records(), Err(SpreadsheetError::NoRecords));
    }

    #[test]
    fn preview_pads_and_limits_rows() {
        let t = table(vec![
            vec![Data::String("2024-03-01".into()), Data::Float(1.5)],
            vec![Data::String("2024-03-02".into()), Data::Int(2), Data::Bool(true)],
            vec![Data::String("2024-03-03".into()), Data::Float(3.0)],
        ]);
        let preview = t.preview(2);
        assert_eq!(preview.len(), 2);
        assert_eq!(
            preview[0],
            vec![Value::from("2024-03-01"), Value::from(1.5), Value::Null]
        );
        assert_eq!(preview[1][2], Value::Bool(true));
    }

    #[test]
    fn unreadable_file_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ventas.xlsx");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        assert_matches!(SheetTable::read(&path), Err(SpreadsheetError::Open(_)));
    }
}
