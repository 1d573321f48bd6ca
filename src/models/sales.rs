use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the uploaded spreadsheet after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub total: f64,
}

impl SalesRecord {
    pub fn new(date: NaiveDate, total: f64) -> Self {
        Self { date, total }
    }
}

/// Sales records ordered ascending by date.
///
/// Duplicate dates are kept in their original relative order and gaps are
/// not filled; downstream stages treat consecutive records as consecutive days.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesDataset {
    records: Vec<SalesRecord>,
}

impl SalesDataset {
    pub fn new(mut records: Vec<SalesRecord>) -> Self {
        // stable: duplicates keep upload order
        records.sort_by_key(|record| record.date);
        Self { records }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|record| record.date).collect()
    }

    pub fn totals(&self) -> Vec<f64> {
        self.records.iter().map(|record| record.total).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|record| record.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|record| record.date)
    }

    /// Sum of every `total` in the dataset.
    pub fn total_sales(&self) -> f64 {
        self.records.iter().map(|record| record.total).sum()
    }
}
