//! The canonical (date, location) table and the parse report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use coa_model::{Result, columns};
use polars::prelude::{Column, DataFrame, DataType, IntoColumn, NamedFrom, Series};

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub date: NaiveDate,
    /// Display name of the location.
    pub location: String,
    pub code: String,
    /// One value per variable of the table, in the table's variable order.
    pub values: Vec<Option<f64>>,
    /// GeoJSON geometry, shared between rows of one location.
    pub geometry: Option<Arc<str>>,
}

/// Rows keyed by (code, date), sorted by location then date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    variables: Vec<String>,
    rows: Vec<CanonicalRow>,
}

impl CanonicalTable {
    pub fn new(variables: Vec<String>, mut rows: Vec<CanonicalRow>) -> Self {
        rows.sort_by(|a, b| (&a.location, &a.code, a.date).cmp(&(&b.location, &b.code, b.date)));
        Self { variables, rows }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct location names.
    pub fn locations(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.location.as_str()).collect()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.iter().map(|r| r.date).min()?;
        let last = self.rows.iter().map(|r| r.date).max()?;
        Some((first, last))
    }

    /// Value of `variable` for the location named or coded `location` on `date`.
    pub fn value(&self, location: &str, date: NaiveDate, variable: &str) -> Option<f64> {
        let slot = self.variables.iter().position(|v| v == variable)?;
        self.rows
            .iter()
            .find(|r| r.date == date && (r.location == location || r.code == location))
            .and_then(|r| r.values[slot])
    }

    /// Number of rows per (code, date); every count is 1 for a well-formed table.
    pub fn key_counts(&self) -> BTreeMap<(&str, NaiveDate), usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry((row.code.as_str(), row.date)).or_insert(0) += 1;
        }
        counts
    }

    /// Columns `date` (Date), `where`, `code`, one Float64 column per
    /// variable, then `geometry`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let days: Vec<i32> = self
            .rows
            .iter()
            .map(|r| i32::try_from((r.date - epoch).num_days()).unwrap_or(i32::MAX))
            .collect();
        let mut frame_columns: Vec<Column> = vec![
            Series::new(columns::DATE.into(), days)
                .cast(&DataType::Date)?
                .into_column(),
            Series::new(
                columns::WHERE.into(),
                self.rows.iter().map(|r| r.location.as_str()).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(
                columns::CODE.into(),
                self.rows.iter().map(|r| r.code.as_str()).collect::<Vec<_>>(),
            )
            .into_column(),
        ];
        for (slot, variable) in self.variables.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.values[slot]).collect();
            frame_columns.push(Series::new(variable.as_str().into(), values).into_column());
        }
        let geometry: Vec<Option<&str>> = self.rows.iter().map(|r| r.geometry.as_deref()).collect();
        frame_columns.push(Series::new(columns::GEOMETRY.into(), geometry).into_column());
        Ok(DataFrame::new(frame_columns)?)
    }
}

/// What a parse kept, dropped and filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub dataset: String,
    pub blocks: usize,
    /// Rows read from all sources, before filtering.
    pub source_rows: usize,
    /// Rows removed by `drop` and `selections` rules.
    pub filtered_rows: usize,
    /// Rows whose date did not parse.
    pub invalid_dates: usize,
    /// Raw location → number of rows dropped because it did not resolve.
    pub unresolved: BTreeMap<String, usize>,
    /// Rows inserted to close date gaps.
    pub filled_rows: usize,
    /// Rows of the canonical table.
    pub rows: usize,
}

impl ParseReport {
    /// Rows lost to bad dates or unresolved locations.
    pub fn dropped_rows(&self) -> usize {
        self.invalid_dates + self.unresolved.values().sum::<usize>()
    }

    pub fn has_drops(&self) -> bool {
        self.dropped_rows() > 0
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDataset {
    pub table: CanonicalTable,
    pub report: ParseReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, location: &str, value: f64) -> CanonicalRow {
        CanonicalRow {
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            location: location.to_string(),
            code: location[..3].to_ascii_uppercase(),
            values: vec![Some(value)],
            geometry: None,
        }
    }

    #[test]
    fn frame_has_typed_columns() {
        let table = CanonicalTable::new(
            vec!["cases".to_string()],
            vec![row(2, "France", 2.0), row(1, "France", 1.0), row(1, "Italy", 5.0)],
        );
        let df = table.to_frame().unwrap();
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|name| name.as_str())
                .collect::<Vec<_>>(),
            vec!["date", "where", "code", "cases", "geometry"]
        );
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(df.column("cases").unwrap().dtype(), &DataType::Float64);
        let cases = df.column("cases").unwrap().f64().unwrap();
        assert_eq!(cases.get(0), Some(1.0));
        assert_eq!(
            table.value("ITA", NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), "cases"),
            Some(5.0)
        );
        assert!(table.key_counts().values().all(|&count| count == 1));
    }

    #[test]
    fn report_counts_drops() {
        let mut report = ParseReport {
            invalid_dates: 2,
            ..ParseReport::default()
        };
        report.unresolved.insert("Diamond Princess".to_string(), 3);
        assert_eq!(report.dropped_rows(), 5);
        assert!(report.has_drops());
    }
}
