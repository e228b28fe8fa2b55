use std::collections::BTreeMap;

use coa_model::{CoaError, Result};
use csv::ReaderBuilder;
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};

/// Raw CSV source: normalized headers and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub separator: u8,
    /// Keep only these columns, in this order.
    pub columns: Option<Vec<String>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            columns: None,
        }
    }
}

impl ReadOptions {
    /// Separator from a declared string; multi-character or empty values fall
    /// back to a comma.
    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = match separator.as_bytes() {
            [single] => *single,
            b"\\t" => b'\t',
            _ => b',',
        };
        self
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_cell(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

impl SourceTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Parses CSV bytes; `origin` names the source in errors.
    pub fn from_bytes(bytes: &[u8], origin: &str, options: &ReadOptions) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.separator)
            .from_reader(bytes);
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(origin, &e))?
            .iter()
            .map(normalize_header)
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(origin, &e))?;
            let mut row: Vec<String> = record.iter().map(normalize_cell).collect();
            if row.iter().all(String::is_empty) {
                continue;
            }
            row.resize(headers.len(), String::new());
            rows.push(row);
        }
        let table = Self { headers, rows };
        match &options.columns {
            Some(columns) => table.select(columns).map_err(|e| match e {
                CoaError::Csv { message, .. } => CoaError::Csv {
                    origin: origin.to_string(),
                    message,
                },
                other => other,
            }),
            None => Ok(table),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keeps only `columns`, in that order.
    pub fn select(&self, columns: &[String]) -> Result<Self> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            let idx = self.column_index(name).ok_or_else(|| CoaError::Csv {
                origin: String::new(),
                message: format!(
                    "missing column '{name}' (available: {})",
                    self.headers.join(", ")
                ),
            })?;
            indices.push(idx);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Self {
            headers: columns.to_vec(),
            rows,
        })
    }

    pub fn drop_column(&mut self, name: &str) {
        if let Some(idx) = self.column_index(name) {
            self.headers.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(idx) = self.column_index(from) {
            self.headers[idx] = to.to_string();
        }
    }

    /// Keeps rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[String]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Row indices grouped by the value of `column`, groups in key order.
    pub fn group_indices(&self, column: &str) -> Option<BTreeMap<String, Vec<usize>>> {
        let idx = self.column_index(column)?;
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (row_idx, row) in self.rows.iter().enumerate() {
            groups.entry(row[idx].clone()).or_default().push(row_idx);
        }
        Some(groups)
    }

    /// All-string polars frame with the same columns.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<&str> = self.rows.iter().map(|row| row[idx].as_str()).collect();
                Series::new(name.as_str().into(), values).into_column()
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

fn csv_error(origin: &str, error: &csv::Error) -> CoaError {
    CoaError::Csv {
        origin: origin.to_string(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_with_separator_and_subset() {
        let bytes = "\u{feff}dep ; jour;hosp;rea\n75;2020-03-18;2;1\n13;2020-03-18;5;\n".as_bytes();
        let options = ReadOptions::default()
            .with_separator(";")
            .with_columns(vec!["dep".to_string(), "hosp".to_string()]);
        let table = SourceTable::from_bytes(bytes, "inline", &options).unwrap();
        assert_eq!(table.headers, vec!["dep", "hosp"]);
        assert_eq!(table.rows, vec![vec!["75", "2"], vec!["13", "5"]]);
    }

    #[test]
    fn short_rows_are_padded_and_blank_rows_skipped() {
        let bytes = b"a,b,c\n1,2\n,,\n4,5,6\n";
        let table = SourceTable::from_bytes(bytes, "inline", &ReadOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0], vec!["1", "2", ""]);
    }

    #[test]
    fn missing_subset_column_names_origin() {
        let options = ReadOptions::default().with_columns(vec!["zzz".to_string()]);
        let err = SourceTable::from_bytes(b"a,b\n1,2\n", "https://x/y.csv", &options).unwrap_err();
        match err {
            CoaError::Csv { origin, message } => {
                assert_eq!(origin, "https://x/y.csv");
                assert!(message.contains("zzz"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn to_frame_keeps_strings() {
        let table = SourceTable::new(
            vec!["where".to_string(), "cases".to_string()],
            vec![vec!["France".to_string(), "3".to_string()]],
        );
        let df = table.to_frame().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("where").unwrap().str().unwrap().get(0), Some("France"));
    }
}
