//! DataFrame helpers shared by the `add_field` operations.

use coa_ingest::any_to_string;
use coa_model::{CoaError, Result};
use polars::prelude::{AnyValue, DataFrame};

/// Cells of `column` as text; nulls and empty strings become `None`.
pub fn text_values(df: &DataFrame, column: &str) -> Result<Vec<Option<String>>> {
    let Ok(values) = df.column(column) else {
        return Err(CoaError::UnknownField {
            field: column.to_string(),
            available: column_names(df).join(", "),
        });
    };
    let mut out = Vec::with_capacity(values.len());
    for idx in 0..values.len() {
        let value = values.get(idx)?;
        out.push(match value {
            AnyValue::Null => None,
            other => Some(any_to_string(other)).filter(|s| !s.trim().is_empty()),
        });
    }
    Ok(out)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Fails on the first requested field already present in `df`, unless
/// `overload` allows replacing it.
pub fn check_new_fields<S: AsRef<str>>(df: &DataFrame, fields: &[S], overload: bool) -> Result<()> {
    if overload {
        return Ok(());
    }
    let existing = column_names(df);
    match fields
        .iter()
        .find(|field| existing.iter().any(|name| name == field.as_ref()))
    {
        Some(field) => Err(CoaError::FieldConflict {
            field: field.as_ref().to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;
    use polars::prelude::{IntoColumn, NamedFrom, Series};

    fn frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("where".into(), vec![Some("75"), None, Some(" ")]).into_column(),
            Series::new("cases".into(), vec![1.0, 2.0, 3.0]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn text_values_skip_blank_cells() {
        let values = text_values(&frame(), "where").unwrap();
        assert_eq!(values, vec![Some("75".to_string()), None, None]);
        let numbers = text_values(&frame(), "cases").unwrap();
        assert_eq!(numbers[1].as_deref(), Some("2"));
    }

    #[test]
    fn missing_key_column_is_unknown_field() {
        let err = text_values(&frame(), "location").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
    }

    #[test]
    fn existing_field_conflicts_without_overload() {
        let df = frame();
        let err = check_new_fields(&df, &["cases"], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldConflict);
        assert!(check_new_fields(&df, &["cases"], true).is_ok());
        assert!(check_new_fields(&df, &["population"], false).is_ok());
    }
}
