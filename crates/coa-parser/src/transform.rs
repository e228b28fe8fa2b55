//! Column and row transforms applied to dataset blocks.
//!
//! The text-level transforms work on a [`SourceTable`] before any typing;
//! the keyed transforms work on values already keyed by (location, date).

use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use coa_ingest::{SourceTable, format_numeric, parse_number};

use crate::schema::CastType;

/// Values keyed by (location, date); one slot per declared variable.
pub type KeyedValues = BTreeMap<(String, NaiveDate), Vec<Option<f64>>>;

/// Parses a date written year-first (`2020-03-02`, `2020/03/02`, `20200302`),
/// day-first with a four-digit year (`02/03/2020`, `02-03-2020`,
/// `02.03.2020`) or month-first with a two-digit year (`3/2/20`). Day and
/// month swap when the first of them cannot be a month. A time part is
/// ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split(['T', ' ']).next()?;
    let parts: Vec<&str> = date_part.split(['-', '/', '.']).collect();
    let (year, month, day) = match parts.as_slice() {
        [compact] if compact.len() == 8 && compact.is_ascii() => (
            date_component(&compact[..4])?,
            date_component(&compact[4..6])?,
            date_component(&compact[6..])?,
        ),
        [y, m, d] if y.len() == 4 => (
            date_component(y)?,
            date_component(m)?,
            date_component(d)?,
        ),
        [d, m, y] if y.len() == 4 => {
            swap_if_needed(date_component(y)?, date_component(m)?, date_component(d)?)
        }
        [m, d, y] if y.len() == 2 => swap_if_needed(
            2000 + date_component(y)?,
            date_component(m)?,
            date_component(d)?,
        ),
        _ => return None,
    };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

fn date_component(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// (year, month, day), swapping month and day when `month` exceeds 12.
fn swap_if_needed(year: u32, month: u32, day: u32) -> (u32, u32, u32) {
    if month > 12 && day <= 12 {
        (year, day, month)
    } else {
        (year, month, day)
    }
}

fn write_number(value: f64, decimal: char) -> String {
    let text = format_numeric(value);
    if decimal == '.' {
        text
    } else {
        text.replace('.', &decimal.to_string())
    }
}

/// Replaces `column` by its running sum per `group` column (or over the
/// whole table), in date order when `date_column` parses.
///
/// Missing cells stay missing and do not reset the sum.
pub fn cumulate(
    table: &mut SourceTable,
    column: &str,
    group: Option<&str>,
    date_column: Option<&str>,
    decimal: char,
) {
    let Some(value_idx) = table.column_index(column) else {
        return;
    };
    let groups: Vec<Vec<usize>> = match group.and_then(|g| table.group_indices(g)) {
        Some(groups) => groups.into_values().collect(),
        None => vec![(0..table.len()).collect()],
    };
    let date_idx = date_column.and_then(|d| table.column_index(d));
    for mut indices in groups {
        if let Some(date_idx) = date_idx {
            // Stable: rows with the same or no date keep file order.
            indices.sort_by_key(|&row| parse_date(&table.rows[row][date_idx]));
        }
        let mut running = 0.0;
        for row in indices {
            let cell = &mut table.rows[row][value_idx];
            if let Some(value) = parse_number(cell, decimal) {
                running += value;
                *cell = write_number(running, decimal);
            }
        }
    }
}

/// Drops rows whose `column` starts with any of `prefixes`.
pub fn drop_prefixed(table: &mut SourceTable, column: &str, prefixes: &[String]) -> usize {
    let Some(idx) = table.column_index(column) else {
        return 0;
    };
    let before = table.len();
    table.retain_rows(|row| !prefixes.iter().any(|p| row[idx].starts_with(p.as_str())));
    before - table.len()
}

/// Keeps rows whose `column` is one of `values`, then drops the column.
pub fn select_values(table: &mut SourceTable, column: &str, values: &[String]) -> usize {
    let Some(idx) = table.column_index(column) else {
        return 0;
    };
    let before = table.len();
    table.retain_rows(|row| values.iter().any(|v| row[idx] == *v));
    table.drop_column(column);
    before - table.len()
}

pub fn replace_values(table: &mut SourceTable, column: &str, replacements: &BTreeMap<String, String>) {
    let Some(idx) = table.column_index(column) else {
        return;
    };
    for row in &mut table.rows {
        if let Some(replacement) = replacements.get(&row[idx]) {
            row[idx].clone_from(replacement);
        }
    }
}

/// Rewrites the cells of `column` according to `cast`.
pub fn apply_cast(table: &mut SourceTable, column: &str, cast: CastType, decimal: char) {
    let Some(idx) = table.column_index(column) else {
        return;
    };
    if cast == CastType::String {
        return;
    }
    for row in &mut table.rows {
        let cell = &mut row[idx];
        if let Some(value) = parse_number(cell, decimal) {
            let value = if cast == CastType::Int { value.trunc() } else { value };
            *cell = write_number(value, decimal);
        }
    }
}

pub fn is_date_header(header: &str) -> bool {
    parse_date(header).is_some()
}

/// Turns one column per date into (`date_column`, `value_column`) rows.
///
/// Non-date columns are kept as identifiers on every produced row.
pub fn melt_dates(table: &SourceTable, date_column: &str, value_column: &str) -> SourceTable {
    let (date_cols, id_cols): (Vec<usize>, Vec<usize>) =
        (0..table.headers.len()).partition(|&idx| is_date_header(&table.headers[idx]));
    let mut headers: Vec<String> = id_cols.iter().map(|&i| table.headers[i].clone()).collect();
    headers.push(date_column.to_string());
    headers.push(value_column.to_string());

    let mut rows = Vec::with_capacity(table.len() * date_cols.len());
    for row in &table.rows {
        for &date_idx in &date_cols {
            let mut long: Vec<String> = id_cols.iter().map(|&i| row[i].clone()).collect();
            long.push(table.headers[date_idx].clone());
            long.push(row[date_idx].clone());
            rows.push(long);
        }
    }
    SourceTable::new(headers, rows)
}

/// Adds `values` into the slot of `key`, summing known values.
pub fn accumulate(target: &mut KeyedValues, key: (String, NaiveDate), values: &[Option<f64>]) {
    let slot = target
        .entry(key)
        .or_insert_with(|| vec![None; values.len()]);
    for (current, value) in slot.iter_mut().zip(values) {
        if let Some(value) = value {
            *current = Some(current.unwrap_or(0.0) + value);
        }
    }
}

/// Inserts every missing day inside each location's observed span and fills
/// missing values forward, then backward. Returns the number of inserted rows.
pub fn fill_gaps(values: &mut KeyedValues, width: usize) -> usize {
    let mut spans: HashMap<String, (NaiveDate, NaiveDate)> = HashMap::new();
    for (location, date) in values.keys() {
        let span = spans.entry(location.clone()).or_insert((*date, *date));
        span.0 = span.0.min(*date);
        span.1 = span.1.max(*date);
    }

    let mut inserted = 0;
    for (location, (first, last)) in &spans {
        let mut day = *first;
        while day <= *last {
            if !values.contains_key(&(location.clone(), day)) {
                values.insert((location.clone(), day), vec![None; width]);
                inserted += 1;
            }
            let Some(next) = day.checked_add_days(Days::new(1)) else {
                break;
            };
            day = next;
        }
    }

    // Keys are ordered by location then date, so each location is one run.
    let keys: Vec<(String, NaiveDate)> = values.keys().cloned().collect();
    let mut start = 0;
    while start < keys.len() {
        let end = keys[start..]
            .iter()
            .position(|(location, _)| *location != keys[start].0)
            .map_or(keys.len(), |offset| start + offset);
        for slot in 0..width {
            fill_slot(values, &keys[start..end], slot);
        }
        start = end;
    }
    inserted
}

fn fill_slot(values: &mut KeyedValues, run: &[(String, NaiveDate)], slot: usize) {
    let mut last = None;
    for key in run {
        if let Some(row) = values.get_mut(key) {
            match row[slot] {
                Some(value) => last = Some(value),
                None => row[slot] = last,
            }
        }
    }
    let mut next = None;
    for key in run.iter().rev() {
        if let Some(row) = values.get_mut(key) {
            match row[slot] {
                Some(value) => next = Some(value),
                None => row[slot] = next,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> SourceTable {
        SourceTable::new(
            headers.iter().map(|h| (*h).to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| (*c).to_string()).collect())
                .collect(),
        )
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    #[test]
    fn dates_in_several_layouts() {
        assert_eq!(parse_date("2020-03-02"), Some(day(2)));
        assert_eq!(parse_date("02/03/2020"), Some(day(2)));
        assert_eq!(parse_date("3/2/20"), Some(day(2)));
        assert_eq!(parse_date("2020-03-02T00:00:00Z"), Some(day(2)));
        assert_eq!(parse_date("20200302"), Some(day(2)));
        assert_eq!(parse_date("03/22/2020"), Some(day(22)));
        assert_eq!(parse_date("22/3/20"), Some(day(22)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("Lat"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn cumulative_per_location_in_date_order() {
        let mut t = table(
            &["where", "date", "deaths"],
            &[
                &["A", "2020-03-02", "3"],
                &["B", "2020-03-01", "1"],
                &["A", "2020-03-01", "5"],
                &["A", "2020-03-03", ""],
                &["A", "2020-03-04", "2"],
            ],
        );
        cumulate(&mut t, "deaths", Some("where"), Some("date"), '.');
        let deaths: Vec<&str> = t.column("deaths").unwrap().collect();
        assert_eq!(deaths, vec!["8", "1", "5", "", "10"]);
    }

    #[test]
    fn cumulative_keeps_decimal_comma() {
        let mut t = table(&["v"], &[&["1,5"], &["2,25"]]);
        cumulate(&mut t, "v", None, None, ',');
        let values: Vec<&str> = t.column("v").unwrap().collect();
        assert_eq!(values, vec!["1,5", "3,75"]);
    }

    #[test]
    fn selections_drops_and_replacements() {
        let mut t = table(
            &["where", "sex", "v"],
            &[
                &["Total France", "0", "9"],
                &["75", "0", "1"],
                &["75", "1", "2"],
                &["92", "0", "3"],
            ],
        );
        assert_eq!(drop_prefixed(&mut t, "where", &["Total".to_string()]), 1);
        assert_eq!(select_values(&mut t, "sex", &["0".to_string()]), 1);
        assert!(!t.has_column("sex"));
        let replacements = BTreeMap::from([("92".to_string(), "093".to_string())]);
        replace_values(&mut t, "where", &replacements);
        let locations: Vec<&str> = t.column("where").unwrap().collect();
        assert_eq!(locations, vec!["75", "093"]);
    }

    #[test]
    fn int_cast_truncates() {
        let mut t = table(&["code", "v"], &[&["01", "2.7"]]);
        apply_cast(&mut t, "code", CastType::String, '.');
        apply_cast(&mut t, "v", CastType::Int, '.');
        assert_eq!(t.rows[0], vec!["01", "2"]);
    }

    #[test]
    fn melt_wide_dates() {
        let t = table(
            &["where", "Lat", "1/22/20", "1/23/20"],
            &[&["France", "46", "0", "2"], &["Italy", "43", "1", "3"]],
        );
        let long = melt_dates(&t, "date", "cases");
        assert_eq!(long.headers, vec!["where", "Lat", "date", "cases"]);
        assert_eq!(long.len(), 4);
        assert_eq!(long.rows[3], vec!["Italy", "43", "1/23/20", "3"]);
    }

    #[test]
    fn gaps_are_filled_from_the_previous_day() {
        let mut values = KeyedValues::new();
        accumulate(&mut values, ("A".into(), day(1)), &[Some(4.0), None]);
        accumulate(&mut values, ("A".into(), day(3)), &[Some(6.0), Some(1.0)]);
        accumulate(&mut values, ("B".into(), day(2)), &[Some(1.0), Some(1.0)]);
        accumulate(&mut values, ("B".into(), day(2)), &[Some(2.0), None]);

        let inserted = fill_gaps(&mut values, 2);
        assert_eq!(inserted, 1);
        assert_eq!(values[&("A".to_string(), day(2))], vec![Some(4.0), Some(1.0)]);
        assert_eq!(values[&("A".to_string(), day(1))], vec![Some(4.0), Some(1.0)]);
        assert_eq!(values[&("B".to_string(), day(2))], vec![Some(3.0), Some(1.0)]);
        assert_eq!(values.len(), 4);
    }
}
