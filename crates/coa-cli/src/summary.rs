//! Terminal tables.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use coa_geo::{Region, RegionRule, Resolution, ResolveMethod};
use coa_geo::country::SubregionRecord;
use coa_ingest::format_numeric;
use coa_parser::{CanonicalTable, ParseReport};

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
}

pub fn resolution_table(resolutions: &[Resolution]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Input"),
        header_cell("Output"),
        header_cell("Method"),
        header_cell("Alternatives"),
    ]);
    apply_table_style(&mut table);
    for resolution in resolutions {
        let alternatives: Vec<&str> = resolution
            .candidates
            .iter()
            .skip(1)
            .map(|candidate| candidate.name.as_str())
            .collect();
        table.add_row(vec![
            Cell::new(&resolution.input),
            output_cell(&resolution.canonical),
            method_cell(resolution.method),
            if alternatives.is_empty() {
                dim_cell("-")
            } else {
                Cell::new(alternatives.join(", ")).fg(Color::Yellow)
            },
        ]);
    }
    table
}

pub fn list_table(header: &str, values: &[String]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell(header)]);
    apply_table_style(&mut table);
    for value in values {
        table.add_row(vec![Cell::new(value)]);
    }
    table
}

pub fn region_table<'a>(regions: impl IntoIterator<Item = &'a Region>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Region"),
        header_cell("Code"),
        header_cell("Kind"),
        header_cell("Parent"),
        header_cell("Members"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for region in regions {
        table.add_row(vec![
            Cell::new(&region.name).add_attribute(Attribute::Bold),
            Cell::new(&region.code),
            Cell::new(match region.rule {
                RegionRule::Static => "static",
                RegionRule::Derived => "derived",
                RegionRule::Union => "union",
            }),
            region
                .parent
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(region.members.len()),
        ]);
    }
    table
}

pub fn subregion_table<'a>(subregions: impl IntoIterator<Item = &'a SubregionRecord>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Code"),
        header_cell("Subregion"),
        header_cell("Region code"),
        header_cell("Region"),
        header_cell("Population"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);
    for subregion in subregions {
        table.add_row(vec![
            Cell::new(&subregion.code).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(&subregion.name),
            Cell::new(&subregion.region_code),
            Cell::new(&subregion.region_name),
            number_cell(subregion.population),
        ]);
    }
    table
}

pub fn report_table(report: &ParseReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Dataset"), header_cell(&report.dataset)]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows = [
        ("Source blocks", report.blocks, None),
        ("Rows read", report.source_rows, None),
        ("Rows filtered by rules", report.filtered_rows, None),
        ("Rows with invalid dates", report.invalid_dates, Some(Color::Yellow)),
        (
            "Rows with unresolved locations",
            report.unresolved.values().sum(),
            Some(Color::Yellow),
        ),
        ("Rows filled", report.filled_rows, None),
        ("Rows produced", report.rows, Some(Color::Green)),
    ];
    for (label, count, highlight) in rows {
        let count_cell = match highlight {
            Some(color) if count > 0 => Cell::new(count).fg(color).add_attribute(Attribute::Bold),
            _ if count == 0 => dim_cell(count),
            _ => Cell::new(count),
        };
        table.add_row(vec![Cell::new(label), count_cell]);
    }
    table
}

pub fn unresolved_table(report: &ParseReport) -> Option<Table> {
    if report.unresolved.is_empty() {
        return None;
    }
    let mut table = Table::new();
    table.set_header(vec![header_cell("Unresolved location"), header_cell("Rows")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for (location, rows) in &report.unresolved {
        table.add_row(vec![Cell::new(location).fg(Color::Yellow), Cell::new(rows)]);
    }
    Some(table)
}

/// First `limit` rows of `canonical`, without geometry.
pub fn head_table(canonical: &CanonicalTable, limit: usize) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell("date"), header_cell("where"), header_cell("code")];
    header.extend(canonical.variables().iter().map(|v| header_cell(v)));
    table.set_header(header);
    apply_table_style(&mut table);
    for idx in 3..3 + canonical.variables().len() {
        align_column(&mut table, idx, CellAlignment::Right);
    }
    for row in canonical.rows().iter().take(limit) {
        let mut cells = vec![
            Cell::new(row.date.format("%Y-%m-%d")),
            Cell::new(&row.location),
            Cell::new(&row.code),
        ];
        cells.extend(row.values.iter().map(|value| number_cell(*value)));
        table.add_row(cells);
    }
    table
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn output_cell(value: &str) -> Cell {
    if value.is_empty() {
        dim_cell("(not a country)")
    } else {
        Cell::new(value).fg(Color::Green).add_attribute(Attribute::Bold)
    }
}

fn method_cell(method: ResolveMethod) -> Cell {
    match method {
        ResolveMethod::Exact => Cell::new("exact"),
        ResolveMethod::Alias => Cell::new("alias").fg(Color::Blue),
        ResolveMethod::Fuzzy => Cell::new("fuzzy").fg(Color::Yellow),
        ResolveMethod::NotACountry | ResolveMethod::Empty => dim_cell("skipped"),
    }
}

fn number_cell(value: Option<f64>) -> Cell {
    value.map_or_else(|| dim_cell("-"), |v| Cell::new(format_numeric(v)))
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_table_lists_every_count() {
        let mut report = ParseReport {
            dataset: "demo".to_string(),
            blocks: 2,
            source_rows: 40,
            rows: 36,
            ..ParseReport::default()
        };
        report.unresolved.insert("Diamond Princess".to_string(), 4);
        let rendered = report_table(&report).to_string();
        assert!(rendered.contains("demo"));
        assert!(rendered.contains("Rows with unresolved locations"));
        assert!(rendered.contains("36"));
        let unresolved = unresolved_table(&report).unwrap().to_string();
        assert!(unresolved.contains("Diamond Princess"));
    }

    #[test]
    fn nothing_unresolved_prints_nothing() {
        assert!(unresolved_table(&ParseReport::default()).is_none());
    }
}
