//! Immutable region → subregion hierarchy of one country in one view.

use std::collections::BTreeMap;

use coa_model::{GeometryView, LocationMode, Result, normalize_key};
use geo::{Centroid, MultiPolygon};
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};

use super::adapter::ViewLayout;
use super::geometry::{combine, magnify, relocate, to_geojson_string};

/// Column names of hierarchy tables.
pub mod columns {
    pub const SUBREGION_CODE: &str = "code_subregion";
    pub const SUBREGION_NAME: &str = "name_subregion";
    pub const SUBREGION_POPULATION: &str = "population_subregion";
    pub const SUBREGION_AREA: &str = "area_subregion";
    pub const REGION_CODE: &str = "code_region";
    pub const REGION_NAME: &str = "name_region";
    pub const REGION_POPULATION: &str = "population_region";
    pub const REGION_AREA: &str = "area_region";
    pub const GEOMETRY: &str = "geometry";
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubregionRecord {
    pub code: String,
    pub name: String,
    pub region_code: String,
    pub region_name: String,
    pub population: Option<f64>,
    pub area: Option<f64>,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub code: String,
    pub name: String,
    pub population: Option<f64>,
    pub area: Option<f64>,
    pub geometry: MultiPolygon<f64>,
    /// Subregion codes, sorted.
    pub subregions: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct LocatedArea<'a> {
    pub code: &'a str,
    pub name: &'a str,
    pub geometry: &'a MultiPolygon<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Region,
    Subregion,
}

/// Case, accent and punctuation insensitive key for name matching.
pub fn fold_name(raw: &str) -> String {
    normalize_key(raw)
        .chars()
        .map(|c| match c {
            'À' | 'Â' | 'Ä' | 'Á' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Î' | 'Ï' | 'Í' => 'I',
            'Ô' | 'Ö' | 'Ó' => 'O',
            'Ù' | 'Û' | 'Ü' | 'Ú' => 'U',
            'Ç' => 'C',
            '-' | '\'' | '’' => ' ',
            other => other,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct HierarchySnapshot {
    country: String,
    view: GeometryView,
    subregions: Vec<SubregionRecord>,
    regions: Vec<RegionRecord>,
}

impl HierarchySnapshot {
    pub fn new(country: impl Into<String>, view: GeometryView, subregions: Vec<SubregionRecord>) -> Self {
        let regions = aggregate_regions(&subregions);
        Self {
            country: country.into(),
            view,
            subregions,
            regions,
        }
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn view(&self) -> GeometryView {
        self.view
    }

    pub fn subregions(&self) -> &[SubregionRecord] {
        &self.subregions
    }

    pub fn regions(&self) -> &[RegionRecord] {
        &self.regions
    }

    pub fn subregion(&self, code: &str) -> Option<&SubregionRecord> {
        let key = normalize_key(code);
        self.subregions
            .iter()
            .find(|s| normalize_key(&s.code) == key)
    }

    pub fn region(&self, code: &str) -> Option<&RegionRecord> {
        let key = normalize_key(code);
        self.regions.iter().find(|r| normalize_key(&r.code) == key)
    }

    /// Subregion by code or by name.
    pub fn find_subregion(&self, value: &str, mode: LocationMode) -> Option<&SubregionRecord> {
        match mode {
            LocationMode::Code => self.subregion(value),
            LocationMode::Name => {
                let key = fold_name(value);
                self.subregions.iter().find(|s| fold_name(&s.name) == key)
            }
        }
    }

    /// Region by code or by name.
    pub fn find_region(&self, value: &str, mode: LocationMode) -> Option<&RegionRecord> {
        match mode {
            LocationMode::Code => self.region(value),
            LocationMode::Name => {
                let key = fold_name(value);
                self.regions.iter().find(|r| fold_name(&r.name) == key)
            }
        }
    }

    /// Region or subregion matching `value`, reduced to code, name and geometry.
    pub fn locate(&self, level: Level, value: &str, mode: LocationMode) -> Option<LocatedArea<'_>> {
        match level {
            Level::Subregion => self.find_subregion(value, mode).map(|s| LocatedArea {
                code: &s.code,
                name: &s.name,
                geometry: &s.geometry,
            }),
            Level::Region => self.find_region(value, mode).map(|r| LocatedArea {
                code: &r.code,
                name: &r.name,
                geometry: &r.geometry,
            }),
        }
    }

    /// Derives another view from this (natural) hierarchy.
    pub fn derive(&self, layout: &ViewLayout, view: GeometryView) -> Self {
        let subregions = match view {
            GeometryView::Natural => self.subregions.clone(),
            GeometryView::Dense => dense(&self.subregions, layout),
            GeometryView::Exploded => exploded(dense(&self.subregions, layout), layout),
            GeometryView::Main => self
                .subregions
                .iter()
                .filter(|s| !layout.is_relocated(&s.code))
                .cloned()
                .collect(),
        };
        Self::new(self.country.clone(), view, subregions)
    }

    /// Column names of the table at `level`.
    pub fn column_names(level: Level) -> [&'static str; 7] {
        match level {
            Level::Subregion => [
                columns::SUBREGION_CODE,
                columns::SUBREGION_NAME,
                columns::REGION_CODE,
                columns::REGION_NAME,
                columns::SUBREGION_POPULATION,
                columns::SUBREGION_AREA,
                columns::GEOMETRY,
            ],
            Level::Region => [
                columns::REGION_CODE,
                columns::REGION_NAME,
                columns::REGION_POPULATION,
                columns::REGION_AREA,
                columns::GEOMETRY,
                "",
                "",
            ],
        }
    }

    pub fn has_column(level: Level, name: &str) -> bool {
        !name.is_empty() && Self::column_names(level).contains(&name)
    }

    fn row_count(&self, level: Level) -> usize {
        match level {
            Level::Region => self.regions.len(),
            Level::Subregion => self.subregions.len(),
        }
    }

    /// Column `name` at `level`, row `idx`, rendered as a cell.
    fn cell(&self, level: Level, idx: usize, name: &str) -> Result<Cell> {
        Ok(match level {
            Level::Subregion => {
                let s = &self.subregions[idx];
                match name {
                    columns::SUBREGION_CODE => Cell::Text(s.code.clone()),
                    columns::SUBREGION_NAME => Cell::Text(s.name.clone()),
                    columns::REGION_CODE => Cell::Text(s.region_code.clone()),
                    columns::REGION_NAME => Cell::Text(s.region_name.clone()),
                    columns::SUBREGION_POPULATION => Cell::Number(s.population),
                    columns::SUBREGION_AREA => Cell::Number(s.area),
                    _ => Cell::Text(to_geojson_string(&s.geometry)?),
                }
            }
            Level::Region => {
                let r = &self.regions[idx];
                match name {
                    columns::REGION_CODE => Cell::Text(r.code.clone()),
                    columns::REGION_NAME => Cell::Text(r.name.clone()),
                    columns::REGION_POPULATION => Cell::Number(r.population),
                    columns::REGION_AREA => Cell::Number(r.area),
                    _ => Cell::Text(to_geojson_string(&r.geometry)?),
                }
            }
        })
    }

    /// Values of `name` gathered by row index; `None` rows become nulls.
    pub fn gather(&self, level: Level, name: &str, rows: &[Option<usize>]) -> Result<Series> {
        let mut texts: Vec<Option<String>> = Vec::with_capacity(rows.len());
        let mut numbers: Vec<Option<f64>> = Vec::with_capacity(rows.len());
        let numeric = matches!(
            name,
            columns::SUBREGION_POPULATION
                | columns::SUBREGION_AREA
                | columns::REGION_POPULATION
                | columns::REGION_AREA
        );
        for row in rows {
            match row.map(|idx| self.cell(level, idx, name)).transpose()? {
                Some(Cell::Text(text)) => texts.push(Some(text)),
                Some(Cell::Number(number)) => numbers.push(number),
                None if numeric => numbers.push(None),
                None => texts.push(None),
            }
        }
        Ok(if numeric {
            Series::new(name.into(), numbers)
        } else {
            Series::new(name.into(), texts)
        })
    }

    /// Keys of the table at `level` in `column`, in row order.
    pub fn keys(&self, level: Level, column: &str) -> Result<Vec<String>> {
        (0..self.row_count(level))
            .map(|idx| {
                self.cell(level, idx, column).map(|cell| match cell {
                    Cell::Text(text) => text,
                    Cell::Number(number) => number.map(|n| n.to_string()).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// The whole table at `level`.
    pub fn frame(&self, level: Level) -> Result<DataFrame> {
        let rows: Vec<Option<usize>> = (0..self.row_count(level)).map(Some).collect();
        let columns = Self::column_names(level)
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(|name| self.gather(level, name, &rows).map(IntoColumn::into_column))
            .collect::<Result<Vec<Column>>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

enum Cell {
    Text(String),
    Number(Option<f64>),
}

fn aggregate_regions(subregions: &[SubregionRecord]) -> Vec<RegionRecord> {
    let mut grouped: BTreeMap<&str, Vec<&SubregionRecord>> = BTreeMap::new();
    for subregion in subregions {
        grouped
            .entry(subregion.region_code.as_str())
            .or_default()
            .push(subregion);
    }
    grouped
        .into_iter()
        .map(|(code, members)| {
            let mut codes: Vec<String> = members.iter().map(|s| s.code.clone()).collect();
            codes.sort();
            RegionRecord {
                code: code.to_string(),
                name: members[0].region_name.clone(),
                population: sum(members.iter().map(|s| s.population)),
                area: sum(members.iter().map(|s| s.area)),
                geometry: combine(members.iter().map(|s| &s.geometry)),
                subregions: codes,
            }
        })
        .collect()
}

/// Sum of the known values; `None` when no value is known.
fn sum(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}

fn dense(subregions: &[SubregionRecord], layout: &ViewLayout) -> Vec<SubregionRecord> {
    subregions
        .iter()
        .map(|s| {
            let mut moved = s.clone();
            if let Some(relocation) = layout
                .relocations
                .iter()
                .find(|r| r.subregion_code == s.code)
            {
                moved.geometry = relocate(&s.geometry, relocation.anchor, relocation.scale);
            }
            moved
        })
        .collect()
}

fn exploded(mut subregions: Vec<SubregionRecord>, layout: &ViewLayout) -> Vec<SubregionRecord> {
    let Some(inset) = layout.inset else {
        return subregions;
    };
    let in_inset = |s: &SubregionRecord| inset.subregion_codes.contains(&s.code.as_str());
    let area = combine(subregions.iter().filter(|s| in_inset(s)).map(|s| &s.geometry));
    let Some(center) = area.centroid() else {
        return subregions;
    };
    for subregion in subregions.iter_mut().filter(|s| in_inset(s)) {
        subregion.geometry = magnify(&subregion.geometry, center, inset.factor, inset.anchor);
    }
    subregions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_ignores_accents_and_hyphens() {
        assert_eq!(fold_name("Côte-d'Or"), fold_name("cote d or"));
        assert_eq!(fold_name("Île-de-France"), "ILE DE FRANCE");
    }

    #[test]
    fn sum_of_unknowns_is_unknown() {
        assert_eq!(sum([None, None].into_iter()), None);
        assert_eq!(sum([Some(1.0), None, Some(2.5)].into_iter()), Some(3.5));
    }
}
