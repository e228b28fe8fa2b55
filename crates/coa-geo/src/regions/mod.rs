//! Named multi-country groupings.
//!
//! Three kinds of regions live in one catalog:
//!
//! - static groups with hardcoded members (continents, G7, European Union, ...)
//! - regions derived from the UN M49 hierarchy table (region, sub-region,
//!   intermediate region), fetched through a [`ReferenceFetcher`]
//! - unions of other regions plus extra members
//!
//! The catalog is immutable once built.

mod statics;

use std::collections::{BTreeMap, BTreeSet};

use coa_ingest::{ReadOptions, ReferenceFetcher, SourceTable};
use coa_model::{CaseInsensitiveMap, CoaConfig, CoaError, Result, title_case};
use coa_standards::StandardsCatalog;

pub use statics::{STATIC_GROUPS, StaticGroup, UNION_GROUPS, UnionGroup};

/// Provenance recorded for continents built from the embedded country table.
const CONTINENT_SOURCE: &str = "https://www.iso.org/iso-3166-country-codes.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionRule {
    Static,
    Derived,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub code: String,
    pub name: String,
    pub source: String,
    /// Sorted, distinct alpha-3 codes.
    pub members: Vec<String>,
    pub rule: RegionRule,
    /// Enclosing region of a derived region.
    pub parent: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    by_name: CaseInsensitiveMap<usize>,
}

impl RegionCatalog {
    /// Static and union regions only; never touches the network.
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        catalog.add_static_regions();
        catalog.add_union_regions();
        catalog
    }

    /// Builtin regions plus the M49 hierarchy named in `config`.
    pub fn build(fetcher: &dyn ReferenceFetcher, config: &CoaConfig) -> Result<Self> {
        let url = &config.sources.regions_url;
        let bytes = fetcher.fetch(url, config.cache.max_age())?;
        let table = SourceTable::from_bytes(&bytes, url, &ReadOptions::default())?;
        Self::from_hierarchy(&table, url)
    }

    /// Builtin regions plus regions derived from an M49 hierarchy table.
    ///
    /// Expected columns: `alpha-3`, `region`, `sub-region`,
    /// `intermediate-region` and the matching `*-code` columns.
    pub fn from_hierarchy(table: &SourceTable, source: &str) -> Result<Self> {
        let mut catalog = Self::default();
        catalog.add_static_regions();
        let derived = derive_regions(table, source)?;
        let derived_count = derived.len();
        for region in derived {
            catalog.upsert(region);
        }
        catalog.add_union_regions();
        tracing::info!(
            regions = catalog.regions.len(),
            derived = derived_count,
            source,
            "built region catalog"
        );
        Ok(catalog)
    }

    fn add_static_regions(&mut self) {
        let countries = StandardsCatalog::global();
        for (name, members) in countries.continents() {
            let code = coa_standards::CONTINENTS
                .iter()
                .find(|(_, n)| *n == name)
                .map(|(c, _)| (*c).to_string())
                .unwrap_or_default();
            self.upsert(Region {
                code,
                name: name.to_string(),
                source: CONTINENT_SOURCE.to_string(),
                members: sorted_members(members),
                rule: RegionRule::Static,
                parent: None,
            });
        }
        for group in STATIC_GROUPS {
            self.upsert(Region {
                code: group.code.to_string(),
                name: group.name.to_string(),
                source: group.source.to_string(),
                members: sorted_members(group.members.iter().map(|m| (*m).to_string())),
                rule: RegionRule::Static,
                parent: None,
            });
        }
    }

    fn add_union_regions(&mut self) {
        for group in UNION_GROUPS {
            let mut members: Vec<String> = group.extra.iter().map(|m| (*m).to_string()).collect();
            for part in group.parts {
                match self.get(part) {
                    Some(region) => members.extend(region.members.iter().cloned()),
                    None => tracing::warn!(region = group.name, part, "union part is not a region"),
                }
            }
            self.upsert(Region {
                code: group.code.to_string(),
                name: group.name.to_string(),
                source: group.source.to_string(),
                members: sorted_members(members),
                rule: RegionRule::Union,
                parent: None,
            });
        }
    }

    /// Adds a region; one with the same name is replaced.
    fn upsert(&mut self, region: Region) {
        if region.members.is_empty() {
            tracing::debug!(region = %region.name, "skipping region without members");
            return;
        }
        match self.by_name.get(&region.name).copied() {
            Some(idx) => self.regions[idx] = region,
            None => {
                self.by_name.insert(&region.name, self.regions.len());
                self.regions.push(region);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// All region names, sorted.
    pub fn region_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.regions.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Canonical name of `name` if it is a region, ignoring case and spacing.
    pub fn is_region(&self, name: &str) -> Option<&str> {
        self.get(name).map(|region| region.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.by_name.get(name).map(|&idx| &self.regions[idx])
    }

    pub fn members_of(&self, name: &str) -> Result<&[String]> {
        self.get(name)
            .map(|region| region.members.as_slice())
            .ok_or_else(|| CoaError::UnknownRegion {
                region: name.to_string(),
            })
    }

    /// Every region containing `alpha3`, in catalog order.
    pub fn regions_of(&self, alpha3: &str) -> Vec<&Region> {
        self.regions
            .iter()
            .filter(|region| region.members.binary_search_by(|m| m.as_str().cmp(alpha3)).is_ok())
            .collect()
    }

    /// Direct children of a region in the M49 hierarchy, sorted by name.
    pub fn children_of(&self, name: &str) -> Vec<&Region> {
        let Some(parent) = self.get(name) else {
            return Vec::new();
        };
        let mut children: Vec<&Region> = self
            .regions
            .iter()
            .filter(|region| region.parent.as_deref() == Some(parent.name.as_str()))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        children
    }

    /// Expands a macro region into its constituent regions.
    ///
    /// Returns the sorted child names followed by the macro region itself
    /// when it aggregates more than one child; otherwise just the region.
    pub fn regions_from_macroregion(&self, name: &str) -> Result<Vec<String>> {
        let region = self.get(name).ok_or_else(|| CoaError::UnknownRegion {
            region: name.to_string(),
        })?;
        let children = self.children_of(&region.name);
        if children.len() > 1 {
            let mut names: Vec<String> = children.iter().map(|c| c.name.clone()).collect();
            names.push(region.name.clone());
            Ok(names)
        } else {
            Ok(vec![region.name.clone()])
        }
    }
}

fn sorted_members(members: impl IntoIterator<Item = String>) -> Vec<String> {
    members
        .into_iter()
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One level of the M49 hierarchy: (name column, code column, parent level).
const LEVELS: [(&str, &str, Option<usize>); 3] = [
    ("region", "region-code", None),
    ("sub-region", "sub-region-code", Some(0)),
    ("intermediate-region", "intermediate-region-code", Some(1)),
];

#[derive(Default)]
struct DerivedEntry {
    code: String,
    parent: Option<String>,
    members: Vec<String>,
}

fn derive_regions(table: &SourceTable, source: &str) -> Result<Vec<Region>> {
    let Some(alpha3_idx) = table.column_index("alpha-3") else {
        return Err(CoaError::Csv {
            origin: source.to_string(),
            message: "region hierarchy has no 'alpha-3' column".to_string(),
        });
    };
    let countries = StandardsCatalog::global();
    let level_columns: Vec<(Option<usize>, Option<usize>, Option<usize>)> = LEVELS
        .iter()
        .map(|(name, code, parent)| (table.column_index(name), table.column_index(code), *parent))
        .collect();

    let mut entries: BTreeMap<String, DerivedEntry> = BTreeMap::new();
    let mut unknown = 0usize;
    for row in &table.rows {
        let alpha3 = row[alpha3_idx].trim();
        if countries.by_alpha3(alpha3).is_none() {
            unknown += 1;
            continue;
        }
        let names: Vec<Option<String>> = level_columns
            .iter()
            .map(|(name_idx, _, _)| {
                name_idx
                    .map(|i| title_case(&row[i]))
                    .filter(|name| !name.is_empty())
            })
            .collect();
        for (level, (_, code_idx, parent_level)) in level_columns.iter().enumerate() {
            let Some(name) = &names[level] else {
                continue;
            };
            let entry = entries.entry(name.clone()).or_default();
            if entry.code.is_empty()
                && let Some(i) = code_idx
            {
                entry.code = row[*i].trim().to_string();
            }
            if entry.parent.is_none() {
                entry.parent = parent_level.and_then(|p| names[p].clone());
            }
            entry.members.push(alpha3.to_string());
        }
    }
    if unknown > 0 {
        tracing::debug!(rows = unknown, source, "hierarchy rows with unknown alpha-3 skipped");
    }

    Ok(entries
        .into_iter()
        .map(|(name, entry)| Region {
            code: entry.code,
            name,
            source: source.to_string(),
            members: sorted_members(entry.members),
            rule: RegionRule::Derived,
            parent: entry.parent,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    const HIERARCHY: &str = "\
name,alpha-2,alpha-3,country-code,iso_3166-2,region,sub-region,intermediate-region,region-code,sub-region-code,intermediate-region-code
France,FR,FRA,250,ISO 3166-2:FR,Europe,Western Europe,,150,155,
Germany,DE,DEU,276,ISO 3166-2:DE,Europe,Western Europe,,150,155,
Italy,IT,ITA,380,ISO 3166-2:IT,Europe,Southern Europe,,150,039,
Brazil,BR,BRA,076,ISO 3166-2:BR,Americas,Latin America and the Caribbean,South America,019,419,005
Antarctica,AQ,ATA,010,ISO 3166-2:AQ,,,,,,
";

    fn catalog() -> RegionCatalog {
        let table =
            SourceTable::from_bytes(HIERARCHY.as_bytes(), "mem://m49", &ReadOptions::default())
                .unwrap();
        RegionCatalog::from_hierarchy(&table, "mem://m49").unwrap()
    }

    #[test]
    fn builtin_has_blocs_and_continents() {
        let catalog = RegionCatalog::builtin();
        assert_eq!(catalog.members_of("g7").unwrap().len(), 7);
        assert_eq!(catalog.members_of("European Union").unwrap().len(), 27);
        assert_eq!(catalog.members_of("OECD").unwrap().len(), 38);
        assert!(catalog.members_of("Europe").unwrap().contains(&"FRA".to_string()));
        assert_eq!(catalog.is_region("  euro   area "), Some("Euro Area"));
        assert_eq!(catalog.is_region("Atlantis"), None);
    }

    #[test]
    fn union_region_adds_extra_members() {
        let catalog = RegionCatalog::builtin();
        let eea = catalog.get("European Economic Area").unwrap();
        assert_eq!(eea.rule, RegionRule::Union);
        assert_eq!(eea.members.len(), 30);
        assert!(eea.members.contains(&"NOR".to_string()));
    }

    #[test]
    fn unknown_region_is_error() {
        let err = RegionCatalog::builtin().members_of("Atlantis").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownRegion);
    }

    #[test]
    fn derived_europe_replaces_continent() {
        let catalog = catalog();
        let europe = catalog.get("Europe").unwrap();
        assert_eq!(europe.rule, RegionRule::Derived);
        assert_eq!(europe.code, "150");
        assert_eq!(europe.members, vec!["DEU", "FRA", "ITA"]);
        let latam = catalog.get("Latin America And The Caribbean").unwrap();
        assert_eq!(latam.parent.as_deref(), Some("Americas"));
    }

    #[test]
    fn macroregion_expansion() {
        let catalog = catalog();
        assert_eq!(
            catalog.regions_from_macroregion("europe").unwrap(),
            vec!["Southern Europe", "Western Europe", "Europe"]
        );
        // A single child: the macro region stands alone.
        assert_eq!(
            catalog.regions_from_macroregion("Americas").unwrap(),
            vec!["Americas"]
        );
        assert_eq!(catalog.regions_from_macroregion("G7").unwrap(), vec!["G7"]);
    }

    #[test]
    fn regions_of_country() {
        let catalog = catalog();
        let names: Vec<&str> = catalog
            .regions_of("ITA")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert!(names.contains(&"Southern Europe"));
        assert!(names.contains(&"G7"));
        assert!(names.contains(&"European Union"));
        assert!(!names.contains(&"Western Europe"));
    }
}
