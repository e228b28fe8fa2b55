//! Location resolution.
//!
//! A [`LocationResolver`] turns free-form place names and codes into one
//! location standard. Lookup order for every entry:
//!
//! 1. empty input resolves to an empty value
//! 2. the alias table of the source database, when a hint is given
//! 3. exact match on any code or name of the country table
//! 4. approximate match on names, ranked by score then name
//!
//! Region names can be expanded into their members; that needs an attached
//! [`RegionCatalog`].

use std::collections::BTreeMap;
use std::sync::Arc;

use coa_model::{CoaError, LocationStandard, OutputKind, Result};
use coa_standards::{AliasTarget, CountryRecord, SourceDatabase, StandardsCatalog};
use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

use crate::regions::RegionCatalog;
use crate::score::{self, MATCH_THRESHOLD};

/// What to do when approximate matching finds several countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Take the best ranked candidate and log the ambiguity.
    #[default]
    Lenient,
    /// Fail with the candidate list.
    Strict,
}

/// One raw entry: text, or a numeric code given as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum RawLocation {
    Text(String),
    Number(u32),
}

impl RawLocation {
    /// Text form; numbers become zero-padded three-digit codes.
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Number(number) => format!("{number:03}"),
        }
    }
}

impl From<&str> for RawLocation {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawLocation {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for RawLocation {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<u32> for RawLocation {
    fn from(value: u32) -> Self {
        Self::Number(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMethod {
    Empty,
    /// Known to the source database but not a country (cruise ship, aggregate).
    NotACountry,
    Alias,
    Exact,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub alpha3: String,
    pub score: f64,
}

/// Detailed outcome of resolving one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub input: String,
    /// Value in the resolver's standard; empty for `Empty` and `NotACountry`.
    pub canonical: String,
    pub alpha3: Option<String>,
    pub method: ResolveMethod,
    /// Ranked approximate matches; empty unless `method` is `Fuzzy`.
    pub candidates: Vec<Candidate>,
}

impl Resolution {
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Result of [`LocationResolver::resolve`] in the requested shape.
#[derive(Debug, Clone)]
pub enum ResolveOutput {
    List(Vec<String>),
    /// Input text to canonical value.
    Map(BTreeMap<String, String>),
    /// Columns `input` and `output`.
    Table(DataFrame),
}

impl ResolveOutput {
    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    catalog: &'static StandardsCatalog,
    standard: LocationStandard,
    policy: MatchPolicy,
    regions: Option<Arc<RegionCatalog>>,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(LocationStandard::default())
    }
}

impl LocationResolver {
    pub fn new(standard: LocationStandard) -> Self {
        Self {
            catalog: StandardsCatalog::global(),
            standard,
            policy: MatchPolicy::default(),
            regions: None,
        }
    }

    pub fn with_standard(&self, standard: LocationStandard) -> Self {
        Self {
            standard,
            ..self.clone()
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_regions(mut self, regions: Arc<RegionCatalog>) -> Self {
        self.regions = Some(regions);
        self
    }

    pub fn standard(&self) -> LocationStandard {
        self.standard
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn catalog(&self) -> &'static StandardsCatalog {
        self.catalog
    }

    pub fn regions(&self) -> Option<&RegionCatalog> {
        self.regions.as_deref()
    }

    /// Sets the standard from its string form (`iso2`, `iso3`, `name`, `num`).
    pub fn set_standard(&mut self, standard: &str) -> Result<()> {
        self.standard = standard.parse()?;
        Ok(())
    }

    /// Resolves every entry and shapes the result as requested.
    ///
    /// With `expand_regions`, an entry naming a region is replaced by all of
    /// its members; this needs [`OutputKind::List`] and an attached region
    /// catalog.
    pub fn resolve<I, T>(
        &self,
        inputs: I,
        db_hint: Option<&str>,
        output: OutputKind,
        expand_regions: bool,
    ) -> Result<ResolveOutput>
    where
        I: IntoIterator<Item = T>,
        T: Into<RawLocation>,
    {
        if expand_regions && output != OutputKind::List {
            return Err(CoaError::IncompatibleOptions {
                message: "region expansion requires list output".to_string(),
            });
        }
        if expand_regions && self.regions.is_none() {
            return Err(CoaError::IncompatibleOptions {
                message: "region expansion requires a region catalog".to_string(),
            });
        }
        let database = db_hint.map(str::parse::<SourceDatabase>).transpose()?;

        let mut pairs: Vec<(String, String)> = Vec::new();
        for raw in inputs {
            let text = raw.into().as_text();
            if expand_regions && let Some(members) = self.region_members(&text)? {
                for alpha3 in members {
                    let record = self
                        .catalog
                        .by_alpha3(&alpha3)
                        .ok_or_else(|| CoaError::lookup(alpha3.clone()))?;
                    pairs.push((alpha3.clone(), self.identifier(record, &alpha3)?));
                }
                continue;
            }
            let resolution = self.resolve_text(&text, database)?;
            pairs.push((resolution.input, resolution.canonical));
        }

        Ok(match output {
            OutputKind::List => ResolveOutput::List(pairs.into_iter().map(|(_, v)| v).collect()),
            OutputKind::Map => ResolveOutput::Map(pairs.into_iter().collect()),
            OutputKind::Table => {
                let (inputs, outputs): (Vec<String>, Vec<String>) = pairs.into_iter().unzip();
                ResolveOutput::Table(DataFrame::new(vec![
                    Series::new("input".into(), inputs).into_column(),
                    Series::new("output".into(), outputs).into_column(),
                ])?)
            }
        })
    }

    /// Resolves one entry to the active standard.
    pub fn resolve_one(&self, raw: &str, database: Option<SourceDatabase>) -> Result<String> {
        Ok(self.resolve_text(raw, database)?.canonical)
    }

    /// Resolves one entry and reports how it was matched.
    pub fn resolve_detailed(
        &self,
        raw: impl Into<RawLocation>,
        database: Option<SourceDatabase>,
    ) -> Result<Resolution> {
        self.resolve_text(&raw.into().as_text(), database)
    }

    /// Country record behind `raw`, without converting to the standard.
    pub fn record(
        &self,
        raw: &str,
        database: Option<SourceDatabase>,
    ) -> Result<Option<&'static CountryRecord>> {
        let (record, _, _) = self.find(raw.trim(), database)?;
        Ok(record)
    }

    fn region_members(&self, text: &str) -> Result<Option<Vec<String>>> {
        let Some(regions) = &self.regions else {
            return Ok(None);
        };
        match regions.is_region(text) {
            Some(name) => Ok(Some(regions.members_of(name)?.to_vec())),
            None => Ok(None),
        }
    }

    fn resolve_text(&self, raw: &str, database: Option<SourceDatabase>) -> Result<Resolution> {
        let input = raw.trim().to_string();
        let (record, method, candidates) = self.find(&input, database)?;
        let (canonical, alpha3) = match record {
            Some(record) => (self.identifier(record, &input)?, Some(record.alpha3.clone())),
            None => (String::new(), None),
        };
        Ok(Resolution {
            input,
            canonical,
            alpha3,
            method,
            candidates,
        })
    }

    fn identifier(&self, record: &CountryRecord, input: &str) -> Result<String> {
        record
            .identifier(self.standard)
            .map(str::to_string)
            .ok_or_else(|| CoaError::lookup(format!("{input} (no {} code)", self.standard)))
    }

    #[allow(clippy::type_complexity)]
    fn find(
        &self,
        input: &str,
        database: Option<SourceDatabase>,
    ) -> Result<(Option<&'static CountryRecord>, ResolveMethod, Vec<Candidate>)> {
        if input.is_empty() {
            return Ok((None, ResolveMethod::Empty, Vec::new()));
        }
        let mut lookup_key = std::borrow::Cow::Borrowed(input);
        if let Some(database) = database {
            match database.alias(input) {
                Some(AliasTarget::Country(alpha3)) => {
                    if let Some(record) = self.catalog.by_alpha3(alpha3) {
                        return Ok((Some(record), ResolveMethod::Alias, Vec::new()));
                    }
                }
                Some(AliasTarget::NotACountry) => {
                    return Ok((None, ResolveMethod::NotACountry, Vec::new()));
                }
                None => lookup_key = database.normalize(input),
            }
        }
        if let Some(record) = self.catalog.lookup(&lookup_key) {
            return Ok((Some(record), ResolveMethod::Exact, Vec::new()));
        }

        let mut candidates = self.fuzzy_candidates(&lookup_key);
        if candidates.first().is_some_and(|best| best.score >= 1.0) {
            candidates.truncate(1);
        }
        let Some(best) = candidates.first() else {
            return Err(CoaError::lookup(input));
        };
        if candidates.len() > 1 {
            let names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
            if self.policy == MatchPolicy::Strict {
                return Err(CoaError::LookupFailure {
                    location: input.to_string(),
                    candidates: names,
                });
            }
            tracing::warn!(
                input,
                chosen = %best.name,
                candidates = ?names,
                "ambiguous location, using best ranked match"
            );
        }
        let record = self
            .catalog
            .by_alpha3(&best.alpha3)
            .ok_or_else(|| CoaError::lookup(input))?;
        Ok((Some(record), ResolveMethod::Fuzzy, candidates))
    }

    /// One candidate per country, best name first.
    fn fuzzy_candidates(&self, input: &str) -> Vec<Candidate> {
        let mut best: BTreeMap<&str, (f64, &str)> = BTreeMap::new();
        for (name, record) in self.catalog.name_candidates() {
            let scored = score::score(input, name).score;
            if scored < MATCH_THRESHOLD {
                continue;
            }
            let entry = best.entry(record.alpha3.as_str()).or_insert((scored, name));
            if score::rank((scored, name), *entry).is_lt() {
                *entry = (scored, name);
            }
        }
        let mut candidates: Vec<Candidate> = best
            .into_iter()
            .map(|(alpha3, (score, name))| Candidate {
                name: name.to_string(),
                alpha3: alpha3.to_string(),
                score,
            })
            .collect();
        candidates.sort_by(|a, b| score::rank((a.score, &a.name), (b.score, &b.name)));
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    fn iso3() -> LocationResolver {
        LocationResolver::new(LocationStandard::Iso3)
    }

    #[test]
    fn jhu_alias_resolves_congo_kinshasa() {
        let resolution = iso3()
            .resolve_detailed("Congo (Kinshasa)", Some(SourceDatabase::Jhu))
            .unwrap();
        assert_eq!(resolution.canonical, "COD");
        assert_eq!(resolution.method, ResolveMethod::Alias);
    }

    #[test]
    fn empty_input_is_empty_value() {
        let resolution = iso3().resolve_detailed("  ", None).unwrap();
        assert_eq!(resolution.canonical, "");
        assert_eq!(resolution.method, ResolveMethod::Empty);
    }

    #[test]
    fn numbers_are_padded_codes() {
        let out = LocationResolver::new(LocationStandard::Name)
            .resolve([RawLocation::Number(40), RawLocation::from("250")], None, OutputKind::List, false)
            .unwrap();
        assert_eq!(out.into_list().unwrap(), vec!["Austria", "France"]);
    }

    #[test]
    fn unknown_location_is_lookup_failure() {
        let err = iso3().resolve_one("Atlantis", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LookupFailure);
    }

    #[test]
    fn misspelling_resolves_by_similarity() {
        let resolution = iso3().resolve_detailed("Swizerland", None).unwrap();
        assert_eq!(resolution.canonical, "CHE");
        assert_eq!(resolution.method, ResolveMethod::Fuzzy);
    }

    #[test]
    fn strict_policy_fails_on_ambiguity() {
        let resolver = iso3().with_policy(MatchPolicy::Strict);
        let err = resolver.resolve_one("Korea", None).unwrap_err();
        match err {
            CoaError::LookupFailure { candidates, .. } => {
                assert!(candidates.len() >= 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        let lenient = iso3().resolve_detailed("Korea", None).unwrap();
        assert!(lenient.is_ambiguous());
        assert_eq!(lenient.canonical, lenient.candidates[0].alpha3);
    }

    #[test]
    fn bad_hint_is_unsupported_source() {
        let err = iso3()
            .resolve(["France"], Some("csse"), OutputKind::List, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSource);
    }

    #[test]
    fn expansion_requires_list_output() {
        let err = iso3()
            .resolve(["G7"], None, OutputKind::Map, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleOptions);
    }

    #[test]
    fn expansion_requires_region_catalog() {
        let err = iso3()
            .resolve(["European Union"], None, OutputKind::List, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleOptions);

        let expanded = iso3()
            .with_regions(Arc::new(RegionCatalog::builtin()))
            .resolve(["G7"], None, OutputKind::List, true)
            .unwrap()
            .into_list()
            .unwrap();
        assert_eq!(expanded.len(), 7);
    }

    #[test]
    fn equal_normalized_name_beats_contained_names() {
        let resolution = iso3().resolve_detailed("Guinea Bissau", None).unwrap();
        assert_eq!(resolution.canonical, "GNB");
        assert!(!resolution.is_ambiguous());
    }

    #[test]
    fn country_inside_longer_input_does_not_win() {
        let resolution = iso3()
            .resolve_detailed("Papua New Guinea Highlands", None)
            .unwrap();
        assert_eq!(resolution.canonical, "PNG");
        assert!(resolution.candidates.iter().all(|c| c.alpha3 != "GIN"));
    }

    #[test]
    fn reordered_words_resolve_by_containment() {
        let resolution = iso3().resolve_detailed("Sudan South", None).unwrap();
        assert_eq!(resolution.canonical, "SSD");
        assert_eq!(resolution.candidates[0].alpha3, "SSD");
        assert!(resolution.candidates.iter().all(|c| c.alpha3 != "SDN"));
    }

    #[test]
    fn source_name_without_hint_is_not_the_other_congo() {
        let resolved = iso3().resolve_one("Congo (Kinshasa)", None);
        assert_ne!(resolved.ok().as_deref(), Some("COG"));
        assert_eq!(
            iso3()
                .resolve_one("Congo (Kinshasa)", Some(SourceDatabase::Jhu))
                .unwrap(),
            "COD"
        );
    }

    #[test]
    fn set_standard_validates() {
        let mut resolver = LocationResolver::default();
        assert_eq!(resolver.resolve_one("France", None).unwrap(), "FR");
        resolver.set_standard("num").unwrap();
        assert_eq!(resolver.resolve_one("France", None).unwrap(), "250");
        let err = resolver.set_standard("iso4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(resolver.standard(), LocationStandard::Num);
    }

    #[test]
    fn cruise_ships_are_not_countries() {
        let resolution = iso3()
            .resolve_detailed("Diamond Princess", Some(SourceDatabase::Jhu))
            .unwrap();
        assert_eq!(resolution.method, ResolveMethod::NotACountry);
        assert!(resolution.canonical.is_empty());
    }

    #[test]
    fn table_output_has_two_columns() {
        let out = iso3()
            .resolve(["France", "Italy"], None, OutputKind::Table, false)
            .unwrap();
        let ResolveOutput::Table(df) = out else {
            panic!("expected table");
        };
        assert_eq!(df.column("output").unwrap().str().unwrap().get(1), Some("ITA"));
    }
}
