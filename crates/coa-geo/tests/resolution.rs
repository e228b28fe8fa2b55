//! Resolution agrees across standards.

use coa_geo::{LocationResolver, ResolveMethod};
use coa_model::LocationStandard;
use coa_standards::{SourceDatabase, StandardsCatalog};
use proptest::prelude::*;

fn standard() -> impl Strategy<Value = LocationStandard> {
    prop::sample::select(LocationStandard::ALL.to_vec())
}

proptest! {
    #[test]
    fn resolving_through_another_standard_is_consistent(
        idx in 0..StandardsCatalog::global().len(),
        first in standard(),
        second in standard(),
    ) {
        let record = &StandardsCatalog::global().records()[idx];
        let raw = record.name.clone();

        let direct = LocationResolver::new(second).resolve_one(&raw, None);
        let Ok(intermediate) = LocationResolver::new(first).resolve_one(&raw, None) else {
            // No code in `first` (e.g. Kosovo has no numeric code).
            return Ok(());
        };
        let via = LocationResolver::new(second).resolve_one(&intermediate, None);
        prop_assert_eq!(via.ok(), direct.ok());
    }
}

#[test]
fn jhu_congo_kinshasa() {
    let resolver = LocationResolver::new(LocationStandard::Iso3);
    let resolution = resolver
        .resolve_detailed("Congo (Kinshasa)", Some(SourceDatabase::Jhu))
        .unwrap();
    assert_eq!(resolution.canonical, "COD");
    assert_eq!(resolution.method, ResolveMethod::Alias);
}

#[test]
fn owid_aggregates_are_not_countries() {
    let resolver = LocationResolver::default();
    let resolution = resolver
        .resolve_detailed("World", Some(SourceDatabase::Owid))
        .unwrap();
    assert_eq!(resolution.method, ResolveMethod::NotACountry);
    assert!(resolution.canonical.is_empty());
}
