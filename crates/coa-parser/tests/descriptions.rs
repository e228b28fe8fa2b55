//! The bundled dataset descriptions stay valid.

use std::path::PathBuf;

use coa_model::Granularity;
use coa_parser::SchemaRegistry;

fn registry() -> SchemaRegistry {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../descriptions");
    SchemaRegistry::new(dir)
}

#[test]
fn every_bundled_description_loads() {
    let registry = registry();
    let names = registry.names().unwrap();
    assert!(names.len() >= 4);
    for name in names {
        let description = registry.get(&name).unwrap();
        assert!(description.granularity().is_ok(), "{name}");
        assert!(!description.variables().is_empty(), "{name}");
    }
}

#[test]
fn bundled_granularities() {
    let registry = registry();
    assert_eq!(registry.get("spf_hosp").unwrap().granularity().unwrap(), Granularity::Subregion);
    assert_eq!(registry.get("dpc").unwrap().granularity().unwrap(), Granularity::Region);
    let jhu = registry.get("jhu").unwrap();
    assert_eq!(jhu.variables(), vec!["tot_confirmed", "tot_deaths"]);
    assert!(jhu.datasets.iter().all(|block| block.namedata.is_some()));
}
