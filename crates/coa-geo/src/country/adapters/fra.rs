//! Metropolitan and overseas departments, grouped into the 18 regions.

use super::pad_code;
use crate::country::adapter::{CountryAdapter, Inset, PropertyMap, Relocation, ViewLayout};
use crate::country::hierarchy::SubregionRecord;

const SOURCE_URL: &str = "https://raw.githubusercontent.com/gregoiredavid/france-geojson/master/departements-avec-outre-mer.geojson";

const REGIONS: &str = include_str!("../../../data/fra_regions.csv");

/// Overseas departments, lined up off the Atlantic coast.
const RELOCATIONS: &[Relocation] = &[
    Relocation {
        subregion_code: "971",
        anchor: (-6.8, 47.6),
        scale: 1.0,
    },
    Relocation {
        subregion_code: "972",
        anchor: (-6.8, 46.6),
        scale: 1.0,
    },
    Relocation {
        subregion_code: "973",
        anchor: (-6.0, 44.9),
        scale: 0.35,
    },
    Relocation {
        subregion_code: "974",
        anchor: (-4.0, 43.3),
        scale: 1.0,
    },
    Relocation {
        subregion_code: "976",
        anchor: (-2.6, 42.6),
        scale: 1.0,
    },
];

/// Paris and the inner ring, magnified over the Channel.
const PETITE_COURONNE: Inset = Inset {
    subregion_codes: &["75", "92", "93", "94"],
    factor: 4.0,
    anchor: (-2.0, 50.3),
};

fn normalize_codes(record: &mut SubregionRecord) {
    record.code = record.code.to_ascii_uppercase();
    pad_code(&mut record.code, 2);
}

pub fn france() -> CountryAdapter {
    CountryAdapter {
        region_table: Some(REGIONS),
        post_process: normalize_codes,
        layout: ViewLayout {
            relocations: RELOCATIONS,
            inset: Some(PETITE_COURONNE),
        },
        ..CountryAdapter::new(
            "FRA",
            SOURCE_URL,
            PropertyMap {
                subregion_code: "code",
                subregion_name: "nom",
                region_code: None,
                region_name: None,
                population: None,
                area: None,
            },
        )
    }
}
