//! States grouped into census regions; features are keyed by FIPS id.

use super::pad_code;
use crate::country::adapter::{CountryAdapter, Inset, PropertyMap, Relocation, ViewLayout};
use crate::country::hierarchy::SubregionRecord;

const SOURCE_URL: &str =
    "https://raw.githubusercontent.com/PublicaMundi/MappingAPI/master/data/geojson/us-states.json";

const REGIONS: &str = include_str!("../../../data/usa_regions.csv");

const RELOCATIONS: &[Relocation] = &[
    // Alaska
    Relocation {
        subregion_code: "02",
        anchor: (-116.5, 26.5),
        scale: 0.35,
    },
    // Hawaii
    Relocation {
        subregion_code: "15",
        anchor: (-104.0, 25.5),
        scale: 1.0,
    },
    // Puerto Rico
    Relocation {
        subregion_code: "72",
        anchor: (-80.0, 24.0),
        scale: 1.0,
    },
];

const DISTRICT_OF_COLUMBIA: Inset = Inset {
    subregion_codes: &["11"],
    factor: 6.0,
    anchor: (-73.5, 36.0),
};

fn normalize_codes(record: &mut SubregionRecord) {
    pad_code(&mut record.code, 2);
}

pub fn united_states() -> CountryAdapter {
    CountryAdapter {
        region_table: Some(REGIONS),
        post_process: normalize_codes,
        layout: ViewLayout {
            relocations: RELOCATIONS,
            inset: Some(DISTRICT_OF_COLUMBIA),
        },
        ..CountryAdapter::new(
            "USA",
            SOURCE_URL,
            PropertyMap {
                subregion_code: "id",
                subregion_name: "name",
                region_code: None,
                region_name: None,
                population: None,
                area: None,
            },
        )
    }
}
