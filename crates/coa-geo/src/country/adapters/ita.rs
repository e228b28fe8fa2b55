//! Provinces; the region of each province is carried by the source itself.

use super::pad_code;
use crate::country::adapter::{CountryAdapter, PropertyMap};
use crate::country::hierarchy::SubregionRecord;

const SOURCE_URL: &str = "https://raw.githubusercontent.com/openpolis/geojson-italy/master/geojson/limits_IT_provinces.geojson";

fn normalize_codes(record: &mut SubregionRecord) {
    pad_code(&mut record.code, 3);
    pad_code(&mut record.region_code, 2);
}

pub fn italy() -> CountryAdapter {
    CountryAdapter {
        post_process: normalize_codes,
        ..CountryAdapter::new(
            "ITA",
            SOURCE_URL,
            PropertyMap {
                subregion_code: "prov_istat_code",
                subregion_name: "prov_name",
                region_code: Some("reg_istat_code"),
                region_name: Some("reg_name"),
                population: None,
                area: None,
            },
        )
    }
}
