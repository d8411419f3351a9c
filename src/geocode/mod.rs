pub mod postcodes_io;

pub use self::postcodes_io::PostcodesIo;

use indicatif::ProgressBar;

use crate::{
    crs::{crs_utils::WGS84, Crs},
    error::Result,
    geofile::{Feature, FeatureCollection},
};

pub const POSTCODE_COLUMN: &str = "postcode";
pub const LSOA_CODE_COLUMN: &str = "lsoa_code";

/// Resolves one postcode to a WGS 84 point carrying `postcode` and `lsoa_code` attributes.
pub trait PostcodeLookup {
    /// `Ok(None)` when the postcode is unknown.
    fn lookup(&self, postcode: &str) -> Result<Option<Feature>>;
}

#[derive(Debug)]
pub struct ResolvedPostcodes {
    /// Points of the resolved postcodes, in input order, in EPSG:4326.
    pub collection: FeatureCollection,
    pub unresolved: Vec<String>,
}

/// Look up every postcode in turn and gather the matches into one collection.
pub fn resolve_postcodes<L: PostcodeLookup>(
    lookup: &L,
    postcodes: &[String],
) -> Result<ResolvedPostcodes> {
    log::info!("Resolving {} postcodes", postcodes.len());
    let mut features = Vec::with_capacity(postcodes.len());
    let mut unresolved = Vec::new();
    let bar = ProgressBar::new(postcodes.len() as u64);
    for postcode in postcodes {
        match lookup.lookup(postcode)? {
            Some(feature) => features.push(feature),
            None => unresolved.push(postcode.clone()),
        }
        bar.inc(1);
    }
    bar.finish();
    for postcode in &unresolved {
        log::warn!("Postcode {} could not be resolved", postcode);
    }
    let columns = vec![POSTCODE_COLUMN.to_string(), LSOA_CODE_COLUMN.to_string()];
    Ok(ResolvedPostcodes {
        collection: FeatureCollection::new(columns, features, Some(Crs::from_epsg(WGS84)?))?,
        unresolved,
    })
}
