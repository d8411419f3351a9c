pub mod collection;
pub mod delimited;
pub mod feature;
pub mod gdal_geofile;
pub mod geojson;

pub use self::collection::FeatureCollection;
pub use self::feature::{AttributeValue, Attributes, Feature};
