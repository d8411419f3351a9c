use std::{fs, path::Path};

use crate::{
    crs::{crs_utils::WGS84, reproject::reproject, Crs},
    error::Result,
};

use super::{AttributeValue, FeatureCollection};

/// Write a collection to a GeoJSON file. GeoJSON coordinates are WGS 84 longitude/latitude, so
/// the collection is reprojected first when needed.
pub fn write_collection_to_geojson(
    collection: &FeatureCollection,
    output_filepath: &Path,
) -> Result<()> {
    let wgs84 = reproject(collection, &Crs::from_epsg(WGS84)?)?;
    let feature_collection: geojson::FeatureCollection = wgs84
        .features()
        .iter()
        .map(|feature| {
            let properties: geojson::JsonObject = feature
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), json_value(value)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&feature.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    let geojson_contents = geojson::GeoJson::from(feature_collection);
    log::info!("Writing {} features to {:?}", wgs84.len(), output_filepath);
    fs::write(output_filepath, geojson_contents.to_string())?;
    Ok(())
}

fn json_value(value: &AttributeValue) -> geojson::JsonValue {
    match value {
        AttributeValue::Null => geojson::JsonValue::Null,
        AttributeValue::Integer(value) => geojson::JsonValue::from(*value),
        AttributeValue::Real(value) => geojson::JsonValue::from(*value),
        AttributeValue::Text(value) => geojson::JsonValue::from(value.clone()),
    }
}
