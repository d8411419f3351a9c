use geo::Area;

use crate::{
    crs::Crs,
    error::Result,
    geofile::{AttributeValue, FeatureCollection},
    table::Tabular,
    units::{Quantity, Unit},
};

/// Planar area of a geometry in square metres. Requires a projected CRS.
pub fn area(geometry: &geo::Geometry, crs: &Crs) -> Result<Quantity> {
    let unit_in_metres = crs.linear_unit_in_metres()?;
    Ok(Quantity::new(
        geometry.unsigned_area() * unit_in_metres * unit_in_metres,
        Unit::SquareMetre,
    ))
}

/// Planar length in the CRS's linear unit, converted to metres.
pub fn length(value: f64, crs: &Crs) -> Result<Quantity> {
    Ok(Quantity::new(
        value * crs.linear_unit_in_metres()?,
        Unit::Metre,
    ))
}

/// Append a real-valued column holding each feature's area in `unit`. An existing column of that
/// name is overwritten in place.
pub fn with_area_column(
    collection: &FeatureCollection,
    column: &str,
    unit: Unit,
) -> Result<FeatureCollection> {
    let crs = collection.require_crs()?;
    let mut columns = collection.columns().to_vec();
    if !columns.iter().any(|name| name == column) {
        columns.push(column.to_string());
    }
    let rows = collection
        .features()
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let mut attributes = feature.attributes.clone();
            let value = area(&feature.geometry, crs)?.value_in(unit)?;
            attributes.insert(column.to_string(), AttributeValue::Real(value));
            Ok((index, attributes))
        })
        .collect::<Result<Vec<_>>>()?;
    collection.derive(columns, rows)
}
