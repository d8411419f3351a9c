use geo::MultiPolygon;

use crate::{
    error::Result,
    geofile::{Attributes, Feature, FeatureCollection},
    table::{aggregate::group_rows, Tabular},
};

use super::{cascaded_union, simplest_geometry, to_multi_polygon};

/// Dissolve every polygon of a collection into one feature without attributes.
///
/// The result always holds a single `MultiPolygon` feature, so dissolving it again returns it
/// unchanged. The CRS of the input is kept.
pub fn union(collection: &FeatureCollection) -> Result<FeatureCollection> {
    let parts = collection
        .geometries()
        .map(|geometry| to_multi_polygon(geometry, "union"))
        .collect::<Result<Vec<MultiPolygon>>>()?;
    let dissolved = cascaded_union(parts);
    log::debug!(
        "Dissolved {} features into {} polygons",
        collection.len(),
        dissolved.0.len()
    );
    FeatureCollection::new(
        Vec::new(),
        vec![Feature::from(geo::Geometry::MultiPolygon(dissolved))],
        collection.crs().cloned(),
    )
}

/// Dissolve polygons sharing the same values in the `by` columns into one feature per group.
/// Output features carry only the key columns, in order of first occurrence.
pub fn dissolve(collection: &FeatureCollection, by: &[&str]) -> Result<FeatureCollection> {
    let groups = group_rows(collection, by)?;
    let mut features = Vec::with_capacity(groups.len());
    for (keys, indices) in groups {
        let parts = indices
            .iter()
            .map(|index| to_multi_polygon(&collection.features()[*index].geometry, "dissolve"))
            .collect::<Result<Vec<MultiPolygon>>>()?;
        let attributes: Attributes = by
            .iter()
            .map(|column| column.to_string())
            .zip(keys)
            .collect();
        features.push(Feature::new(
            simplest_geometry(cascaded_union(parts)),
            attributes,
        ));
    }
    FeatureCollection::new(
        by.iter().map(|column| column.to_string()).collect(),
        features,
        collection.crs().cloned(),
    )
}
