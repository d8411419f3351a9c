use geo::{Area, BooleanOps, BoundingRect, MultiPolygon};
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree, AABB,
};

use crate::{
    crs::SameCrs,
    error::Result,
    geofile::{Feature, FeatureCollection},
    table::{MergedColumns, Tabular},
};

use super::{simplest_geometry, to_multi_polygon};

type IndexedBounds = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Intersect every polygon of the left collection with every overlapping polygon of the right
/// collection.
///
/// Each overlapping pair yields one feature holding the shared area and the attributes of both
/// sources, so a left polygon spanning several right polygons is split along their boundaries.
/// Pairs that do not overlap produce nothing, and neither does a left feature overlapping no
/// right feature. Columns present on both sides are suffixed `_1` (left) and `_2` (right).
pub fn intersect(pair: &SameCrs) -> Result<FeatureCollection> {
    let (left, right) = (pair.left(), pair.right());
    let left_polygons = polygons_of(left)?;
    let right_polygons = polygons_of(right)?;
    let index = bounds_index(&right_polygons);
    let merged = MergedColumns::new(left.columns(), right.columns(), None);

    let mut features = Vec::new();
    for (left_index, left_polygon) in left_polygons.iter().enumerate() {
        let envelope = match envelope(left_polygon) {
            Some(envelope) => envelope,
            None => continue,
        };
        let mut candidates: Vec<usize> = index
            .locate_in_envelope_intersecting(&envelope)
            .map(|bounds| bounds.data)
            .collect();
        // Keep the output order stable, independent of the tree layout.
        candidates.sort_unstable();
        for right_index in candidates {
            let shared = left_polygon.intersection(&right_polygons[right_index]);
            // Polygons touching along an edge or at a point share no area.
            if shared.0.is_empty() || shared.unsigned_area() <= 0.0 {
                continue;
            }
            let attributes = merged.merge(left.row(left_index), Some(right.row(right_index)));
            features.push(Feature::new(simplest_geometry(shared), attributes));
        }
    }
    log::info!(
        "Intersected {} with {} features into {} features",
        left.len(),
        right.len(),
        features.len()
    );
    FeatureCollection::new(merged.output_columns(), features, Some(pair.crs().clone()))
}

fn polygons_of(collection: &FeatureCollection) -> Result<Vec<MultiPolygon>> {
    collection
        .geometries()
        .map(|geometry| to_multi_polygon(geometry, "intersect"))
        .collect()
}

fn envelope(polygon: &MultiPolygon) -> Option<AABB<[f64; 2]>> {
    polygon.bounding_rect().map(|rect| {
        AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
    })
}

fn bounds_index(polygons: &[MultiPolygon]) -> RTree<IndexedBounds> {
    let bounds = polygons
        .iter()
        .enumerate()
        .filter_map(|(index, polygon)| {
            envelope(polygon).map(|envelope| {
                IndexedBounds::new(
                    Rectangle::from_corners(envelope.lower(), envelope.upper()),
                    index,
                )
            })
        })
        .collect();
    RTree::bulk_load(bounds)
}
