pub mod buffer;
pub mod intersect;
pub mod measure;
mod ogr;
pub mod union;

use geo::{BooleanOps, MultiPolygon};

use crate::error::{geometry_type_name, AnalysisError, Result};

/// Polygonal geometry as a multipolygon, or `UnsupportedGeometry` for anything else.
pub(crate) fn to_multi_polygon(
    geometry: &geo::Geometry,
    operation: &'static str,
) -> Result<MultiPolygon> {
    match geometry {
        geo::Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon.clone()])),
        geo::Geometry::MultiPolygon(multi_polygon) => Ok(multi_polygon.clone()),
        geo::Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
        geo::Geometry::Triangle(triangle) => Ok(MultiPolygon::new(vec![triangle.to_polygon()])),
        other => Err(AnalysisError::UnsupportedGeometry {
            operation,
            geometry: geometry_type_name(other),
        }),
    }
}

/// A single polygon collapses to `Polygon`, anything else stays a `MultiPolygon`.
pub(crate) fn simplest_geometry(mut multi_polygon: MultiPolygon) -> geo::Geometry {
    if multi_polygon.0.len() == 1 {
        if let Some(polygon) = multi_polygon.0.pop() {
            return geo::Geometry::Polygon(polygon);
        }
    }
    geo::Geometry::MultiPolygon(multi_polygon)
}

/// Union of many multipolygons, merged pairwise in rounds so every boolean operation works on
/// inputs of similar size. A single input is returned as is.
pub(crate) fn cascaded_union(mut parts: Vec<MultiPolygon>) -> MultiPolygon {
    while parts.len() > 1 {
        let mut merged = Vec::with_capacity((parts.len() + 1) / 2);
        let mut parts_iter = parts.into_iter();
        while let Some(first) = parts_iter.next() {
            match parts_iter.next() {
                Some(second) => merged.push(first.union(&second)),
                None => merged.push(first),
            }
        }
        parts = merged;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}
