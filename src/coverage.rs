use geo::{EuclideanDistance, Intersects, MultiPolygon, Point};

use crate::{
    crs::SameCrs,
    error::{geometry_type_name, AnalysisError, Result},
    geofile::FeatureCollection,
    overlay::{measure::length, to_multi_polygon},
    units::{Quantity, Unit},
};

/// Classify every point of the left collection against the region of the right collection.
///
/// `true` marks a point outside the region, i.e. not covered: the flags select the points whose
/// distance to coverage is of interest.
pub fn coverage(pair: &SameCrs) -> Result<Vec<bool>> {
    let points = points_of(pair.left())?;
    let region = region_of(pair.right())?;
    Ok(points.iter().map(|point| !region.intersects(point)).collect())
}

/// Minimum planar distance from `point` to `region`, in CRS units. Zero inside or on the
/// boundary.
pub fn distance_to_region(point: &Point, region: &MultiPolygon) -> f64 {
    if region.intersects(point) {
        return 0.0;
    }
    point.euclidean_distance(region)
}

/// Distance to the region, in metres, of every uncovered point, with the point's index.
pub fn uncovered_distances(pair: &SameCrs) -> Result<Vec<(usize, Quantity)>> {
    let crs = pair.crs();
    // Fails early for geographic CRS even when every point is covered.
    crs.linear_unit_in_metres()?;
    let points = points_of(pair.left())?;
    let region = region_of(pair.right())?;
    points
        .iter()
        .enumerate()
        .filter(|(_, point)| !region.intersects(*point))
        .map(|(index, point)| Ok((index, length(distance_to_region(point, &region), crs)?)))
        .collect()
}

/// Mean distance in metres from the uncovered points to the region, or `None` when every point
/// is covered.
pub fn mean_distance_to_coverage(pair: &SameCrs) -> Result<Option<Quantity>> {
    let distances = uncovered_distances(pair)?;
    if distances.is_empty() {
        return Ok(None);
    }
    let mut total = 0.0;
    for (_, distance) in &distances {
        total += distance.value_in(Unit::Metre)?;
    }
    log::info!(
        "{} of {} points are outside the covered region",
        distances.len(),
        pair.left().len()
    );
    Ok(Some(Quantity::new(
        total / distances.len() as f64,
        Unit::Metre,
    )))
}

fn points_of(collection: &FeatureCollection) -> Result<Vec<Point>> {
    collection
        .geometries()
        .map(|geometry| match geometry {
            geo::Geometry::Point(point) => Ok(*point),
            other => Err(AnalysisError::UnsupportedGeometry {
                operation: "test coverage of",
                geometry: geometry_type_name(other),
            }),
        })
        .collect()
}

/// Every polygon of the region collection in one multipolygon. Overlaps do not matter for
/// intersection and distance tests, so nothing is dissolved.
fn region_of(collection: &FeatureCollection) -> Result<MultiPolygon> {
    let mut polygons = Vec::new();
    for geometry in collection.geometries() {
        polygons.extend(to_multi_polygon(geometry, "cover with")?.0);
    }
    Ok(MultiPolygon::new(polygons))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use geo::Centroid;
    use rstest::{fixture, rstest};

    use super::{coverage, distance_to_region, mean_distance_to_coverage, uncovered_distances};
    use crate::{
        crs::{Crs, SameCrs},
        error::AnalysisError,
        geofile::{
            collection::tests::{british_national_grid, square},
            Feature, FeatureCollection,
        },
        overlay::to_multi_polygon,
        units::Unit,
    };

    fn point(x: f64, y: f64) -> Feature {
        Feature::from(geo::Geometry::Point(geo::Point::new(x, y)))
    }

    /// Two station catchments, 0..100 and 300..400 along x.
    #[fixture]
    fn region() -> FeatureCollection {
        FeatureCollection::from_features(
            vec![square(0.0, 0.0, 100.0, "a"), square(300.0, 0.0, 100.0, "b")],
            Some(british_national_grid()),
        )
        .unwrap()
    }

    fn points(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection::from_features(features, Some(british_national_grid())).unwrap()
    }

    #[rstest]
    fn test_centroid_is_covered(region: FeatureCollection) {
        let catchment = to_multi_polygon(&region.features()[0].geometry, "test").unwrap();
        let centroid = catchment.centroid().unwrap();
        let stations = points(vec![Feature::from(geo::Geometry::Point(centroid))]);

        let flags = coverage(&SameCrs::new(&stations, &region).unwrap()).unwrap();
        assert_eq!(vec![false], flags);
        assert_eq!(0.0, distance_to_region(&centroid, &catchment));
    }

    #[rstest]
    fn test_coverage_flags_points_outside(region: FeatureCollection) {
        let homes = points(vec![
            point(50.0, 50.0),
            point(150.0, 50.0),
            point(100.0, 50.0),
            point(250.0, 150.0),
        ]);
        let pair = SameCrs::new(&homes, &region).unwrap();
        assert_eq!(vec![false, true, false, true], coverage(&pair).unwrap());

        let distances = uncovered_distances(&pair).unwrap();
        let indices: Vec<usize> = distances.iter().map(|(index, _)| *index).collect();
        assert_eq!(vec![1, 3], indices);
        assert_relative_eq!(distances[0].1.value_in(Unit::Metre).unwrap(), 50.0);
        // Nearest corner is (300, 100).
        assert_relative_eq!(
            distances[1].1.value_in(Unit::Metre).unwrap(),
            50.0 * 2.0_f64.sqrt()
        );

        let mean = mean_distance_to_coverage(&pair).unwrap().unwrap();
        assert_relative_eq!(
            mean.value_in(Unit::Metre).unwrap(),
            (50.0 + 50.0 * 2.0_f64.sqrt()) / 2.0
        );
    }

    #[rstest]
    fn test_all_covered_has_no_mean(region: FeatureCollection) {
        let homes = points(vec![point(10.0, 10.0), point(350.0, 50.0)]);
        let pair = SameCrs::new(&homes, &region).unwrap();
        assert!(mean_distance_to_coverage(&pair).unwrap().is_none());
    }

    #[rstest]
    fn test_coverage_needs_points(region: FeatureCollection) {
        let pair = SameCrs::new(&region, &region).unwrap();
        assert!(matches!(
            coverage(&pair),
            Err(AnalysisError::UnsupportedGeometry { .. })
        ));
    }

    #[test]
    fn test_distances_need_projected_crs() {
        let wgs84 = Crs::from_epsg(4326).unwrap();
        let homes =
            FeatureCollection::from_features(vec![point(-0.1, 51.5)], Some(wgs84.clone())).unwrap();
        let region =
            FeatureCollection::from_features(vec![square(0.0, 51.0, 1.0, "a")], Some(wgs84))
                .unwrap();
        let pair = SameCrs::new(&homes, &region).unwrap();
        assert_eq!(vec![true], coverage(&pair).unwrap());
        assert!(matches!(
            uncovered_distances(&pair),
            Err(AnalysisError::NotProjected(_))
        ));
    }
}
