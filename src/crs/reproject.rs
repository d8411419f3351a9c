use proj::Transform;

use crate::{
    error::{AnalysisError, Result},
    geofile::FeatureCollection,
};

use super::{
    crs_utils::{query_utm_crs_info, WGS84},
    Crs,
};

/// Project a feature collection into `to_crs`. Attributes are kept; a collection already in
/// `to_crs` is returned as a copy.
pub fn reproject(collection: &FeatureCollection, to_crs: &Crs) -> Result<FeatureCollection> {
    let from_crs = collection.require_crs()?;
    if from_crs == to_crs {
        return Ok(collection.clone());
    }
    log::debug!("Projecting {} features from {} to {}", collection.len(), from_crs, to_crs);
    let projection = proj::Proj::new_known_crs(&from_crs.definition(), &to_crs.definition(), None)?;
    let geometries = collection
        .geometries()
        .map(|geometry| geometry.transformed(&projection))
        .collect::<std::result::Result<Vec<geo::Geometry>, proj::ProjError>>()?;
    Ok(collection.with_geometries(geometries, Some(to_crs.clone())))
}

/// Return `a` in the CRS of `b`: reprojected if they differ, unchanged otherwise.
pub fn align(a: &FeatureCollection, b: &FeatureCollection) -> Result<FeatureCollection> {
    a.require_crs()?;
    let target = b.require_crs()?;
    reproject(a, target)
}

/// Bring two collections into one projected CRS, so that planar area, buffer and distance
/// operations are meaningful on the result.
///
/// If `b` is projected, `a` is projected into `b`'s CRS. Otherwise, if `a` is projected, `b` is
/// projected into `a`'s CRS. If both are geographic, both are projected into the WGS 84 UTM zone
/// containing the first coordinate of `b`.
pub fn normalize_pair(
    a: &FeatureCollection,
    b: &FeatureCollection,
) -> Result<(FeatureCollection, FeatureCollection)> {
    let a_crs = a.require_crs()?;
    let b_crs = b.require_crs()?;
    if b_crs.is_projected() {
        if a_crs != b_crs {
            log::info!("Projecting {} features to {}", a.len(), b_crs);
        }
        return Ok((align(a, b)?, b.clone()));
    }
    if a_crs.is_projected() {
        log::info!("Projecting {} features to {}", b.len(), a_crs);
        return Ok((a.clone(), align(b, a)?));
    }
    let utm_zone = utm_zone_for_collection(b)?;
    log::info!("Projecting both collections to {}", utm_zone);
    Ok((reproject(a, &utm_zone)?, reproject(b, &utm_zone)?))
}

/// The WGS 84 UTM zone containing the first coordinate of a geographic collection.
pub fn utm_zone_for_collection(collection: &FeatureCollection) -> Result<Crs> {
    let crs = collection.require_crs()?;
    if !crs.is_geographic() {
        return Err(AnalysisError::CrsMismatch {
            left: crs.to_string(),
            right: "a geographic CRS".to_string(),
        });
    }
    // Lon/lat order is what PROJ's normalized axis order produces.
    let wgs84 = Crs::from_epsg(WGS84)?;
    let in_wgs84 = reproject(collection, &wgs84)?;
    let coord = in_wgs84
        .geometries()
        .find_map(first_coord)
        .ok_or_else(|| {
            AnalysisError::SourceNotFound("a coordinate to pick a UTM zone from".to_string())
        })?;
    let utm_zone_codes = query_utm_crs_info(coord.x, coord.y, Some("WGS84"))?;
    let utm_zone_code = utm_zone_codes.first().ok_or_else(|| {
        AnalysisError::CrsDatabase(format!("no UTM zone for ({}, {})", coord.x, coord.y))
    })?;
    Crs::from_epsg(*utm_zone_code)
}

fn first_coord(geometry: &geo::Geometry) -> Option<geo::Coord> {
    use geo::CoordsIter;
    geometry.coords_iter().next()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::{align, normalize_pair, reproject};
    use crate::{
        crs::Crs,
        error::AnalysisError,
        geofile::{collection::tests::british_national_grid, Feature, FeatureCollection},
    };

    fn points(coords: &[(f64, f64)], crs: Option<Crs>) -> FeatureCollection {
        let features = coords
            .iter()
            .map(|(x, y)| Feature::from(geo::Geometry::Point(geo::Point::new(*x, *y))))
            .collect();
        FeatureCollection::from_features(features, crs).unwrap()
    }

    fn first_point(collection: &FeatureCollection) -> geo::Point {
        match &collection.features()[0].geometry {
            geo::Geometry::Point(point) => *point,
            other => panic!("Expected a point, got {:?}", other),
        }
    }

    #[test]
    fn test_reproject_wgs84_to_utm() {
        // EPSG 4326 coordinate in Tokyo.
        let wgs84 = points(&[(139.7895073, 35.6862101)], Some(Crs::from_epsg(4326).unwrap()));
        let utm = Crs::from_epsg(32654).unwrap(); // UTM zone 54N
        let projected = reproject(&wgs84, &utm).unwrap();

        // Computed using https://coordinates-converter.com/
        let expected = geo::Point::new(390467.986, 3949820.494);
        assert_abs_diff_eq!(first_point(&projected), expected, epsilon = 1e-3);
        assert_eq!(Some(&utm), projected.crs());
    }

    #[test]
    fn test_align_is_identity_for_same_crs() {
        let a = points(&[(530000.0, 180000.0)], Some(british_national_grid()));
        let b = points(&[(0.0, 0.0)], Some(british_national_grid()));
        let aligned = align(&a, &b).unwrap();
        assert_eq!(first_point(&a), first_point(&aligned));
    }

    #[test]
    fn test_align_requires_defined_crs() {
        let a = points(&[(0.0, 0.0)], None);
        let b = points(&[(0.0, 0.0)], Some(british_national_grid()));
        assert!(matches!(align(&a, &b), Err(AnalysisError::CrsUndefined)));
        assert!(matches!(align(&b, &a), Err(AnalysisError::CrsUndefined)));
    }

    #[test]
    fn test_normalize_pair_prefers_projected_crs() {
        let geographic = points(&[(-0.1276, 51.5072)], Some(Crs::from_epsg(4326).unwrap()));
        let projected = points(&[(530000.0, 180000.0)], Some(british_national_grid()));

        let (a, b) = normalize_pair(&projected, &geographic).unwrap();
        assert_eq!(Some(27700), a.crs().and_then(|crs| crs.epsg()));
        assert_eq!(Some(27700), b.crs().and_then(|crs| crs.epsg()));
        // Central London is roughly at easting 530 km, northing 180 km.
        let london = first_point(&b);
        assert_abs_diff_eq!(london.x(), 530_000.0, epsilon = 2_000.0);
        assert_abs_diff_eq!(london.y(), 180_000.0, epsilon = 2_000.0);
    }

    #[test]
    fn test_normalize_pair_picks_utm_for_two_geographic_inputs() {
        let wgs84 = Some(Crs::from_epsg(4326).unwrap());
        let a = points(&[(-0.1276, 51.5072)], wgs84.clone());
        let b = points(&[(-0.1, 51.5)], wgs84);
        let (a, b) = normalize_pair(&a, &b).unwrap();
        assert_eq!(Some(32630), a.crs().and_then(|crs| crs.epsg()));
        assert_eq!(Some(32630), b.crs().and_then(|crs| crs.epsg()));
    }
}
