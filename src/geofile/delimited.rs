use std::path::Path;

use crate::error::{AnalysisError, Result};

/// Open plain delimited text through GDAL's CSV driver, turning the two named coordinate columns
/// into point geometry. Column types are detected from the values. The `CSV:` prefix lets the
/// driver open files whatever their extension.
pub(crate) fn open_delimited(path: &Path, x_column: &str, y_column: &str) -> Result<gdal::Dataset> {
    if !path.exists() {
        return Err(AnalysisError::SourceNotFound(format!("{:?}", path)));
    }
    gdal::DriverManager::register_all();
    let x_option = format!("X_POSSIBLE_NAMES={}", x_column);
    let y_option = format!("Y_POSSIBLE_NAMES={}", y_column);
    let open_options = [
        x_option.as_str(),
        y_option.as_str(),
        "KEEP_GEOM_COLUMNS=NO",
        "AUTODETECT_TYPE=YES",
    ];
    let options = gdal::DatasetOptions {
        open_flags: gdal::GdalOpenFlags::GDAL_OF_VECTOR,
        allowed_drivers: Some(&["CSV"]),
        open_options: Some(&open_options),
        sibling_files: None,
    };
    let csv_path = format!("CSV:{}", path.display());
    Ok(gdal::Dataset::open_ex(&csv_path, options)?)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use approx::assert_relative_eq;
    use testdir::testdir;

    use crate::{
        crs::Crs,
        error::AnalysisError,
        geofile::{
            gdal_geofile::{load, Source},
            AttributeValue,
        },
    };

    fn source(path: std::path::PathBuf) -> Source {
        Source::Delimited {
            path,
            x_column: "easting".to_string(),
            y_column: "northing".to_string(),
            crs: Crs::from_epsg(27700).unwrap(),
        }
    }

    #[test]
    fn test_read_points_from_delimited_text() {
        let test_dir = testdir!();
        let path = test_dir.join("reports.csv");
        fs::write(
            &path,
            "report_id,borough_code,easting,northing\n\
             r1,E09000002,549000.5,184000\n\
             r2,E09000042,530100,180200.25\n",
        )
        .unwrap();

        let reports = load(&source(path)).unwrap();
        assert_eq!(2, reports.len());
        assert_eq!(Some(27700), reports.crs().and_then(|crs| crs.epsg()));

        let second = &reports.features()[1];
        match &second.geometry {
            geo::Geometry::Point(point) => {
                assert_relative_eq!(point.x(), 530100.0);
                assert_relative_eq!(point.y(), 180200.25);
            }
            other => panic!("Expected a point, got {:?}", other),
        }
        assert_eq!(
            Some(&AttributeValue::from("E09000042")),
            second.attributes.get("borough_code")
        );
    }

    #[test]
    fn test_read_points_from_text_file() {
        let test_dir = testdir!();
        let path = test_dir.join("reports.txt");
        fs::write(
            &path,
            "report_id,borough_code,easting,northing\n\
             r1,E09000002,549000.5,184000\n",
        )
        .unwrap();

        let reports = load(&source(path)).unwrap();
        assert_eq!(1, reports.len());
        assert_eq!(
            Some(&AttributeValue::from("E09000002")),
            reports.features()[0].attributes.get("borough_code")
        );
    }

    #[test]
    fn test_missing_delimited_file() {
        let test_dir = testdir!();
        assert!(matches!(
            load(&source(test_dir.join("missing.csv"))),
            Err(AnalysisError::SourceNotFound(_))
        ));
    }
}
