use std::path::{Path, PathBuf};

use gdal::vector::{FieldValue, LayerAccess, OGRFieldType, OGRwkbGeometryType};
use indicatif::ProgressBar;

use crate::{
    crs::Crs,
    error::{AnalysisError, Result},
    table::Tabular,
};

use super::{
    delimited::open_delimited,
    feature::{AttributeValue, Attributes, Feature},
    FeatureCollection,
};

pub enum GdalDriverType {
    GeoPackage,
    Shapefile,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
            GdalDriverType::Shapefile => "ESRI Shapefile",
        }
    }
}

/// A file-based source of features.
#[derive(Debug, Clone)]
pub enum Source {
    /// A shapefile bundle, given by its `.shp` path. `.shx` and `.dbf` must sit next to it.
    Shapefile(PathBuf),
    /// One named layer of a GeoPackage.
    GeoPackage { path: PathBuf, layer: String },
    /// Delimited text with two numeric coordinate columns in `crs`.
    Delimited {
        path: PathBuf,
        x_column: String,
        y_column: String,
        crs: Crs,
    },
}

/// Read all features of a source. Either the whole collection is returned or an error, never a
/// partial collection.
pub fn load(source: &Source) -> Result<FeatureCollection> {
    match source {
        Source::Shapefile(path) => {
            ensure_shapefile_bundle(path)?;
            let dataset = open_vector_dataset(path)?;
            let mut layer = dataset.layer(0)?;
            read_layer(&mut layer, &path.display().to_string(), None)
        }
        Source::GeoPackage { path, layer } => {
            let dataset = open_vector_dataset(path)?;
            let mut gdal_layer = dataset.layer_by_name(layer).map_err(|_| {
                AnalysisError::SourceNotFound(format!("layer '{}' in {:?}", layer, path))
            })?;
            read_layer(&mut gdal_layer, &format!("{:?}:{}", path, layer), None)
        }
        Source::Delimited {
            path,
            x_column,
            y_column,
            crs,
        } => {
            let dataset = open_delimited(path, x_column, y_column)?;
            let mut layer = dataset.layer(0)?;
            read_layer(&mut layer, &path.display().to_string(), Some(crs.clone()))
        }
    }
}

/// Names of all layers in a multi-layer container such as a GeoPackage.
pub fn layer_names(path: &Path) -> Result<Vec<String>> {
    let dataset = open_vector_dataset(path)?;
    Ok(dataset.layers().map(|layer| layer.name()).collect())
}

fn ensure_shapefile_bundle(path: &Path) -> Result<()> {
    for extension in ["shp", "shx", "dbf"] {
        let component = path.with_extension(extension);
        if !component.exists() {
            return Err(AnalysisError::SourceNotFound(format!(
                "shapefile component {:?}",
                component
            )));
        }
    }
    Ok(())
}

fn open_vector_dataset(path: &Path) -> Result<gdal::Dataset> {
    if !path.exists() {
        return Err(AnalysisError::SourceNotFound(format!("{:?}", path)));
    }
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    Ok(gdal::Dataset::open_ex(path, open_options)?)
}

/// Read every feature of a layer. `crs` overrides the layer's spatial ref, which is needed for
/// sources that carry none, like delimited text.
pub(crate) fn read_layer(
    layer: &mut gdal::vector::Layer,
    location: &str,
    crs: Option<Crs>,
) -> Result<FeatureCollection> {
    let crs = match crs {
        Some(crs) => Some(crs),
        // Layers without a .prj or srs table entry have no spatial ref.
        None => match layer.spatial_ref().into_iter().next() {
            Some(spatial_ref) => Some(Crs::from_spatial_ref(spatial_ref)?),
            None => None,
        },
    };
    let columns: Vec<String> = layer.defn().fields().map(|field| field.name()).collect();

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let geometry = read_geometry(&gdal_feature, location)?;
        let mut attributes: Attributes = gdal_feature
            .fields()
            .map(|(name, value)| (name, attribute_value(value)))
            .collect();
        for column in &columns {
            if !attributes.contains_key(column) {
                attributes.insert(column.clone(), AttributeValue::Null);
            }
        }
        features.push(Feature::new(geometry, attributes));
    }
    log::info!("Read {} features from {}", features.len(), location);
    FeatureCollection::new(columns, features, crs)
}

fn read_geometry(gdal_feature: &gdal::vector::Feature, location: &str) -> Result<geo::Geometry> {
    let malformed = |reason: String| AnalysisError::MalformedGeometry {
        location: location.to_string(),
        reason,
    };
    let fid = gdal_feature
        .fid()
        .map_or_else(|| "?".to_string(), |fid| fid.to_string());
    let geometry = gdal_feature
        .geometry_by_index(0)
        .map_err(|err| malformed(format!("feature {} has no geometry, {}", fid, err)))?;
    let wkb = geometry
        .wkb()
        .map_err(|err| malformed(format!("feature {}, {}", fid, err)))?;
    wkb::wkb_to_geom(&mut wkb.as_slice())
        .map_err(|err| malformed(format!("feature {}, {:?}", fid, err)))
}

/// OGR copy of a geo geometry, through WKB.
pub(crate) fn to_gdal_geometry(
    geometry: &geo::Geometry,
    location: &str,
) -> Result<gdal::vector::Geometry> {
    let wkb = wkb::geom_to_wkb(geometry).map_err(|err| AnalysisError::MalformedGeometry {
        location: location.to_string(),
        reason: format!("{:?}", err),
    })?;
    Ok(gdal::vector::Geometry::from_wkb(&wkb)?)
}

fn attribute_value(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(value)) => AttributeValue::Integer(value as i64),
        Some(FieldValue::Integer64Value(value)) => AttributeValue::Integer(value),
        Some(FieldValue::RealValue(value)) => AttributeValue::Real(value),
        Some(FieldValue::StringValue(value)) => AttributeValue::Text(value),
        Some(other) => other.into_string().map_or(AttributeValue::Null, AttributeValue::Text),
    }
}

/// Write one collection as a single-layer file. An existing file at `output_filepath` is
/// replaced.
pub fn write_features_to_geofile(
    collection: &FeatureCollection,
    output_filepath: &Path,
    layer_name: &str,
    driver: GdalDriverType,
) -> Result<()> {
    write_layers_to_geofile(&[(layer_name, collection)], output_filepath, driver)
}

/// Write several collections as named layers of one file, e.g. one GeoPackage.
pub fn write_layers_to_geofile(
    layers: &[(&str, &FeatureCollection)],
    output_filepath: &Path,
    driver: GdalDriverType,
) -> Result<()> {
    gdal::DriverManager::register_all();
    let driver = gdal::DriverManager::get_driver_by_name(driver.name())?;
    if output_filepath.exists() {
        log::debug!("Replacing existing {:?}", output_filepath);
        std::fs::remove_file(output_filepath)?;
    }
    let mut dataset = driver.create_vector_only(output_filepath)?;

    for (layer_name, collection) in layers {
        if collection.is_empty() {
            log::warn!("Skipping empty layer {}", layer_name);
            continue;
        }
        let crs = collection.require_crs()?;
        log::debug!("Using spatial ref {} for layer {}", crs, layer_name);
        let layer_options = gdal::LayerOptions {
            name: layer_name,
            srs: Some(crs.spatial_ref()),
            ty: layer_geometry_type(collection),
            options: None,
        };
        let mut layer = dataset.create_layer(layer_options)?;

        let columns = collection.columns();
        let field_definitions: Vec<(&str, OGRFieldType::Type)> = columns
            .iter()
            .map(|column| (column.as_str(), field_type(collection, column)))
            .collect();
        layer.create_defn_fields(&field_definitions)?;

        log::info!(
            "Writing {} features to {:?} layer {}",
            collection.len(),
            output_filepath,
            layer_name
        );
        unsafe {
            // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
            // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
            gdal_sys::OGR_L_StartTransaction(layer.c_layer());
        };
        let bar = ProgressBar::new(collection.len() as u64);
        for feature in collection.features() {
            let geometry = to_gdal_geometry(&feature.geometry, &format!("{:?}", output_filepath))?;

            // Nulls stay unset.
            let (field_names, values): (Vec<&str>, Vec<FieldValue>) = feature
                .attributes
                .iter()
                .filter_map(|(name, value)| field_value(value).map(|value| (name.as_str(), value)))
                .unzip();
            layer.create_feature_fields(geometry, &field_names, &values)?;
            bar.inc(1);
        }
        unsafe {
            gdal_sys::OGR_L_CommitTransaction(layer.c_layer());
        };
        bar.finish_and_clear();
    }
    Ok(())
}

fn field_value(value: &AttributeValue) -> Option<FieldValue> {
    match value {
        AttributeValue::Null => None,
        AttributeValue::Integer(value) => Some(FieldValue::Integer64Value(*value)),
        AttributeValue::Real(value) => Some(FieldValue::RealValue(*value)),
        AttributeValue::Text(value) => Some(FieldValue::StringValue(value.clone())),
    }
}

/// Field type from the first non-null value of a column. All-null columns are written as text.
fn field_type(collection: &FeatureCollection, column: &str) -> OGRFieldType::Type {
    let first_value = collection
        .rows()
        .filter_map(|row| row.get(column))
        .find(|value| !value.is_null());
    match first_value {
        Some(AttributeValue::Integer(_)) => OGRFieldType::OFTInteger64,
        Some(AttributeValue::Real(_)) => OGRFieldType::OFTReal,
        _ => OGRFieldType::OFTString,
    }
}

/// The narrowest layer geometry type that holds every feature, e.g. polygons mixed with
/// multipolygons need a multipolygon layer.
fn layer_geometry_type(collection: &FeatureCollection) -> OGRwkbGeometryType::Type {
    use OGRwkbGeometryType::*;
    let mut layer_type = None;
    for geometry in collection.geometries() {
        let (single, multi, is_multi) = match geometry {
            geo::Geometry::Point(_) => (wkbPoint, wkbMultiPoint, false),
            geo::Geometry::MultiPoint(_) => (wkbPoint, wkbMultiPoint, true),
            geo::Geometry::Line(_) | geo::Geometry::LineString(_) => {
                (wkbLineString, wkbMultiLineString, false)
            }
            geo::Geometry::MultiLineString(_) => (wkbLineString, wkbMultiLineString, true),
            geo::Geometry::Polygon(_) | geo::Geometry::Rect(_) | geo::Geometry::Triangle(_) => {
                (wkbPolygon, wkbMultiPolygon, false)
            }
            geo::Geometry::MultiPolygon(_) => (wkbPolygon, wkbMultiPolygon, true),
            geo::Geometry::GeometryCollection(_) => return wkbUnknown,
        };
        layer_type = match layer_type {
            None => Some((single, multi, is_multi)),
            Some((current_single, current_multi, current_is_multi)) => {
                if current_single != single {
                    return wkbUnknown;
                }
                Some((current_single, current_multi, current_is_multi || is_multi))
            }
        };
    }
    match layer_type {
        Some((_, multi, true)) => multi,
        Some((single, _, false)) => single,
        None => wkbUnknown,
    }
}
