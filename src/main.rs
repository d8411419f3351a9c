extern crate log;
pub mod coverage;
pub mod crs;
pub mod error;
pub mod geocode;
pub mod geofile;
pub mod overlay;
pub mod table;
pub mod units;

use crate::coverage::{coverage, mean_distance_to_coverage};
use crate::crs::crs_utils::EpsgCode;
use crate::crs::reproject::{align, normalize_pair};
use crate::crs::{Crs, SameCrs};
use crate::geocode::postcodes_io::DEFAULT_BASE_URL;
use crate::geocode::{resolve_postcodes, PostcodesIo};
use crate::geofile::gdal_geofile::{load, write_features_to_geofile, GdalDriverType, Source};
use crate::geofile::geojson::write_collection_to_geojson;
use crate::geofile::{AttributeValue, FeatureCollection};
use crate::overlay::buffer::{buffer, BufferStyle};
use crate::overlay::intersect::intersect;
use crate::overlay::measure::with_area_column;
use crate::overlay::union::union;
use crate::table::aggregate::{aggregate, aggregation_table, Reducer};
use crate::table::join::{left_join, left_join_with_diagnostics, recode};
use crate::table::{rename_column, AttributeTable, Tabular};
use crate::units::Unit;
use anyhow::anyhow;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::{fs::read_to_string, path::Path};

const AREA_COLUMN: &str = "area_ha";

/// Summarise greenspace and reports per boundary, and test how well stations cover the reports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "format", rename_all = "snake_case")]
enum SourceConfig {
    Shapefile {
        path: PathBuf,
    },
    Geopackage {
        path: PathBuf,
        layer: String,
    },
    Delimited {
        path: PathBuf,
        x_column: String,
        y_column: String,
        epsg: EpsgCode,
    },
}

impl SourceConfig {
    fn load(&self) -> anyhow::Result<FeatureCollection> {
        let source = match self {
            SourceConfig::Shapefile { path } => Source::Shapefile(path.clone()),
            SourceConfig::Geopackage { path, layer } => Source::GeoPackage {
                path: path.clone(),
                layer: layer.clone(),
            },
            SourceConfig::Delimited {
                path,
                x_column,
                y_column,
                epsg,
            } => Source::Delimited {
                path: path.clone(),
                x_column: x_column.clone(),
                y_column: y_column.clone(),
                crs: Crs::from_epsg(*epsg)?,
            },
        };
        log::debug!("Loading {:?}", source);
        Ok(load(&source)?)
    }
}

#[derive(Deserialize, Debug)]
struct KeyedSourceConfig {
    source: SourceConfig,
    /// Column holding the boundary code.
    key: String,
}

/// A reviewed correction of one miscoded report key.
#[derive(Deserialize, Debug)]
struct RecodeConfig {
    from: String,
    to: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Deserialize, Debug)]
struct StationsConfig {
    postcodes: Vec<String>,
    #[serde(default = "default_base_url")]
    base_url: String,
    buffer_distance: f64,
    #[serde(default)]
    buffer_style: BufferStyle,
}

#[derive(Deserialize, Debug)]
struct Config {
    data_dir: PathBuf,
    greenspace: Vec<SourceConfig>,
    boundaries: KeyedSourceConfig,
    reports: KeyedSourceConfig,
    #[serde(default)]
    recodes: Vec<RecodeConfig>,
    stations: Option<StationsConfig>,
}

/// All greenspace sources in the CRS of the first one, concatenated.
fn load_greenspace(sources: &[SourceConfig]) -> anyhow::Result<FeatureCollection> {
    let mut sources_iter = sources.iter();
    let first = sources_iter
        .next()
        .ok_or_else(|| anyhow!("At least one greenspace source is required"))?;
    let mut greenspace = first.load()?;
    for source in sources_iter {
        let next = align(&source.load()?, &greenspace)?;
        greenspace = greenspace.concat(&next)?;
    }
    log::info!("Combined {} greenspace features", greenspace.len());
    Ok(greenspace)
}

/// Name a right-hand column gets when combined with `left`'s columns.
fn right_column_name(left: &FeatureCollection, column: &str) -> String {
    if left.columns().iter().any(|name| name == column) {
        format!("{}_2", column)
    } else {
        column.to_string()
    }
}

/// Per-boundary count and total area of greenspace pieces, keyed by `key`.
fn summarise_greenspace(
    pieces: &FeatureCollection,
    piece_key: &str,
    key: &str,
) -> anyhow::Result<AttributeTable> {
    let reducers = [Reducer::Count, Reducer::Sum(AREA_COLUMN.to_string())];
    let rows = aggregate(pieces, &[piece_key], &reducers)?;
    let summary = aggregation_table(&[piece_key], &reducers, rows)?;
    let summary = rename_column(&summary, piece_key, key)?;
    Ok(rename_column(&summary, "count", "greenspace_count")?)
}

/// Per-boundary count of reports. Configured recodes are applied only after the unmatched keys
/// have been reported, so every correction stays visible in the log.
fn summarise_reports(
    reports: &FeatureCollection,
    report_key: &str,
    boundaries: &FeatureCollection,
    key: &str,
    recodes: &[RecodeConfig],
) -> anyhow::Result<AttributeTable> {
    let reports = rename_column(reports, report_key, key)?;
    let (_, mismatch) = left_join_with_diagnostics(&reports, boundaries, key)?;
    let reports = if mismatch.is_empty() || recodes.is_empty() {
        reports
    } else {
        let mut recoded = reports;
        for correction in recodes {
            log::info!("Applying recode {} -> {}", correction.from, correction.to);
            recoded = recode(
                &recoded,
                key,
                &AttributeValue::from(correction.from.as_str()),
                &AttributeValue::from(correction.to.as_str()),
            )?;
        }
        let (_, remaining) = left_join_with_diagnostics(&recoded, boundaries, key)?;
        log::info!(
            "{} unmatched reports remain after recoding",
            remaining.unmatched.row_count()
        );
        recoded
    };
    let rows = aggregate(&reports, &[key], &[Reducer::Count])?;
    let summary = aggregation_table(&[key], &[Reducer::Count], rows)?;
    Ok(rename_column(&summary, "count", "report_count")?)
}

/// Dissolved buffers around the stations, in the CRS of `reference`.
fn station_coverage(
    stations: &StationsConfig,
    reference: &FeatureCollection,
) -> anyhow::Result<FeatureCollection> {
    let lookup = PostcodesIo::new(&stations.base_url)?;
    let resolved = resolve_postcodes(&lookup, &stations.postcodes)?;
    log::info!(
        "Resolved {} of {} station postcodes",
        resolved.collection.len(),
        stations.postcodes.len()
    );
    let stations_projected = align(&resolved.collection, reference)?;
    let buffered = buffer(
        &stations_projected,
        stations.buffer_distance,
        &stations.buffer_style,
    )?;
    Ok(union(&buffered)?)
}

fn try_main() -> anyhow::Result<()> {
    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;
    let key = config.boundaries.key.as_str();

    let greenspace = load_greenspace(&config.greenspace)?;
    let boundaries = config.boundaries.source.load()?;
    boundaries.require_column(key)?;
    let (greenspace, boundaries) = normalize_pair(&greenspace, &boundaries)?;
    log::debug!("Working CRS: {:?}", boundaries.crs());

    let pieces = intersect(&SameCrs::new(&greenspace, &boundaries)?)?;
    let pieces = with_area_column(&pieces, AREA_COLUMN, Unit::Hectare)?;
    write_features_to_geofile(
        &pieces,
        &config.data_dir.join("greenspace_by_boundary.gpkg"),
        "greenspace_by_boundary",
        GdalDriverType::GeoPackage,
    )?;
    let piece_key = right_column_name(&greenspace, key);
    let greenspace_summary = summarise_greenspace(&pieces, &piece_key, key)?;

    let reports = align(&config.reports.source.load()?, &boundaries)?;
    let report_summary = summarise_reports(
        &reports,
        &config.reports.key,
        &boundaries,
        key,
        &config.recodes,
    )?;

    let summary = left_join(&boundaries, &greenspace_summary, key)?;
    let summary = left_join(&summary, &report_summary, key)?;
    for row in summary.rows() {
        log::info!(
            "{}: {} greenspace pieces, {} ha, {} reports",
            row.get(key).cloned().unwrap_or_default(),
            row.get("greenspace_count").cloned().unwrap_or_default(),
            row.get(&format!("sum_{}", AREA_COLUMN)).cloned().unwrap_or_default(),
            row.get("report_count").cloned().unwrap_or_default(),
        );
    }
    write_features_to_geofile(
        &summary,
        &config.data_dir.join("boundary_summary.gpkg"),
        "boundary_summary",
        GdalDriverType::GeoPackage,
    )?;

    if let Some(stations) = &config.stations {
        let covered = station_coverage(stations, &boundaries)?;
        let pair = SameCrs::new(&reports, &covered)?;
        let uncovered = coverage(&pair)?.into_iter().filter(|flag| *flag).count();
        log::info!(
            "{} of {} reports lie outside station coverage",
            uncovered,
            reports.len()
        );
        match mean_distance_to_coverage(&pair)? {
            Some(mean) => log::info!("Mean distance to station coverage: {}", mean),
            None => log::info!("Every report lies within station coverage"),
        }
        write_features_to_geofile(
            &covered,
            &config.data_dir.join("station_coverage.gpkg"),
            "station_coverage",
            GdalDriverType::GeoPackage,
        )?;
        write_collection_to_geojson(&covered, &config.data_dir.join("station_coverage.geojson"))?;
    }
    Ok(())
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
