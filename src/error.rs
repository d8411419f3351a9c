use crate::units::Unit;

/// Errors raised by the loading, CRS, overlay, table and coverage steps.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Malformed geometry in {location}: {reason}")]
    MalformedGeometry { location: String, reason: String },

    #[error("Coordinate reference system is undefined")]
    CrsUndefined,

    #[error("CRS mismatch: {left} is not {right}")]
    CrsMismatch { left: String, right: String },

    #[error("PROJ database query failed: {0}")]
    CrsDatabase(String),

    #[error("CRS {0} is not projected, planar measures need linear units")]
    NotProjected(String),

    #[error("Invalid buffer distance {0}, it must be non-negative")]
    InvalidBufferDistance(f64),

    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("Column '{column}' holds non-numeric value {value}")]
    NotNumeric { column: String, value: String },

    #[error("Feature {index} does not carry the collection schema")]
    SchemaMismatch { index: usize },

    #[error("Cannot {operation} geometry of type {geometry}")]
    UnsupportedGeometry {
        operation: &'static str,
        geometry: String,
    },

    #[error("Cannot convert {from:?} to {to:?}")]
    IncompatibleUnits { from: Unit, to: Unit },

    #[error("Lookup of postcode '{postcode}' failed with status {status}")]
    LookupFailed { postcode: String, status: u16 },

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error(transparent)]
    ProjCreate(#[from] proj::ProjCreateError),

    #[error(transparent)]
    Proj(#[from] proj::ProjError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Name of a geometry variant, for error messages.
pub fn geometry_type_name(geometry: &geo::Geometry) -> String {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
    .to_string()
}
