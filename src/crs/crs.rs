use std::fmt;

use gdal::spatial_ref::SpatialRef;

use crate::error::{AnalysisError, Result};

use super::crs_utils::{epsg_code_to_authority_string, EpsgCode};

/// A coordinate reference system, backed by a GDAL spatial reference.
///
/// Two values compare equal when their EPSG codes match. If either side has no identifiable EPSG
/// code (e.g. a custom WKT definition), the WKT definitions are compared instead.
#[derive(Clone)]
pub struct Crs {
    spatial_ref: SpatialRef,
    epsg: Option<EpsgCode>,
    wkt: String,
}

impl Crs {
    pub fn from_epsg(code: EpsgCode) -> Result<Self> {
        Self::from_spatial_ref(SpatialRef::from_epsg(code)?)
    }

    pub fn from_wkt(wkt: &str) -> Result<Self> {
        Self::from_spatial_ref(SpatialRef::from_wkt(wkt)?)
    }

    pub fn from_spatial_ref(mut spatial_ref: SpatialRef) -> Result<Self> {
        if spatial_ref.auth_code().is_err() {
            // Shapefile .prj contents usually lack an authority node, ask GDAL to find one.
            if spatial_ref.auto_identify_epsg().is_err() {
                log::debug!("No EPSG code identified for spatial ref");
            }
        }
        let epsg = epsg_code(&spatial_ref);
        let wkt = spatial_ref.to_wkt()?;
        Ok(Self {
            spatial_ref,
            epsg,
            wkt,
        })
    }

    pub fn spatial_ref(&self) -> &SpatialRef {
        &self.spatial_ref
    }

    pub fn epsg(&self) -> Option<EpsgCode> {
        self.epsg
    }

    pub fn is_projected(&self) -> bool {
        self.spatial_ref.is_projected()
    }

    pub fn is_geographic(&self) -> bool {
        self.spatial_ref.is_geographic()
    }

    /// Size of one linear unit of the CRS in metres. Only defined for projected systems.
    pub fn linear_unit_in_metres(&self) -> Result<f64> {
        if !self.is_projected() {
            return Err(AnalysisError::NotProjected(self.to_string()));
        }
        Ok(self.spatial_ref.linear_units())
    }

    /// Definition string understood by PROJ: the authority string when known, the WKT otherwise.
    pub fn definition(&self) -> String {
        match self.epsg {
            Some(code) => epsg_code_to_authority_string(code),
            None => self.wkt.clone(),
        }
    }
}

/// Authority code of the root node, if the authority is EPSG. Codes of other authorities such as
/// ESRI would name unrelated systems under `EPSG:`.
fn epsg_code(spatial_ref: &SpatialRef) -> Option<EpsgCode> {
    match spatial_ref.auth_name() {
        Ok(name) if name.eq_ignore_ascii_case("EPSG") => {
            spatial_ref.auth_code().ok().map(|code| code as EpsgCode)
        }
        Ok(name) => {
            log::debug!("Ignoring {} authority code of spatial ref", name);
            None
        }
        Err(_) => None,
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        match (self.epsg, other.epsg) {
            (Some(code), Some(other_code)) => code == other_code,
            _ => self.wkt == other.wkt,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "{}", epsg_code_to_authority_string(code)),
            None => match self.spatial_ref.name() {
                Ok(name) => write!(f, "{}", name),
                Err(_) => write!(f, "custom CRS"),
            },
        }
    }
}

impl fmt::Debug for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crs")
            .field("epsg", &self.epsg)
            .field("projected", &self.is_projected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::Crs;
    use crate::error::AnalysisError;

    #[rstest]
    #[case(27700, true)] // British National Grid.
    #[case(32654, true)] // WGS 84 / UTM zone 54N.
    #[case(4326, false)]
    fn test_projected_classification(#[case] code: u32, #[case] projected: bool) {
        let crs = Crs::from_epsg(code).unwrap();
        assert_eq!(projected, crs.is_projected());
        assert_eq!(!projected, crs.is_geographic());
        assert_eq!(Some(code), crs.epsg());
    }

    #[test]
    fn test_wkt_definition_equals_epsg_definition() {
        let from_code = Crs::from_epsg(27700).unwrap();
        let wkt = from_code.spatial_ref().to_wkt().unwrap();
        let from_wkt = Crs::from_wkt(&wkt).unwrap();
        assert_eq!(from_code, from_wkt);
        assert_ne!(from_code, Crs::from_epsg(4326).unwrap());
    }

    #[test]
    fn test_esri_authority_is_not_an_epsg_code() {
        let wkt = r#"PROJCS["Local_Transverse_Mercator",
            GEOGCS["WGS 84",
                DATUM["WGS_1984", SPHEROID["WGS 84",6378137,298.257223563]],
                PRIMEM["Greenwich",0],
                UNIT["degree",0.0174532925199433]],
            PROJECTION["Transverse_Mercator"],
            PARAMETER["latitude_of_origin",0],
            PARAMETER["central_meridian",3.3],
            PARAMETER["scale_factor",0.9998],
            PARAMETER["false_easting",400000],
            PARAMETER["false_northing",0],
            UNIT["metre",1],
            AUTHORITY["ESRI","102999"]]"#;
        let crs = Crs::from_wkt(wkt).unwrap();
        assert_eq!(None, crs.epsg());
        assert!(crs.is_projected());
        assert!(!crs.definition().starts_with("EPSG:"));
    }

    #[test]
    fn test_linear_units() {
        let bng = Crs::from_epsg(27700).unwrap();
        assert_relative_eq!(bng.linear_unit_in_metres().unwrap(), 1.0);
        assert!(matches!(
            Crs::from_epsg(4326).unwrap().linear_unit_in_metres(),
            Err(AnalysisError::NotProjected(_))
        ));
    }
}
