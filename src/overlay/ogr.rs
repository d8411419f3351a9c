use std::ffi::{c_int, CStr};

use gdal::errors::GdalError;
use gdal_sys::{OGRErr, OGRGeometryH, OGRwkbByteOrder};
use geo::MultiPolygon;

use crate::{
    error::{AnalysisError, Result},
    geofile::gdal_geofile::to_gdal_geometry,
};

/// Geometry handle created by OGR, destroyed on drop.
struct OwnedGeometry(OGRGeometryH);

impl OwnedGeometry {
    fn new(handle: OGRGeometryH, method_name: &'static str) -> Result<Self> {
        if handle.is_null() {
            return Err(last_null_pointer_error(method_name));
        }
        Ok(Self(handle))
    }

    fn to_geo(&self, location: &str) -> Result<geo::Geometry> {
        let wkb = unsafe {
            let wkb_size = gdal_sys::OGR_G_WkbSize(self.0).max(0) as usize;
            let mut wkb: Vec<u8> = vec![0; wkb_size];
            let err = gdal_sys::OGR_G_ExportToWkb(self.0, OGRwkbByteOrder::wkbNDR, wkb.as_mut_ptr());
            if err != OGRErr::OGRERR_NONE {
                return Err(GdalError::OgrError {
                    err,
                    method_name: "OGR_G_ExportToWkb",
                }
                .into());
            }
            wkb
        };
        wkb::wkb_to_geom(&mut wkb.as_slice()).map_err(|err| AnalysisError::MalformedGeometry {
            location: location.to_string(),
            reason: format!("{:?}", err),
        })
    }
}

impl Drop for OwnedGeometry {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_G_DestroyGeometry(self.0) };
    }
}

fn last_null_pointer_error(method_name: &'static str) -> AnalysisError {
    let msg = unsafe {
        let msg = gdal_sys::CPLGetLastErrorMsg();
        if msg.is_null() {
            String::new()
        } else {
            CStr::from_ptr(msg).to_string_lossy().into_owned()
        }
    };
    GdalError::NullPointer { method_name, msg }.into()
}

/// Round-joined buffer of `geometry`, computed by GEOS through OGR.
pub(crate) fn ogr_buffer(
    geometry: &geo::Geometry,
    distance: f64,
    quadrant_segments: u32,
) -> Result<geo::Geometry> {
    let location = "buffer input";
    let input = to_gdal_geometry(geometry, location)?;
    let segments = quadrant_segments.clamp(1, c_int::MAX as u32) as c_int;
    let buffered = OwnedGeometry::new(
        unsafe { gdal_sys::OGR_G_Buffer(input.c_geometry(), distance, segments) },
        "OGR_G_Buffer",
    )?;
    buffered.to_geo(location)
}

/// Union of possibly overlapping polygons, computed by GEOS through OGR.
pub(crate) fn ogr_union(parts: &MultiPolygon) -> Result<geo::Geometry> {
    let location = "union input";
    let input = to_gdal_geometry(&geo::Geometry::MultiPolygon(parts.clone()), location)?;
    let unioned = OwnedGeometry::new(
        unsafe { gdal_sys::OGR_G_UnionCascaded(input.c_geometry()) },
        "OGR_G_UnionCascaded",
    )?;
    unioned.to_geo(location)
}
