use std::ffi::{c_int, CStr, CString};

use crate::error::{AnalysisError, Result};

pub type EpsgCode = u32;

pub const WGS84: EpsgCode = 4326;

/// Owns a PROJ context for the duration of a database query.
struct ProjContext(*mut proj_sys::PJ_CONTEXT);

impl ProjContext {
    fn new() -> Self {
        Self(unsafe { proj_sys::proj_context_create() })
    }
}

impl Drop for ProjContext {
    fn drop(&mut self) {
        unsafe { proj_sys::proj_context_destroy(self.0) };
    }
}

/// Query UTM zones which contain the lon/lat WGS84 coordinate.
///
/// # Arguments
/// * lon - longitude in degrees.
/// * lat - latitude in degrees.
/// * datum_name - the name of the geodetic datum to query for, without spaces. Example: "WGS84",
///     "NAD83". If not specified, zones with all datums are returned.
///
/// # Returns
/// EPSG authority codes for the found UTM zones.
pub fn query_utm_crs_info(lon: f64, lat: f64, datum_name: Option<&str>) -> Result<Vec<EpsgCode>> {
    let context = ProjContext::new();
    let auth_name = CString::new("EPSG").map_err(|err| crs_query_error(err.to_string()))?;
    let crs_types: [proj_sys::PJ_TYPE; 1] = [proj_sys::PJ_TYPE_PJ_TYPE_PROJECTED_CRS];

    let mut names_and_codes = Vec::new();
    unsafe {
        let query_params = proj_sys::proj_get_crs_list_parameters_create();
        (*query_params).types = crs_types.as_ptr();
        (*query_params).typesCount = 1;
        (*query_params).bbox_valid = 1;
        (*query_params).west_lon_degree = lon;
        (*query_params).south_lat_degree = lat;
        (*query_params).east_lon_degree = lon;
        (*query_params).north_lat_degree = lat;

        let mut result_count: c_int = 0;
        let crs_info_list = proj_sys::proj_get_crs_info_list_from_database(
            context.0,
            auth_name.as_ptr(),
            query_params,
            &mut result_count,
        );
        proj_sys::proj_get_crs_list_parameters_destroy(query_params);

        if crs_info_list.is_null() {
            return Err(crs_query_error("Failed to query UTM zones".to_string()));
        }
        for offset in 0..result_count as isize {
            let crs_info = **crs_info_list.offset(offset);
            let name = CStr::from_ptr(crs_info.name).to_string_lossy().into_owned();
            let code = CStr::from_ptr(crs_info.code).to_string_lossy().into_owned();
            names_and_codes.push((name, code));
        }
        proj_sys::proj_crs_info_list_destroy(crs_info_list);
    }

    let mut results = Vec::new();
    for (crs_name, code) in names_and_codes {
        if !crs_name.contains("UTM zone") {
            continue;
        }
        if let Some(datum_name) = datum_name {
            // UTM zone names start with the datum, e.g. "WGS 84 / UTM zone 54N".
            let crs_datum = crs_name.split('/').next().unwrap_or_default().replace(' ', "");
            if crs_datum != datum_name {
                continue;
            }
        }
        match code.parse::<EpsgCode>() {
            Ok(code) => results.push(code),
            Err(_) => log::debug!("Skipping non-numeric code {} of {}", code, crs_name),
        }
    }
    Ok(results)
}

fn crs_query_error(reason: String) -> AnalysisError {
    AnalysisError::CrsDatabase(reason)
}

pub fn epsg_code_to_authority_string(code: EpsgCode) -> String {
    format!("EPSG:{}", code)
}
