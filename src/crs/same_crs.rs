use crate::{
    error::{AnalysisError, Result},
    geofile::{collection::crs_label, FeatureCollection},
};

use super::Crs;

/// Two feature collections confirmed to share one defined CRS.
///
/// Binary spatial operations only accept this type, so inputs in different coordinate systems
/// are rejected when the pair is built instead of producing plausible but wrong output.
#[derive(Debug, Clone, Copy)]
pub struct SameCrs<'a> {
    left: &'a FeatureCollection,
    right: &'a FeatureCollection,
    crs: &'a Crs,
}

impl<'a> SameCrs<'a> {
    pub fn new(left: &'a FeatureCollection, right: &'a FeatureCollection) -> Result<Self> {
        let left_crs = left.require_crs()?;
        let right_crs = right.require_crs()?;
        if left_crs != right_crs {
            return Err(AnalysisError::CrsMismatch {
                left: crs_label(Some(left_crs)),
                right: crs_label(Some(right_crs)),
            });
        }
        Ok(Self {
            left,
            right,
            crs: left_crs,
        })
    }

    pub fn left(&self) -> &'a FeatureCollection {
        self.left
    }

    pub fn right(&self) -> &'a FeatureCollection {
        self.right
    }

    pub fn crs(&self) -> &'a Crs {
        self.crs
    }
}
