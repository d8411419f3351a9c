use crate::{
    crs::Crs,
    error::{AnalysisError, Result},
    table::{conform_to_schema, Tabular},
};

use super::feature::{AttributeValue, Attributes, Feature};

/// Ordered features sharing one attribute schema and one (possibly undefined) CRS.
///
/// Collections are values: every operation returns a new collection and leaves its inputs alone.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    columns: Vec<String>,
    features: Vec<Feature>,
    crs: Option<Crs>,
}

impl FeatureCollection {
    /// Create a collection, checking that every feature carries exactly `columns`.
    pub fn new(columns: Vec<String>, features: Vec<Feature>, crs: Option<Crs>) -> Result<Self> {
        let features = features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| {
                Ok(Feature::new(
                    feature.geometry,
                    conform_to_schema(&columns, feature.attributes, index)?,
                ))
            })
            .collect::<Result<Vec<Feature>>>()?;
        Ok(Self {
            columns,
            features,
            crs,
        })
    }

    /// Create a collection whose schema is taken from the first feature.
    pub fn from_features(features: Vec<Feature>, crs: Option<Crs>) -> Result<Self> {
        let columns = features
            .first()
            .map(|feature| feature.attributes.keys().cloned().collect())
            .unwrap_or_default();
        Self::new(columns, features, crs)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn require_crs(&self) -> Result<&Crs> {
        self.crs.as_ref().ok_or(AnalysisError::CrsUndefined)
    }

    pub fn geometries(&self) -> impl Iterator<Item = &geo::Geometry> {
        self.features.iter().map(|feature| &feature.geometry)
    }

    /// Same features and schema with every geometry replaced, tagged with `crs`.
    pub(crate) fn with_geometries(
        &self,
        geometries: Vec<geo::Geometry>,
        crs: Option<Crs>,
    ) -> Self {
        let features = self
            .features
            .iter()
            .zip(geometries)
            .map(|(feature, geometry)| Feature::new(geometry, feature.attributes.clone()))
            .collect();
        Self {
            columns: self.columns.clone(),
            features,
            crs,
        }
    }

    /// Features of `self` followed by features of `other`. Both must share one CRS. The schema is
    /// the union of both schemas, values a side lacks are null.
    pub fn concat(&self, other: &FeatureCollection) -> Result<Self> {
        if self.crs != other.crs {
            return Err(AnalysisError::CrsMismatch {
                left: crs_label(self.crs()),
                right: crs_label(other.crs()),
            });
        }
        let mut columns = self.columns.clone();
        for column in &other.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        let features = self
            .features
            .iter()
            .chain(other.features.iter())
            .map(|feature| {
                let attributes: Attributes = columns
                    .iter()
                    .map(|column| {
                        let value = feature.attributes.get(column).cloned();
                        (column.clone(), value.unwrap_or(AttributeValue::Null))
                    })
                    .collect();
                Feature::new(feature.geometry.clone(), attributes)
            })
            .collect();
        Ok(Self {
            columns,
            features,
            crs: self.crs.clone(),
        })
    }
}

pub(crate) fn crs_label(crs: Option<&Crs>) -> String {
    crs.map_or_else(|| "undefined CRS".to_string(), |crs| crs.to_string())
}

impl Tabular for FeatureCollection {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.features.len()
    }

    fn row(&self, index: usize) -> &Attributes {
        &self.features[index].attributes
    }

    fn derive(&self, columns: Vec<String>, rows: Vec<(usize, Attributes)>) -> Result<Self> {
        let features = rows
            .into_iter()
            .map(|(index, attributes)| {
                Feature::new(self.features[index].geometry.clone(), attributes)
            })
            .collect();
        Self::new(columns, features, self.crs.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rstest::rstest;

    use super::FeatureCollection;
    use crate::{
        crs::Crs,
        error::AnalysisError,
        geofile::{AttributeValue, Attributes, Feature},
    };

    /// Axis-aligned square polygon feature with a single `name` attribute.
    pub(crate) fn square(x: f64, y: f64, size: f64, name: &str) -> Feature {
        let polygon = geo::Rect::new((x, y), (x + size, y + size)).to_polygon();
        Feature::new(
            polygon.into(),
            Attributes::from([("name".to_string(), AttributeValue::from(name))]),
        )
    }

    pub(crate) fn british_national_grid() -> Crs {
        Crs::from_epsg(27700).unwrap()
    }

    #[test]
    fn test_schema_mismatch_is_rejected() {
        let mut odd = square(1.0, 0.0, 1.0, "b");
        odd.attributes.insert("extra".to_string(), AttributeValue::Null);
        let result = FeatureCollection::from_features(vec![square(0.0, 0.0, 1.0, "a"), odd], None);
        assert!(matches!(
            result,
            Err(AnalysisError::SchemaMismatch { index: 1 })
        ));
    }

    #[rstest]
    #[case(3, 4)]
    #[case(0, 3)]
    fn test_concat_keeps_every_feature(#[case] left_count: usize, #[case] right_count: usize) {
        let crs = british_national_grid();
        let make = |count: usize, name: &str| {
            let features = (0..count)
                .map(|index| square(index as f64, 0.0, 1.0, name))
                .collect();
            FeatureCollection::new(vec!["name".to_string()], features, Some(crs.clone())).unwrap()
        };
        let left = make(left_count, "left");
        let right = make(right_count, "right");
        let combined = left.concat(&right).unwrap();
        assert_eq!(left_count + right_count, combined.len());
    }

    #[test]
    fn test_concat_of_8760_and_19798_features_has_28558() {
        let crs = british_national_grid();
        let left: Vec<Feature> = (0..8760).map(|i| square(i as f64, 0.0, 1.0, "a")).collect();
        let right: Vec<Feature> = (0..19798).map(|i| square(i as f64, 5.0, 1.0, "b")).collect();
        let left = FeatureCollection::from_features(left, Some(crs.clone())).unwrap();
        let right = FeatureCollection::from_features(right, Some(crs)).unwrap();
        assert_eq!(28558, left.concat(&right).unwrap().len());
    }

    #[test]
    fn test_concat_unions_schemas() {
        let crs = british_national_grid();
        let left = FeatureCollection::from_features(vec![square(0.0, 0.0, 1.0, "a")], Some(crs.clone()))
            .unwrap();
        let mut other = square(2.0, 0.0, 1.0, "b");
        other.attributes.insert("site_type".to_string(), "Park".into());
        let right = FeatureCollection::from_features(vec![other], Some(crs)).unwrap();

        let combined = left.concat(&right).unwrap();
        assert_eq!(
            vec!["name".to_string(), "site_type".to_string()],
            combined.columns
        );
        assert_eq!(
            Some(&AttributeValue::Null),
            combined.features()[0].attributes.get("site_type")
        );
    }

    #[test]
    fn test_concat_rejects_mismatched_crs() {
        let left = FeatureCollection::from_features(
            vec![square(0.0, 0.0, 1.0, "a")],
            Some(british_national_grid()),
        )
        .unwrap();
        let right = FeatureCollection::from_features(
            vec![square(0.0, 0.0, 1.0, "b")],
            Some(Crs::from_epsg(4326).unwrap()),
        )
        .unwrap();
        assert!(matches!(
            left.concat(&right),
            Err(AnalysisError::CrsMismatch { .. })
        ));
    }
}
