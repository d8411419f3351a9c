use reqwest::StatusCode;
use serde::Deserialize;

use crate::{
    error::{AnalysisError, Result},
    geofile::{AttributeValue, Attributes, Feature},
};

use super::{PostcodeLookup, LSOA_CODE_COLUMN, POSTCODE_COLUMN};

pub const DEFAULT_BASE_URL: &str = "https://api.postcodes.io";

#[derive(Deserialize, Debug)]
struct PostcodeResponse {
    result: Option<PostcodeResult>,
}

#[derive(Deserialize, Debug)]
struct PostcodeResult {
    postcode: String,
    longitude: Option<f64>,
    latitude: Option<f64>,
    codes: Option<StatisticalCodes>,
}

#[derive(Deserialize, Debug)]
struct StatisticalCodes {
    lsoa: Option<String>,
}

/// Postcode lookups against a postcodes.io compatible service.
pub struct PostcodesIo {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PostcodesIo {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("overlay-rust")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, postcode: &str) -> String {
        format!("{}/postcodes/{}", self.base_url, postcode.trim().replace(' ', "%20"))
    }
}

impl PostcodeLookup for PostcodesIo {
    fn lookup(&self, postcode: &str) -> Result<Option<Feature>> {
        let response = self.client.get(self.url(postcode)).send()?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AnalysisError::LookupFailed {
                postcode: postcode.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        parse_response(&body)
    }
}

/// Feature of a successful lookup. Terminated postcodes come back without coordinates and are
/// treated as not found.
fn parse_response(body: &str) -> Result<Option<Feature>> {
    let response: PostcodeResponse = serde_json::from_str(body)?;
    let result = match response.result {
        Some(result) => result,
        None => return Ok(None),
    };
    let (longitude, latitude) = match (result.longitude, result.latitude) {
        (Some(longitude), Some(latitude)) => (longitude, latitude),
        _ => {
            log::warn!("Postcode {} has no coordinates", result.postcode);
            return Ok(None);
        }
    };
    let lsoa_code = result.codes.and_then(|codes| codes.lsoa);
    let attributes = Attributes::from([
        (POSTCODE_COLUMN.to_string(), AttributeValue::from(result.postcode)),
        (LSOA_CODE_COLUMN.to_string(), AttributeValue::from(lsoa_code)),
    ]);
    Ok(Some(Feature::new(
        geo::Geometry::Point(geo::Point::new(longitude, latitude)),
        attributes,
    )))
}

#[cfg(test)]
mod tests {
    use super::{parse_response, PostcodesIo};
    use crate::geofile::AttributeValue;

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "status": 200,
            "result": {
                "postcode": "SW1A 1AA",
                "longitude": -0.141588,
                "latitude": 51.501009,
                "lsoa": "Westminster 018C",
                "codes": {"lsoa": "E01004736", "msoa": "E02000977"}
            }
        }"#;
        let feature = parse_response(body).unwrap().unwrap();
        assert_eq!(
            geo::Geometry::Point(geo::Point::new(-0.141588, 51.501009)),
            feature.geometry
        );
        assert_eq!(
            Some(&AttributeValue::from("E01004736")),
            feature.attributes.get("lsoa_code")
        );
    }

    #[test]
    fn test_missing_coordinates_are_not_found() {
        let body = r#"{"status": 200, "result": {"postcode": "EC1A 9ZZ", "longitude": null, "latitude": null}}"#;
        assert!(parse_response(body).unwrap().is_none());
    }

    #[test]
    fn test_url_escapes_spaces() {
        let lookup = PostcodesIo::new("https://api.postcodes.io/").unwrap();
        assert_eq!(
            "https://api.postcodes.io/postcodes/SW1A%201AA",
            lookup.url(" SW1A 1AA ")
        );
    }
}
