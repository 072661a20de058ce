//! Request and response bodies exchanged with the service.
//!
//! Only the fields the engine uses are modelled strictly; features are kept
//! as raw JSON so the map host can interpret their geometries.

use clipzip_types::{Collection, Crs, JobId};
use serde::{Deserialize, Serialize};

/// Body of `POST /collections`.
///
/// The CRS is sent as `geom_crs`. Older browser clients spelled it
/// `geom-crs`, which is accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionsQuery {
    /// Area of interest as WKT. Omitted for the whole catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geom: Option<String>,
    #[serde(alias = "geom-crs")]
    pub geom_crs: Crs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionsResponse {
    #[serde(default)]
    pub collections: Vec<Collection>,
}

/// Area used to clip `GET /collections/{id}/items`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipArea {
    pub wkt: String,
    pub crs: Crs,
}

/// One feature record. `geometry` is GeoJSON; `geometry_clipped` is the part
/// inside the requested area when clipping was asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry_clipped: Option<serde_json::Value>,
    #[serde(default)]
    pub properties: serde_json::Value,
}

/// Body of `GET /collections/{id}/items`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeaturePage {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(rename = "numberMatched", default)]
    pub number_matched: u64,
    #[serde(rename = "numberReturned", default)]
    pub number_returned: u64,
}

/// Inputs of the extraction process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionInputs {
    pub geom: String,
    pub geom_crs: Crs,
    pub collections: Vec<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_crs: Option<Crs>,
}

/// Body of `POST /processes/extract/execution`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub inputs: ExtractionInputs,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobAccepted {
    pub job_id: JobId,
}

/// Server-side job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatusKind {
    Accepted,
    Running,
    Successful,
    Failed,
    Dismissed,
    #[serde(other)]
    Unknown,
}

/// Body of `GET /jobs/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatus {
    pub status: JobStatusKind,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobStatus {
    /// Progress as a whole percentage.
    pub fn percent(&self) -> u8 {
        self.progress.clamp(0.0, 100.0).round() as u8
    }
}

/// Body of `GET /jobs/{id}/results`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobResult {
    pub extract_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_body_shape() {
        let req = ExtractionRequest {
            inputs: ExtractionInputs {
                geom: "POLYGON((0 0,1 0,1 1,0 0))".into(),
                geom_crs: Crs(3978),
                collections: vec!["a".into(), "b".into()],
                email: "x@example.com".into(),
                out_crs: None,
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["inputs"]["geom_crs"], 3978);
        assert_eq!(json["inputs"]["collections"][1], "b");
        assert!(json["inputs"].get("out_crs").is_none());
    }

    #[test]
    fn test_whole_catalog_query_omits_geom() {
        let body = serde_json::to_value(CollectionsQuery {
            geom: None,
            geom_crs: Crs(3978),
        })
        .unwrap();
        assert!(body.get("geom").is_none());
        assert_eq!(body["geom_crs"], 3978);

        let legacy: CollectionsQuery = serde_json::from_str(r#"{"geom-crs": 4326}"#).unwrap();
        assert_eq!(legacy.geom_crs, Crs::WGS84);
        assert!(legacy.geom.is_none());
    }

    #[test]
    fn test_collections_survive_odd_crs() {
        let resp: CollectionsResponse = serde_json::from_str(
            r#"{"collections": [
                {"id": "roads", "itemType": "feature", "crs": ["3979"]},
                {"id": "dem", "itemType": "coverage",
                 "crs": ["http://www.opengis.net/def/crs/OGC/1.3/CRS84", "4617"]},
                {"id": "lidar", "itemType": "coverage", "crs": ["CRS84"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(resp.collections.len(), 3);
        assert_eq!(resp.collections[0].native_crs(), Some(Crs(3979)));
        assert_eq!(resp.collections[1].native_crs(), Some(Crs::NAD83_CSRS));
        assert_eq!(resp.collections[2].native_crs(), None);
    }

    #[test]
    fn test_job_status_parsing() {
        let s: JobStatus =
            serde_json::from_str(r#"{"status": "accepted", "progress": 54.6, "jobID": "j"}"#).unwrap();
        assert_eq!(s.status, JobStatusKind::Accepted);
        assert_eq!(s.percent(), 55);

        let s: JobStatus = serde_json::from_str(r#"{"status": "paused"}"#).unwrap();
        assert_eq!(s.status, JobStatusKind::Unknown);
        assert_eq!(s.percent(), 0);
    }

    #[test]
    fn test_feature_page_defaults() {
        let page: FeaturePage = serde_json::from_str(r#"{"features": [{"geometry": {"type": "Point", "coordinates": [1, 2]}}]}"#).unwrap();
        assert_eq!(page.features.len(), 1);
        assert!(page.features[0].geometry_clipped.is_none());
        assert_eq!(page.number_matched, 0);
    }
}
