//! Domain DTOs for the analytics API.
//!
//! # Design
//! These types mirror the backend's JSON (camelCase field names) but are
//! defined independently from the mock-server crate. Integration tests catch
//! any schema drift between the two. Maps use `BTreeMap` so equality and
//! serialization order are deterministic.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Category name → segment id → customer count.
pub type CrossTab = BTreeMap<String, BTreeMap<u32, u64>>;

/// A customer segment produced by server-side clustering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub segment_id: u32,
    pub segment_name: String,
    pub description: String,
    pub customer_count: u64,
    pub avg_income: f64,
    pub avg_spending: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_mnt_wines: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_num_web_purchases: Option<f64>,
    pub response_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<BTreeMap<String, serde_json::Value>>,
}

/// Marketing guidance for one segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub segment_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,
    pub strategy: String,
    pub characteristics: String,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_metrics: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_customers: u64,
    pub avg_spending: f64,
    pub marketing_response_rate: f64,
    #[serde(default)]
    pub segment_distribution: BTreeMap<u32, u64>,
    pub income_by_segment: CrossTab,
    pub education_by_segment: CrossTab,
    pub marital_status_by_segment: CrossTab,
    pub top_segments: Vec<Segment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub education: String,
    pub marital_status: String,
    pub income: f64,
    pub segment: u32,
}

/// Optional filters for `GET /analysis/customers`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    pub segment: Option<u32>,
    pub marital_status: Option<String>,
}

impl CustomerFilter {
    pub fn segment(segment: u32) -> Self {
        Self {
            segment: Some(segment),
            marital_status: None,
        }
    }

    pub fn with_marital_status(mut self, marital_status: impl Into<String>) -> Self {
        self.marital_status = Some(marital_status.into());
        self
    }

    /// Query pairs for the set filters. An empty marital status is unset.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(segment) = self.segment {
            query.push(("segment".to_string(), segment.to_string()));
        }
        if let Some(status) = self.marital_status.as_deref().filter(|s| !s.is_empty()) {
            query.push(("maritalStatus".to_string(), status.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Tokens and identity of a logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// The `{ "data": ... }` wrapper the auth endpoints respond with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// A local file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn guess_content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "csv" => "text/csv",
        "json" => "application/json",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "parquet" => "application/vnd.apache.parquet",
        _ => "application/octet-stream",
    }
}

/// Normalized outcome of `POST /analysis/upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    pub file_name: String,
    pub row_count: u64,
    pub preview: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parquet_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub file_path: String,
    pub num_clusters: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResult {
    pub success: bool,
    pub message: String,
    pub clusters_created: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_optional_fields_are_omitted() {
        let segment = Segment {
            segment_id: 2,
            segment_name: "Premium".to_string(),
            description: String::new(),
            customer_count: 10,
            avg_income: 1.0,
            avg_spending: 2.0,
            avg_mnt_wines: None,
            avg_num_web_purchases: None,
            response_rate: 3.0,
            characteristics: None,
        };
        let json = serde_json::to_value(&segment).unwrap();
        assert_eq!(json["segmentId"], 2);
        assert!(json.get("avgMntWines").is_none());
        assert!(json.get("characteristics").is_none());
    }

    #[test]
    fn dashboard_reads_numeric_segment_keys() {
        let raw = r#"{
            "totalCustomers": 3,
            "avgSpending": 10.5,
            "marketingResponseRate": 1.0,
            "incomeBySegment": {"Low": {"0": 2, "1": 1}},
            "educationBySegment": {},
            "maritalStatusBySegment": {},
            "topSegments": []
        }"#;
        let dashboard: Dashboard = serde_json::from_str(raw).unwrap();
        assert_eq!(dashboard.income_by_segment["Low"][&0], 2);
        assert!(dashboard.segment_distribution.is_empty());
    }

    #[test]
    fn customer_filter_skips_unset_values() {
        assert!(CustomerFilter::default().to_query().is_empty());
        let filter = CustomerFilter::segment(0).with_marital_status("");
        assert_eq!(filter.to_query(), vec![("segment".to_string(), "0".to_string())]);
        let filter = CustomerFilter::default().with_marital_status("Married");
        assert_eq!(
            filter.to_query(),
            vec![("maritalStatus".to_string(), "Married".to_string())]
        );
    }

    #[test]
    fn upload_file_guesses_content_type() {
        assert_eq!(UploadFile::new("Customers.CSV", vec![]).content_type, "text/csv");
        assert_eq!(
            UploadFile::new("blob", vec![]).content_type,
            "application/octet-stream"
        );
    }
}
