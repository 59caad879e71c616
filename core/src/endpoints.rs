//! Stateless request builder and response parser for the analytics API.
//!
//! # Design
//! `Endpoints` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! `ApiClient` wires the two together around a `Transport`; nothing in this
//! module touches the network or the session store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::http::{
    encode_multipart_file, HttpMethod, HttpRequest, HttpResponse, RequestBody, CONTENT_TYPE,
    JSON_CONTENT_TYPE,
};
use crate::types::{
    ClusterRequest, ClusterResult, Customer, CustomerFilter, Dashboard, Envelope, Insight,
    LoginRequest, RefreshRequest, Segment, Session, TokenPair, UploadFile, UploadResult,
};

pub const DEFAULT_UPLOAD_MESSAGE: &str = "File uploaded successfully";
pub const DEFAULT_CLUSTER_MESSAGE: &str = "Clustering completed successfully";

/// Multipart field the backend reads the uploaded file from.
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A bodiless request carrying the client's default JSON content type.
    pub fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers: vec![(CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string())],
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    fn json_request<B: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        input: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body =
            serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(method, path);
        req.body = RequestBody::Json(body);
        Ok(req)
    }

    pub fn build_segments(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/analysis/segments")
    }

    pub fn build_insights(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/analysis/insights")
    }

    pub fn build_dashboard(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/analysis/dashboard")
    }

    pub fn build_customers(&self, filter: &CustomerFilter) -> HttpRequest {
        let mut req = self.request(HttpMethod::Get, "/analysis/customers");
        req.query = filter.to_query();
        req
    }

    pub fn build_customer(&self, id: i64) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/analysis/customers/{id}"))
    }

    pub fn build_login(&self, credentials: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/auth/login", credentials)
    }

    pub fn build_logout(&self) -> HttpRequest {
        self.request(HttpMethod::Post, "/auth/logout")
    }

    pub fn build_refresh(&self, input: &RefreshRequest) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/auth/refreshtoken", input)
    }

    pub fn build_upload(&self, file: &UploadFile) -> HttpRequest {
        let (content_type, body) =
            encode_multipart_file(UPLOAD_FIELD, &file.file_name, &file.content_type, &file.bytes);
        let mut req = self.request(HttpMethod::Post, "/analysis/upload");
        req.set_header(CONTENT_TYPE, content_type);
        req.body = RequestBody::Multipart(body);
        req
    }

    pub fn build_cluster(&self, input: &ClusterRequest) -> HttpRequest {
        let mut req = self.request(HttpMethod::Post, "/analysis/cluster");
        req.query = vec![("parquetPath".to_string(), input.file_path.clone())];
        req
    }

    pub fn parse_segments(&self, response: HttpResponse) -> Result<Vec<Segment>, ApiError> {
        check_status(&response)?;
        parse_json(&response.body)
    }

    pub fn parse_insights(&self, response: HttpResponse) -> Result<Vec<Insight>, ApiError> {
        check_status(&response)?;
        parse_json(&response.body)
    }

    pub fn parse_dashboard(&self, response: HttpResponse) -> Result<Dashboard, ApiError> {
        check_status(&response)?;
        parse_json(&response.body)
    }

    pub fn parse_customers(&self, response: HttpResponse) -> Result<Vec<Customer>, ApiError> {
        check_status(&response)?;
        parse_json(&response.body)
    }

    /// A `null` body parses to `None`.
    pub fn parse_customer(&self, response: HttpResponse) -> Result<Option<Customer>, ApiError> {
        check_status(&response)?;
        parse_json(&response.body)
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<Session, ApiError> {
        check_status(&response)?;
        let envelope: Envelope<Session> = parse_json(&response.body)?;
        Ok(envelope.data)
    }

    pub fn parse_logout(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_refresh(&self, response: HttpResponse) -> Result<TokenPair, ApiError> {
        check_status(&response)?;
        let envelope: Envelope<TokenPair> = parse_json(&response.body)?;
        Ok(envelope.data)
    }

    /// Fill the fixed result shape, defaulting every field the server left
    /// out or sent empty. A 2xx body that is not a JSON object counts as
    /// having no fields at all.
    pub fn parse_upload(
        &self,
        response: HttpResponse,
        file: &UploadFile,
    ) -> Result<UploadResult, ApiError> {
        check_status(&response)?;
        let body: serde_json::Value =
            serde_json::from_str(&response.body).unwrap_or(serde_json::Value::Null);
        let field = |name: &str| body.as_object().and_then(|fields| fields.get(name));
        let text = |name: &str| {
            field(name)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(UploadResult {
            success: true,
            message: text("message").unwrap_or_else(|| DEFAULT_UPLOAD_MESSAGE.to_string()),
            file_name: text("fileName").unwrap_or_else(|| file.file_name.clone()),
            row_count: field("rowCount").and_then(whole_number).unwrap_or(0),
            preview: field("preview")
                .and_then(serde_json::Value::as_array)
                .cloned()
                .unwrap_or_default(),
            parquet_path: text("parquetPath"),
        })
    }

    /// `clusters_created` echoes the requested count; any count in the body
    /// is not read.
    pub fn parse_cluster(
        &self,
        response: HttpResponse,
        input: &ClusterRequest,
    ) -> Result<ClusterResult, ApiError> {
        check_status(&response)?;
        Ok(ClusterResult {
            success: true,
            message: body_message(&response.body)
                .unwrap_or_else(|| DEFAULT_CLUSTER_MESSAGE.to_string()),
            clusters_created: input.num_clusters,
        })
    }
}

/// Non-negative integer, also accepted in float form (`12.0`).
fn whole_number(value: &serde_json::Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Human-readable text from a response body: a JSON string is unwrapped, a
/// JSON object contributes its `message`, anything else is used verbatim.
fn body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(text)) => non_empty(Some(text)),
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(text)) => non_empty(Some(text.clone())),
            _ => Some(trimmed.to_string()),
        },
        Ok(serde_json::Value::Null) => None,
        _ => Some(trimmed.to_string()),
    }
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
pub fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    match response.status {
        401 => Err(ApiError::Unauthorized {
            body: response.body.clone(),
        }),
        404 => Err(ApiError::NotFound {
            body: response.body.clone(),
        }),
        status => Err(ApiError::Http {
            status,
            body: response.body.clone(),
        }),
    }
}
