use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEMO_EMAIL: &str = "analyst@example.com";
pub const DEMO_PASSWORD: &str = "analyst";
pub const DEMO_USER_ID: i64 = 7;

const PREVIEW_ROWS: usize = 5;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub segment_id: u32,
    pub segment_name: String,
    pub description: String,
    pub customer_count: u64,
    pub avg_income: f64,
    pub avg_spending: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_mnt_wines: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_num_web_purchases: Option<f64>,
    pub response_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub segment_id: u32,
    pub segment_name: Option<String>,
    pub strategy: String,
    pub characteristics: String,
    pub recommendations: Vec<String>,
    pub key_metrics: Option<BTreeMap<String, f64>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub education: String,
    pub marital_status: String,
    pub income: f64,
    pub segment: u32,
}

pub type CrossTab = BTreeMap<String, BTreeMap<u32, u64>>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_customers: u64,
    pub avg_spending: f64,
    pub marketing_response_rate: f64,
    pub segment_distribution: BTreeMap<u32, u64>,
    pub income_by_segment: CrossTab,
    pub education_by_segment: CrossTab,
    pub marital_status_by_segment: CrossTab,
    pub top_segments: Vec<Segment>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file_name: String,
    pub row_count: u64,
    pub preview: Vec<serde_json::Value>,
    pub parquet_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFilter {
    pub segment: Option<u32>,
    pub marital_status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterParams {
    pub parquet_path: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// A non-2xx answer with a `{ "message": ... }` body.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub message: String,
}

impl ApiFailure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { message: self.message })).into_response()
    }
}

pub struct Account {
    pub email: String,
    pub password: String,
    pub user_id: i64,
}

/// Everything the fake backend knows.
pub struct Backend {
    pub accounts: Vec<Account>,
    pub access_tokens: HashMap<String, i64>,
    pub refresh_tokens: HashMap<String, i64>,
    pub uploads: HashSet<String>,
    pub segments: Vec<Segment>,
    pub insights: Vec<Insight>,
    pub customers: Vec<Customer>,
}

pub type Db = Arc<RwLock<Backend>>;

impl Backend {
    pub fn seeded() -> Self {
        Self {
            accounts: vec![Account {
                email: DEMO_EMAIL.to_string(),
                password: DEMO_PASSWORD.to_string(),
                user_id: DEMO_USER_ID,
            }],
            access_tokens: HashMap::new(),
            refresh_tokens: HashMap::new(),
            uploads: HashSet::new(),
            segments: seed_segments(),
            insights: seed_insights(),
            customers: seed_customers(),
        }
    }

    fn issue_tokens(&mut self, user_id: i64) -> TokenData {
        let tokens = TokenData {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Uuid::new_v4().simple().to_string(),
        };
        self.access_tokens.insert(tokens.access_token.clone(), user_id);
        self.refresh_tokens.insert(tokens.refresh_token.clone(), user_id);
        tokens
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<i64, ApiFailure> {
        bearer_token(headers)
            .and_then(|token| self.access_tokens.get(token))
            .copied()
            .ok_or_else(ApiFailure::unauthorized)
    }

    pub fn dashboard(&self) -> Dashboard {
        let mut segment_distribution = BTreeMap::new();
        let mut income_by_segment = CrossTab::new();
        let mut education_by_segment = CrossTab::new();
        let mut marital_status_by_segment = CrossTab::new();
        for customer in &self.customers {
            *segment_distribution.entry(customer.segment).or_insert(0) += 1;
            for (tab, category) in [
                (&mut income_by_segment, income_band(customer.income)),
                (&mut education_by_segment, customer.education.as_str()),
                (&mut marital_status_by_segment, customer.marital_status.as_str()),
            ] {
                *tab.entry(category.to_string())
                    .or_default()
                    .entry(customer.segment)
                    .or_insert(0) += 1;
            }
        }

        let weight: u64 = self.segments.iter().map(|s| s.customer_count).sum();
        let weighted = |value: fn(&Segment) -> f64| {
            if weight == 0 {
                return 0.0;
            }
            let total: f64 = self
                .segments
                .iter()
                .map(|s| value(s) * s.customer_count as f64)
                .sum();
            (total / weight as f64 * 10.0).round() / 10.0
        };

        let mut top_segments = self.segments.clone();
        top_segments.sort_by(|a, b| b.customer_count.cmp(&a.customer_count));
        top_segments.truncate(3);

        Dashboard {
            total_customers: self.customers.len() as u64,
            avg_spending: weighted(|s| s.avg_spending),
            marketing_response_rate: weighted(|s| s.response_rate),
            segment_distribution,
            income_by_segment,
            education_by_segment,
            marital_status_by_segment,
            top_segments,
        }
    }
}

pub fn income_band(income: f64) -> &'static str {
    if income < 40_000.0 {
        "Low"
    } else if income < 70_000.0 {
        "Medium"
    } else {
        "High"
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn seed_segments() -> Vec<Segment> {
    vec![
        Segment {
            segment_id: 0,
            segment_name: "Frugal Families".to_string(),
            description: "Households with children that buy on promotion".to_string(),
            customer_count: 4,
            avg_income: 34_250.0,
            avg_spending: 210.0,
            avg_mnt_wines: Some(30.0),
            avg_num_web_purchases: None,
            response_rate: 6.5,
            characteristics: Some(serde_json::json!({"kidsAtHome": 2, "dealsPurchases": 4.1})),
        },
        Segment {
            segment_id: 1,
            segment_name: "Urban Professionals".to_string(),
            description: "Graduates buying mostly online".to_string(),
            customer_count: 3,
            avg_income: 61_000.0,
            avg_spending: 870.0,
            avg_mnt_wines: Some(310.0),
            avg_num_web_purchases: Some(6.2),
            response_rate: 18.0,
            characteristics: None,
        },
        Segment {
            segment_id: 2,
            segment_name: "Affluent Collectors".to_string(),
            description: "High earners buying premium wine in store".to_string(),
            customer_count: 2,
            avg_income: 92_500.0,
            avg_spending: 1_980.0,
            avg_mnt_wines: Some(940.0),
            avg_num_web_purchases: Some(3.5),
            response_rate: 31.0,
            characteristics: None,
        },
    ]
}

fn seed_insights() -> Vec<Insight> {
    let metrics = |spending: f64, response: f64, customers: f64| {
        Some(BTreeMap::from([
            ("Avg spending".to_string(), spending),
            ("Response (%)".to_string(), response),
            ("Customers".to_string(), customers),
        ]))
    };
    vec![
        Insight {
            segment_id: 0,
            segment_name: Some("Frugal Families".to_string()),
            strategy: "Bundles & Coupons".to_string(),
            characteristics: "Price sensitive, buys on deals".to_string(),
            recommendations: vec![
                "Send coupon books before school holidays".to_string(),
                "Bundle staples with wine samples".to_string(),
            ],
            key_metrics: metrics(210.0, 6.5, 4.0),
        },
        Insight {
            segment_id: 1,
            segment_name: Some("Urban Professionals".to_string()),
            strategy: "Digital First".to_string(),
            characteristics: "Online buyers, responsive to email".to_string(),
            recommendations: vec![
                "Personalized web recommendations".to_string(),
                "Subscription boxes with free delivery".to_string(),
            ],
            key_metrics: metrics(870.0, 18.0, 3.0),
        },
        Insight {
            segment_id: 2,
            segment_name: None,
            strategy: "Curated Exclusives".to_string(),
            characteristics: "High spend, in-store, premium taste".to_string(),
            recommendations: vec!["Invitation-only cellar events".to_string()],
            key_metrics: None,
        },
    ]
}

fn seed_customers() -> Vec<Customer> {
    let customer = |id: i64, education: &str, marital_status: &str, income: f64, segment: u32| Customer {
        id,
        education: education.to_string(),
        marital_status: marital_status.to_string(),
        income,
        segment,
    };
    vec![
        customer(1001, "Basic", "Married", 28_000.0, 0),
        customer(1002, "Graduate", "Married", 36_500.0, 0),
        customer(1003, "Basic", "Single", 31_000.0, 0),
        customer(1004, "Graduate", "Other", 41_500.0, 0),
        customer(1005, "Graduate", "Single", 58_000.0, 1),
        customer(1006, "Postgrad", "Single", 64_000.0, 1),
        customer(1007, "Graduate", "Married", 61_000.0, 1),
        customer(1008, "Postgrad", "Married", 88_000.0, 2),
        customer(1009, "Graduate", "Other", 97_000.0, 2),
    ]
}

pub fn seed() -> Db {
    Arc::new(RwLock::new(Backend::seeded()))
}

pub fn app() -> Router {
    app_with(seed())
}

/// Router over caller-owned state, so tests can inspect or prepare it.
pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refreshtoken", post(refresh_token))
        .route("/analysis/segments", get(list_segments))
        .route("/analysis/insights", get(list_insights))
        .route("/analysis/dashboard", get(dashboard))
        .route("/analysis/customers", get(list_customers))
        .route("/analysis/customers/{id}", get(get_customer))
        .route("/analysis/upload", post(upload))
        .route("/analysis/cluster", post(cluster))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginData>>, ApiFailure> {
    let mut backend = db.write().await;
    let user_id = backend
        .accounts
        .iter()
        .find(|a| a.email == input.email && a.password == input.password)
        .map(|a| a.user_id)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    let tokens = backend.issue_tokens(user_id);
    tracing::info!(user_id, "login");
    Ok(Json(Envelope {
        data: LoginData {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user_id,
        },
    }))
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> Json<ErrorBody> {
    if let Some(token) = bearer_token(&headers) {
        db.write().await.access_tokens.remove(token);
    }
    Json(ErrorBody {
        message: "Logged out".to_string(),
    })
}

async fn refresh_token(
    State(db): State<Db>,
    Json(input): Json<RefreshRequest>,
) -> Result<Json<Envelope<TokenData>>, ApiFailure> {
    let mut backend = db.write().await;
    let user_id = input
        .refresh_token
        .and_then(|token| backend.refresh_tokens.remove(&token))
        .ok_or_else(|| ApiFailure::new(StatusCode::FORBIDDEN, "Invalid refresh token"))?;
    Ok(Json(Envelope {
        data: backend.issue_tokens(user_id),
    }))
}

async fn list_segments(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Segment>>, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    Ok(Json(backend.segments.clone()))
}

async fn list_insights(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<Insight>>, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    Ok(Json(backend.insights.clone()))
}

async fn dashboard(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Dashboard>, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    Ok(Json(backend.dashboard()))
}

async fn list_customers(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<Vec<Customer>>, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    let customers = backend
        .customers
        .iter()
        .filter(|c| filter.segment.map_or(true, |segment| c.segment == segment))
        .filter(|c| {
            filter
                .marital_status
                .as_deref()
                .map_or(true, |status| c.marital_status == status)
        })
        .cloned()
        .collect();
    Ok(Json(customers))
}

async fn get_customer(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    backend
        .customers
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::new(StatusCode::NOT_FOUND, format!("Customer {id} not found")))
}

async fn upload(
    State(db): State<Db>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiFailure> {
    db.read().await.authorize(&headers)?;

    let bad_request = |message: String| ApiFailure::new(StatusCode::BAD_REQUEST, message);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field.bytes().await.map_err(|e| bad_request(e.to_string()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| bad_request("File must be UTF-8 CSV".to_string()))?;
        let (row_count, preview) =
            summarize_csv(text).ok_or_else(|| bad_request("Uploaded file is empty".to_string()))?;

        let stem = file_name.rsplit_once('.').map_or(file_name.as_str(), |(stem, _)| stem);
        let parquet_path = format!("uploads/{stem}-{}.parquet", Uuid::new_v4().simple());
        db.write().await.uploads.insert(parquet_path.clone());
        tracing::info!(%file_name, row_count, %parquet_path, "upload stored");

        return Ok(Json(UploadResponse {
            success: true,
            message: format!("Uploaded {row_count} rows"),
            file_name,
            row_count,
            preview,
            parquet_path,
        }));
    }
    Err(bad_request("No file provided".to_string()))
}

/// Row count and the first rows as JSON objects keyed by header. `None`
/// when there is no header line.
///
/// Fields may be double-quoted, with `""` for a literal quote. A record must
/// fit on one line.
pub fn summarize_csv(text: &str) -> Option<(u64, Vec<serde_json::Value>)> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let columns = split_record(lines.next()?);
    let mut row_count = 0;
    let mut preview = Vec::new();
    for line in lines {
        row_count += 1;
        if preview.len() < PREVIEW_ROWS {
            let record: serde_json::Map<String, serde_json::Value> = columns
                .iter()
                .zip(split_record(line))
                .map(|(column, cell)| (column.clone(), cell_value(&cell)))
                .collect();
            preview.push(serde_json::Value::Object(record));
        }
    }
    Some((row_count, preview))
}

fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
                was_quoted = true;
            }
            ',' if !quoted => {
                fields.push(finish_field(&mut field, was_quoted));
                was_quoted = false;
            }
            c => field.push(c),
        }
    }
    fields.push(finish_field(&mut field, was_quoted));
    fields
}

fn finish_field(field: &mut String, was_quoted: bool) -> String {
    let value = std::mem::take(field);
    if was_quoted {
        value.trim_end().to_string()
    } else {
        value.trim().to_string()
    }
}

fn cell_value(cell: &str) -> serde_json::Value {
    if let Ok(n) = cell.parse::<i64>() {
        return n.into();
    }
    cell.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| cell.into())
}

async fn cluster(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<ClusterParams>,
) -> Result<String, ApiFailure> {
    let backend = db.read().await;
    backend.authorize(&headers)?;
    if !backend.uploads.contains(&params.parquet_path) {
        return Err(ApiFailure::new(
            StatusCode::NOT_FOUND,
            format!("Unknown dataset: {}", params.parquet_path),
        ));
    }
    Ok(format!("Clustering completed for {}", params.parquet_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_serializes_camel_case() {
        let json = serde_json::to_value(&seed_segments()[1]).unwrap();
        assert_eq!(json["segmentId"], 1);
        assert_eq!(json["segmentName"], "Urban Professionals");
        assert_eq!(json["avgNumWebPurchases"], 6.2);
        assert!(json.get("characteristics").is_none());
    }

    #[test]
    fn refresh_request_accepts_null_token() {
        let input: RefreshRequest = serde_json::from_str(r#"{"refreshToken":null}"#).unwrap();
        assert!(input.refresh_token.is_none());
    }

    #[test]
    fn income_bands() {
        assert_eq!(income_band(39_999.0), "Low");
        assert_eq!(income_band(40_000.0), "Medium");
        assert_eq!(income_band(70_000.0), "High");
    }

    #[test]
    fn dashboard_counts_seeded_customers() {
        let dashboard = Backend::seeded().dashboard();
        assert_eq!(dashboard.total_customers, 9);
        assert_eq!(dashboard.segment_distribution[&0], 4);
        assert_eq!(dashboard.income_by_segment["Low"][&0], 3);
        assert_eq!(dashboard.income_by_segment["High"][&2], 2);
        assert_eq!(dashboard.marital_status_by_segment["Married"][&1], 1);
        assert_eq!(dashboard.top_segments[0].segment_id, 0);
    }

    #[test]
    fn summarize_csv_counts_rows_and_types_cells() {
        let (rows, preview) = summarize_csv("id,income,status\n1,50000.5,Single\n2,42000,Married\n").unwrap();
        assert_eq!(rows, 2);
        assert_eq!(preview[0]["id"], 1);
        assert_eq!(preview[0]["income"], 50000.5);
        assert_eq!(preview[1]["status"], "Married");
    }

    #[test]
    fn summarize_csv_limits_preview() {
        let mut csv = String::from("id\n");
        for i in 0..8 {
            csv.push_str(&format!("{i}\n"));
        }
        let (rows, preview) = summarize_csv(&csv).unwrap();
        assert_eq!(rows, 8);
        assert_eq!(preview.len(), PREVIEW_ROWS);
    }

    #[test]
    fn summarize_csv_keeps_quoted_commas() {
        let csv = "id,name,note\n1, \"Smith, J\" ,\"said \"\"hi\"\"\"\n2,,plain\n";
        let (rows, preview) = summarize_csv(csv).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(preview[0]["name"], "Smith, J");
        assert_eq!(preview[0]["note"], "said \"hi\"");
        assert_eq!(preview[1]["name"], "");
        assert_eq!(preview[1]["note"], "plain");
    }

    #[test]
    fn summarize_csv_rejects_empty_input() {
        assert!(summarize_csv("\n\n").is_none());
    }
}
