//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Comparing parsed JSON (not raw strings) avoids
//! false negatives from field-ordering differences.

use segment_client::types::RefreshRequest;
use segment_client::{
    ClusterRequest, CustomerFilter, Endpoints, HttpMethod, HttpRequest, HttpResponse,
    LoginRequest, RequestBody, UploadFile, UploadResult,
};

const BASE_URL: &str = "http://localhost:8080";

fn endpoints() -> Endpoints {
    Endpoints::new(BASE_URL)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn build(c: &Endpoints, operation: &str, input: &serde_json::Value) -> HttpRequest {
    match operation {
        "segments" => c.build_segments(),
        "insights" => c.build_insights(),
        "dashboard" => c.build_dashboard(),
        "customers" => c.build_customers(&CustomerFilter {
            segment: input["segment"].as_u64().map(|s| s as u32),
            marital_status: input["maritalStatus"].as_str().map(str::to_string),
        }),
        "customer" => c.build_customer(input["id"].as_i64().unwrap()),
        "login" => {
            let credentials: LoginRequest = serde_json::from_value(input.clone()).unwrap();
            c.build_login(&credentials).unwrap()
        }
        "logout" => c.build_logout(),
        "refresh" => {
            let body: RefreshRequest = serde_json::from_value(input.clone()).unwrap();
            c.build_refresh(&body).unwrap()
        }
        "cluster" => {
            let request: ClusterRequest = serde_json::from_value(input.clone()).unwrap();
            c.build_cluster(&request)
        }
        other => panic!("unknown operation: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = endpoints();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let operation = case["operation"].as_str().unwrap();
        let expected_req = &case["expected_request"];

        let req = build(&c, operation, &case["input"]);
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, format!("{BASE_URL}{}", expected_req["path"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.header("content-type"), Some("application/json"), "{name}: content type");

        let expected_query: Vec<(String, String)> = expected_req["query"]
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| {
                let arr = pair.as_array().unwrap();
                (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
            })
            .collect();
        assert_eq!(req.query, expected_query, "{name}: query");

        match (&req.body, &expected_req["body"]) {
            (RequestBody::Empty, serde_json::Value::Null) => {}
            (RequestBody::Json(body), expected) => {
                let body: serde_json::Value = serde_json::from_str(body).unwrap();
                assert_eq!(&body, expected, "{name}: body");
            }
            (body, expected) => panic!("{name}: body {body:?} does not match {expected}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Upload normalization
// ---------------------------------------------------------------------------

#[test]
fn upload_test_vectors() {
    let raw = include_str!("../../test-vectors/upload.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    let c = endpoints();
    let file = UploadFile::new(vectors["local_file_name"].as_str().unwrap(), b"ID\n1\n".to_vec());
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let result = c.parse_upload(response, &file);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            assert_eq!(
                err.status(),
                expected_error["status"].as_u64().map(|s| s as u16),
                "{name}: status"
            );
            assert_eq!(
                err.server_message().as_deref(),
                expected_error["message"].as_str(),
                "{name}: message"
            );
        } else {
            let expected: UploadResult = serde_json::from_value(case["expected_result"].clone()).unwrap();
            assert_eq!(result.unwrap(), expected, "{name}: parsed result");
        }
    }
}
