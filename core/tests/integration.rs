//! Full session lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives every client
//! operation over real HTTP through `UreqTransport`. Validates that request
//! building, the interceptors and response parsing agree with the server's
//! schema end to end.

use std::sync::{Arc, Mutex};

use segment_client::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY};
use segment_client::{
    fallback, ApiClient, ClientConfig, ClusterRequest, CustomerFilter, LoginRequest,
    MemorySessionStore, SessionStore, UploadFile, UreqTransport,
};

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn client(base_url: &str, store: Arc<MemorySessionStore>, routes: Arc<Mutex<Vec<String>>>) -> ApiClient {
    ApiClient::new(
        &ClientConfig::new(base_url),
        Arc::new(UreqTransport::new()),
        store,
        Arc::new(move |route: &str| routes.lock().unwrap().push(route.to_string())),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn session_lifecycle() {
    let base_url = start_server();
    let store = Arc::new(MemorySessionStore::new());
    let routes = Arc::new(Mutex::new(Vec::new()));
    let client = client(&base_url, store.clone(), routes.clone());

    // Step 1: wrong password surfaces the server's message.
    let err = client
        .login(&LoginRequest {
            email: mock_server::DEMO_EMAIL.to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");
    assert_eq!(*routes.lock().unwrap(), vec!["/login".to_string()]);
    routes.lock().unwrap().clear();

    // Step 2: log in.
    let session = client
        .login(&LoginRequest {
            email: mock_server::DEMO_EMAIL.to_string(),
            password: mock_server::DEMO_PASSWORD.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(session.user_id, mock_server::DEMO_USER_ID);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), Some(session.access_token.clone()));

    // Step 3: authenticated reads return server data, not the fallback.
    let segments = client.get_segments().await;
    assert_eq!(segments.len(), 3);
    assert_ne!(segments, fallback::segments());
    assert_eq!(segments[0].segment_name, "Frugal Families");
    assert!(segments[0].characteristics.is_some());

    let insights = client.get_insights().await;
    assert_eq!(insights.len(), 3);
    assert!(insights[2].segment_name.is_none());

    let dashboard = client.get_dashboard().await;
    assert_eq!(dashboard.total_customers, 9);
    assert_eq!(dashboard.segment_distribution[&1], 3);

    let married = client
        .get_customers(&CustomerFilter::default().with_marital_status("Married"))
        .await;
    assert_eq!(married.len(), 4);
    assert!(married.iter().all(|c| c.marital_status == "Married"));

    assert_eq!(client.get_customer_by_id(1008).await.map(|c| c.segment), Some(2));
    assert!(client.get_customer_by_id(1).await.is_none());

    // Step 4: upload a CSV and cluster it.
    let file = UploadFile::new(
        "campaign.csv",
        b"ID,Education,Income\n1,Graduate,58138\n2,PhD,46344\n".to_vec(),
    );
    let upload = client.upload_file(&file).await.unwrap();
    assert_eq!(upload.row_count, 2);
    assert_eq!(upload.preview[0]["Education"], "Graduate");
    let parquet_path = upload.parquet_path.unwrap();

    let result = client
        .cluster_data(&ClusterRequest {
            file_path: parquet_path.clone(),
            num_clusters: 4,
        })
        .await
        .unwrap();
    assert_eq!(result.clusters_created, 4);
    assert_eq!(result.message, format!("Clustering completed for {parquet_path}"));

    let err = client
        .cluster_data(&ClusterRequest {
            file_path: "uploads/none.parquet".to_string(),
            num_clusters: 4,
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unknown dataset: uploads/none.parquet");

    // Step 5: refresh rotates the stored pair.
    let access = client.refresh_token().await.unwrap();
    assert_ne!(access, session.access_token);
    assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), Some(access));
    assert_ne!(store.get(REFRESH_TOKEN_KEY).unwrap(), Some(session.refresh_token));

    // Step 6: logout clears everything; reads now hit 401 and degrade.
    client.logout().await;
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY] {
        assert!(store.get(key).unwrap().is_none(), "{key} still stored");
    }
    assert!(routes.lock().unwrap().is_empty());

    assert_eq!(client.get_dashboard().await, fallback::dashboard());
    assert_eq!(*routes.lock().unwrap(), vec!["/login".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_token_triggers_redirect() {
    let base_url = start_server();
    let store = Arc::new(MemorySessionStore::new());
    store.set(ACCESS_TOKEN_KEY, "stale").unwrap();
    store.set(REFRESH_TOKEN_KEY, "stale-refresh").unwrap();
    let routes = Arc::new(Mutex::new(Vec::new()));
    let client = client(&base_url, store.clone(), routes.clone());

    assert!(client.get_customers(&CustomerFilter::segment(0)).await.is_empty());

    assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("stale-refresh"));
    assert_eq!(*routes.lock().unwrap(), vec!["/login".to_string()]);
}

#[tokio::test]
async fn unreachable_backend_degrades() {
    // Bind then drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let store = Arc::new(MemorySessionStore::new());
    let routes = Arc::new(Mutex::new(Vec::new()));
    let client = client(&format!("http://{addr}"), store, routes.clone());

    assert_eq!(client.get_segments().await, fallback::segments());
    assert!(client.get_customer_by_id(1).await.is_none());
    let err = client
        .login(&LoginRequest {
            email: "a@b.c".to_string(),
            password: "x".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Failed to login");
    assert!(routes.lock().unwrap().is_empty());
}
