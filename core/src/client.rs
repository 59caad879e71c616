//! Async client for the analytics API.
//!
//! # Design
//! `ApiClient` owns one `Transport`, one `SessionStore` and one `Navigator`,
//! all injected. Every call goes through `send`, which runs the two
//! interceptors exactly once around the transport:
//!
//! - outgoing: attach `Authorization: Bearer <accessToken>` when a token is
//!   stored;
//! - incoming: on 401, drop the stored access token and navigate to
//!   `/login`, then report the failure anyway.
//!
//! Each public operation names its failure policy: reporting reads go
//! through `degrade_with`, everything that changes state or identity goes
//! through `wrap_and_throw`.

use std::path::Path;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::endpoints::{check_status, Endpoints};
use crate::error::ApiError;
use crate::fallback;
use crate::http::{HttpRequest, HttpResponse, AUTHORIZATION};
use crate::navigator::{LogNavigator, Navigator, LOGIN_ROUTE};
use crate::policy::{degrade_with, wrap_and_throw};
use crate::session::{self, MemorySessionStore, SessionStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    ClusterRequest, ClusterResult, Customer, CustomerFilter, Dashboard, Insight, LoginRequest,
    RefreshRequest, Segment, Session, UploadFile, UploadResult,
};

pub struct ApiClient {
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            endpoints: Endpoints::new(&config.base_url),
            transport,
            store,
            navigator,
        }
    }

    /// ureq transport, in-memory session, log-only navigation, base address
    /// from the environment.
    pub fn from_env() -> Self {
        Self::new(
            &ClientConfig::from_env(),
            Arc::new(UreqTransport::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(LogNavigator),
        )
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Execute a request through both interceptors. Non-2xx responses come
    /// back as errors.
    pub async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.attach_token(&mut request);
        let response = self.transport.execute(request).await?;
        if response.status == 401 {
            self.expire_session();
        }
        check_status(&response)?;
        Ok(response)
    }

    fn attach_token(&self, request: &mut HttpRequest) {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) => request.set_header(AUTHORIZATION, format!("Bearer {token}")),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not read access token"),
        }
    }

    fn expire_session(&self) {
        if let Err(e) = self.store.remove(ACCESS_TOKEN_KEY) {
            tracing::warn!(error = %e, "could not clear access token");
        }
        tracing::info!("server rejected credentials, redirecting to login");
        self.navigator.navigate(LOGIN_ROUTE);
    }

    pub async fn get_segments(&self) -> Vec<Segment> {
        degrade_with("get_segments", fallback::segments, async {
            let response = self.send(self.endpoints.build_segments()).await?;
            self.endpoints.parse_segments(response)
        })
        .await
    }

    pub async fn get_insights(&self) -> Vec<Insight> {
        degrade_with("get_insights", fallback::insights, async {
            let response = self.send(self.endpoints.build_insights()).await?;
            self.endpoints.parse_insights(response)
        })
        .await
    }

    pub async fn get_dashboard(&self) -> Dashboard {
        degrade_with("get_dashboard", fallback::dashboard, async {
            let response = self.send(self.endpoints.build_dashboard()).await?;
            self.endpoints.parse_dashboard(response)
        })
        .await
    }

    /// Empty on failure; customer records are never fabricated.
    pub async fn get_customers(&self, filter: &CustomerFilter) -> Vec<Customer> {
        degrade_with("get_customers", Vec::new, async {
            let response = self.send(self.endpoints.build_customers(filter)).await?;
            self.endpoints.parse_customers(response)
        })
        .await
    }

    pub async fn get_customer_by_id(&self, id: i64) -> Option<Customer> {
        degrade_with("get_customer_by_id", || None, async {
            let response = self.send(self.endpoints.build_customer(id)).await?;
            self.endpoints.parse_customer(response)
        })
        .await
    }

    /// Authenticate and persist the returned session.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, ApiError> {
        wrap_and_throw("login", "Failed to login", self.try_login(credentials)).await
    }

    async fn try_login(&self, credentials: &LoginRequest) -> Result<Session, ApiError> {
        let request = self.endpoints.build_login(credentials)?;
        let response = self.send(request).await?;
        let session = self.endpoints.parse_login(response)?;
        session::persist(self.store.as_ref(), &session)?;
        tracing::info!(user_id = session.user_id, "logged in");
        Ok(session)
    }

    /// Ask the server to end the session, then clear local state whatever
    /// the server said.
    pub async fn logout(&self) {
        let outcome = match self.send(self.endpoints.build_logout()).await {
            Ok(response) => self.endpoints.parse_logout(response),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            tracing::error!(operation = "logout", error = %e, "request failed");
        }
        if let Err(e) = session::clear(self.store.as_ref()) {
            tracing::warn!(error = %e, "could not clear session");
        }
    }

    /// Trade the stored refresh token for a new pair and return the new
    /// access token. The session is left alone on failure.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        wrap_and_throw("refresh_token", "Failed to refresh token", self.try_refresh()).await
    }

    async fn try_refresh(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or(ApiError::MissingRefreshToken)?;
        let request = self.endpoints.build_refresh(&RefreshRequest { refresh_token })?;
        let response = self.send(request).await?;
        let pair = self.endpoints.parse_refresh(response)?;
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        Ok(pair.access_token)
    }

    /// The persisted session, when all of its fields are present.
    pub fn current_session(&self) -> Result<Option<Session>, ApiError> {
        Ok(session::load(self.store.as_ref())?)
    }

    pub async fn upload_file(&self, file: &UploadFile) -> Result<UploadResult, ApiError> {
        wrap_and_throw("upload_file", "Failed to upload file", self.try_upload(file)).await
    }

    async fn try_upload(&self, file: &UploadFile) -> Result<UploadResult, ApiError> {
        let response = self.send(self.endpoints.build_upload(file)).await?;
        let result = self.endpoints.parse_upload(response, file)?;
        tracing::info!(file = %result.file_name, rows = result.row_count, "upload accepted");
        Ok(result)
    }

    /// Read `path` from disk and upload it. A failed read is reported like
    /// any other upload failure.
    pub async fn upload_path(&self, path: impl AsRef<Path>) -> Result<UploadResult, ApiError> {
        let path = path.as_ref();
        wrap_and_throw("upload_file", "Failed to upload file", async {
            let file = UploadFile::from_path(path)?;
            self.try_upload(&file).await
        })
        .await
    }

    pub async fn cluster_data(&self, request: &ClusterRequest) -> Result<ClusterResult, ApiError> {
        wrap_and_throw("cluster_data", "Failed to cluster data", async {
            let response = self.send(self.endpoints.build_cluster(request)).await?;
            self.endpoints.parse_cluster(response, request)
        })
        .await
    }
}
