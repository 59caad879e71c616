//! Async API client for the customer-segmentation analytics service.
//!
//! # Overview
//! Typed calls for auth, file upload, the clustering trigger, and the
//! segment / insight / dashboard / customer reads. Reporting reads degrade to
//! a fixed demo dataset (or to empty, for customer records) when the backend
//! fails; auth, upload and clustering failures reach the caller.
//!
//! # Design
//! - `Endpoints` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse`, so the I/O boundary is explicit.
//! - `ApiClient` adds the injected collaborators: a `Transport`, a
//!   `SessionStore` and a `Navigator`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod fallback;
pub mod http;
pub mod navigator;
pub mod policy;
pub mod session;
pub mod transport;
pub mod types;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use endpoints::Endpoints;
pub use error::{ApiError, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody};
pub use navigator::{LogNavigator, Navigator, LOGIN_ROUTE};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
pub use transport::{Transport, UreqTransport};
pub use types::{
    ClusterRequest, ClusterResult, Customer, CustomerFilter, Dashboard, Insight, LoginRequest,
    Segment, Session, UploadFile, UploadResult,
};
