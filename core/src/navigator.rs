//! Navigation side channel for session expiry.
//!
//! The response interceptor never navigates by itself; it calls whatever
//! `Navigator` the client was built with. Closures work directly:
//!
//! ```
//! use segment_client::Navigator;
//! let nav = |route: &str| println!("go to {route}");
//! nav.navigate("/login");
//! ```

/// Route the user is sent to when the server answers 401.
pub const LOGIN_ROUTE: &str = "/login";

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, route: &str) {
        self(route)
    }
}

/// Headless hosts have nowhere to go; record the redirect in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &str) {
        tracing::warn!(route, "session expired, navigation requested");
    }
}
