//! Harbor connection settings

use std::time::Duration;
use tagwarden_core::GatewayError;

/// Path of the v2 REST API under the registry host
pub const API_PATH: &str = "/api/v2.0";

/// Default page size for paged listings
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Harbor endpoint and credentials
#[derive(Clone)]
pub struct HarborConfig {
    base_url: String,
    username: String,
    password: String,
    /// Page size for project, rule and execution listings
    pub page_size: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for HarborConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl HarborConfig {
    /// Create configuration
    ///
    /// `endpoint` is either a bare host (`harbor.example.com`), which is
    /// reached over HTTPS, or a full URL. The API path is appended unless
    /// already present.
    ///
    /// # Errors
    /// - `GatewayError::Config` if the endpoint or username is empty
    pub fn new(
        endpoint: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(GatewayError::Config("username must not be empty".to_string()));
        }

        Ok(Self {
            base_url: normalize_endpoint(endpoint)?,
            username,
            password: password.into(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        })
    }

    /// With listing page size (at least 1)
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// With per-request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// With connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// API base URL, without trailing slash
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Basic-auth username
    #[inline]
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

fn normalize_endpoint(endpoint: &str) -> Result<String, GatewayError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(GatewayError::Config("registry URL must not be empty".to_string()));
    }

    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    };

    if url.ends_with(API_PATH) {
        Ok(url)
    } else {
        Ok(format!("{url}{API_PATH}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_https_and_api_path() {
        let config = HarborConfig::new("harbor.example.com", "admin", "pw").unwrap();
        assert_eq!(config.base_url(), "https://harbor.example.com/api/v2.0");
    }

    #[test]
    fn full_url_is_kept() {
        let config = HarborConfig::new("http://127.0.0.1:8080/", "admin", "pw").unwrap();
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/api/v2.0");

        let config =
            HarborConfig::new("https://harbor.example.com/api/v2.0/", "admin", "pw").unwrap();
        assert_eq!(config.base_url(), "https://harbor.example.com/api/v2.0");
    }

    #[test]
    fn empty_values_are_rejected() {
        assert!(matches!(
            HarborConfig::new("  ", "admin", "pw"),
            Err(GatewayError::Config(_))
        ));
        assert!(matches!(
            HarborConfig::new("harbor.example.com", "", "pw"),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_password() {
        let config = HarborConfig::new("harbor.example.com", "admin", "hunter2").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("admin"));
    }

    #[test]
    fn page_size_has_a_floor() {
        let config = HarborConfig::new("harbor.example.com", "admin", "pw")
            .unwrap()
            .with_page_size(0);
        assert_eq!(config.page_size, 1);
    }
}
