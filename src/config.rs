//! Runtime configuration for the auth service.

use url::Url;

use crate::ratelimit;
use crate::token;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    access_token_ttl_minutes: i64,
    refresh_token_ttl_days: i64,
    login_max_attempts: u32,
    login_window_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token_ttl_minutes: token::ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: token::REFRESH_TOKEN_TTL_DAYS,
            login_max_attempts: ratelimit::DEFAULT_MAX_ATTEMPTS,
            login_window_seconds: ratelimit::DEFAULT_WINDOW.as_secs(),
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_token_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_days(mut self, days: i64) -> Self {
        self.refresh_token_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_login_max_attempts(mut self, attempts: u32) -> Self {
        self.login_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_login_window_seconds(mut self, seconds: u64) -> Self {
        self.login_window_seconds = seconds;
        self
    }

    /// Public base URL the frontend is served from, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Refresh cookies are marked `Secure` only when the deployment actually
    /// serves https, so local http development still gets a cookie.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        Url::parse(&self.base_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }

    #[must_use]
    pub fn access_token_ttl_minutes(&self) -> i64 {
        self.access_token_ttl_minutes
    }

    #[must_use]
    pub fn refresh_token_ttl_days(&self) -> i64 {
        self.refresh_token_ttl_days
    }

    #[must_use]
    pub fn login_max_attempts(&self) -> u32 {
        self.login_max_attempts
    }

    #[must_use]
    pub fn login_window_seconds(&self) -> u64 {
        self.login_window_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_token_and_limiter_constants() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert_eq!(config.access_token_ttl_minutes(), 15);
        assert_eq!(config.refresh_token_ttl_days(), 7);
        assert_eq!(config.login_max_attempts(), 5);
        assert_eq!(config.login_window_seconds(), 900);
    }

    #[test]
    fn cookie_is_secure_only_over_https() {
        assert!(AuthConfig::new("https://app.example.com".to_string()).cookie_secure());
        assert!(!AuthConfig::new("http://localhost:3000".to_string()).cookie_secure());
        assert!(!AuthConfig::new("not a url".to_string()).cookie_secure());
    }

    #[test]
    fn base_url_trims_trailing_slash() {
        let config = AuthConfig::new("https://app.example.com/".to_string())
            .with_login_max_attempts(3)
            .with_login_window_seconds(60);
        assert_eq!(config.base_url(), "https://app.example.com");
        assert_eq!(config.login_max_attempts(), 3);
    }
}
