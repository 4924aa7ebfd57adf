//! Authentication configuration with defaults and builder-style overrides.

const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_PASSWORD_MAX_AGE_DAYS: i64 = 30;
const DEFAULT_INACTIVITY_DAYS: i64 = 10;
const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 60 * 60;
const DEFAULT_FRONTEND_BASE_URL: &str = "http://localhost:3000";

/// Company names accepted on user profiles. Policy data, not logic; override
/// via `--allowed-companies`.
const DEFAULT_ALLOWED_COMPANIES: [&str; 3] =
    ["Al Safwan Marine", "Louis Safety", "Data Grid Labs"];

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    password_max_age_days: i64,
    inactivity_days: i64,
    reset_token_ttl_seconds: i64,
    sweep_interval_seconds: u64,
    allowed_companies: Vec<String>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            password_max_age_days: DEFAULT_PASSWORD_MAX_AGE_DAYS,
            inactivity_days: DEFAULT_INACTIVITY_DAYS,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL_SECONDS,
            allowed_companies: DEFAULT_ALLOWED_COMPANIES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_max_age_days(mut self, days: i64) -> Self {
        self.password_max_age_days = days;
        self
    }

    #[must_use]
    pub fn with_inactivity_days(mut self, days: i64) -> Self {
        self.inactivity_days = days;
        self
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_sweep_interval_seconds(mut self, seconds: u64) -> Self {
        self.sweep_interval_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_allowed_companies(mut self, companies: Vec<String>) -> Self {
        self.allowed_companies = companies;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn password_max_age_days(&self) -> i64 {
        self.password_max_age_days
    }

    #[must_use]
    pub fn inactivity_days(&self) -> i64 {
        self.inactivity_days
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }

    #[must_use]
    pub fn sweep_interval_seconds(&self) -> u64 {
        self.sweep_interval_seconds
    }

    #[must_use]
    pub fn allowed_companies(&self) -> &[String] {
        &self.allowed_companies
    }

    /// Only mark session cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRONTEND_BASE_URL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl_seconds(), 30 * 60);
        assert_eq!(config.password_max_age_days(), 30);
        assert_eq!(config.inactivity_days(), 10);
        assert_eq!(config.reset_token_ttl_seconds(), 24 * 60 * 60);
        assert_eq!(config.sweep_interval_seconds(), 3600);
        assert_eq!(config.allowed_companies().len(), 3);
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new("https://helm.example.com".to_string())
            .with_session_ttl_seconds(60)
            .with_password_max_age_days(7)
            .with_inactivity_days(3)
            .with_reset_token_ttl_seconds(120)
            .with_sweep_interval_seconds(30)
            .with_allowed_companies(vec!["Acme".to_string()]);

        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.password_max_age_days(), 7);
        assert_eq!(config.inactivity_days(), 3);
        assert_eq!(config.reset_token_ttl_seconds(), 120);
        assert_eq!(config.sweep_interval_seconds(), 30);
        assert_eq!(config.allowed_companies(), ["Acme".to_string()]);
        assert!(config.session_cookie_secure());
    }
}
