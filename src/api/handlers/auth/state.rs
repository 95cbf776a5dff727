//! Auth configuration and the shared, read-only auth state.

use secrecy::SecretString;

use super::token::SessionKeys;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SESSION_COOKIE_NAME: &str = "hostelry_session";
const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl_seconds: i64,
    session_cookie_name: String,
    session_cookie_secure: bool,
    bcrypt_cost: u32,
    login_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            session_cookie_secure: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: String) -> Self {
        self.session_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_session_cookie_secure(mut self, secure: bool) -> Self {
        self.session_cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: String) -> Self {
        self.login_path = path;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.session_cookie_secure
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}

/// Built once at startup and shared behind an `Arc` by every request.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    keys: SessionKeys,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, secret: SecretString) -> Self {
        Self {
            config,
            keys: SessionKeys::new(secret),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AuthConfig::new();
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert_eq!(config.session_cookie_name(), "hostelry_session");
        assert!(config.session_cookie_secure());
        assert_eq!(config.login_path(), "/login");
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new()
            .with_session_ttl_seconds(60)
            .with_session_cookie_name("sid".to_string())
            .with_session_cookie_secure(false)
            .with_bcrypt_cost(4)
            .with_login_path("/signin".to_string());
        assert_eq!(config.session_ttl_seconds(), 60);
        assert_eq!(config.session_cookie_name(), "sid");
        assert!(!config.session_cookie_secure());
        assert_eq!(config.bcrypt_cost(), 4);
        assert_eq!(config.login_path(), "/signin");
    }
}
