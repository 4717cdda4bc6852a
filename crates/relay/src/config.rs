//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,

    // CORS (the widget embeds cross-origin)
    pub cors_allow_origin: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },

            // CORS
            cors_allow_origin: env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".to_string()),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure config tests run serially (they modify shared env vars)
    static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn set_required_vars() {
        env::set_var("DATABASE_URL", "postgres://localhost/livedesk_test");
        env::set_var(
            "JWT_SECRET",
            "test-secret-test-secret-test-secret-test",
        );
    }

    fn cleanup() {
        env::remove_var("DATABASE_URL");
        env::remove_var("JWT_SECRET");
        env::remove_var("DATABASE_MAX_CONNECTIONS");
    }

    #[test]
    fn test_missing_database_url() {
        let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup();
        env::set_var(
            "JWT_SECRET",
            "test-secret-test-secret-test-secret-test",
        );

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
        cleanup();
    }

    #[test]
    fn test_weak_jwt_secret_rejected() {
        let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup();
        env::set_var("DATABASE_URL", "postgres://localhost/livedesk_test");
        env::set_var("JWT_SECRET", "short");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::WeakSecret(_))));
        cleanup();
    }

    #[test]
    fn test_defaults_applied() {
        let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
        cleanup();
        set_required_vars();

        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.cors_allow_origin, "*");
        cleanup();
    }
}
