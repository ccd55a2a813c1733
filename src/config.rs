use log::{info, warn};
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub host: String,
    pub data_dir: String,
    pub database_url: String,
    pub artifact_dir: String,
    pub api_url: String,
    pub site_url: String,
    pub confirmation_ttl_secs: i64,
    pub session_ttl_secs: i64,
    pub mail_from: String,
    pub mail_outbox: Option<String>,
    pub artifact_extension: String,
    pub bcrypt_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "127.0.0.1".to_string(),
            data_dir: "./data".to_string(),
            database_url: "./data/napps.db".to_string(),
            artifact_dir: "./data/repo".to_string(),
            api_url: "http://127.0.0.1:8000/api".to_string(),
            site_url: "http://127.0.0.1:8000".to_string(),
            confirmation_ttl_secs: 86400, // 24 hours
            session_ttl_secs: 900,        // 15 minutes
            mail_from: "no-reply@napps.local".to_string(),
            mail_outbox: None,
            artifact_extension: "napp".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

/// Ten years
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Token lifetimes must be positive and bounded
fn ttl_or(name: &str, default: i64) -> i64 {
    let ttl = parsed_or(name, default);
    if (1..=MAX_TTL_SECS).contains(&ttl) {
        ttl
    } else {
        warn!("{name}={ttl} is outside 1..={MAX_TTL_SECS}, using {default}");
        default
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = parsed_or("NAPPS_PORT", defaults.port);
        let host = env::var("NAPPS_HOST").unwrap_or(defaults.host);

        let data_dir = env::var("NAPPS_DATA_DIR").unwrap_or(defaults.data_dir);
        let database_url =
            env::var("NAPPS_DATABASE_URL").unwrap_or_else(|_| format!("{data_dir}/napps.db"));
        let artifact_dir =
            env::var("NAPPS_ARTIFACT_DIR").unwrap_or_else(|_| format!("{data_dir}/repo"));

        let site_url =
            env::var("NAPPS_SITE_URL").unwrap_or_else(|_| format!("http://{host}:{port}"));
        let api_url =
            env::var("NAPPS_API_URL").unwrap_or_else(|_| format!("http://{host}:{port}/api"));

        let confirmation_ttl_secs =
            ttl_or("NAPPS_CONFIRMATION_TTL_SECS", defaults.confirmation_ttl_secs);
        let session_ttl_secs = ttl_or("NAPPS_SESSION_TTL_SECS", defaults.session_ttl_secs);

        let mail_from = env::var("NAPPS_MAIL_FROM").unwrap_or(defaults.mail_from);
        let mail_outbox = env::var("NAPPS_MAIL_OUTBOX")
            .ok()
            .filter(|dir| !dir.is_empty());

        let artifact_extension =
            env::var("NAPPS_ARTIFACT_EXTENSION").unwrap_or(defaults.artifact_extension);

        let bcrypt_cost = parsed_or("NAPPS_BCRYPT_COST", defaults.bcrypt_cost);

        info!("Configuration loaded:");
        info!("  Host: {host}");
        info!("  Port: {port}");
        info!("  Data Directory: {data_dir}");
        info!("  Database URL: {database_url}");
        info!("  Artifact Directory: {artifact_dir}");
        info!("  API URL: {api_url}");
        info!("  Site URL: {site_url}");
        info!("  Confirmation Token TTL: {confirmation_ttl_secs}s");
        info!("  Session Token TTL: {session_ttl_secs}s");
        info!("  Mail From: {mail_from}");
        info!(
            "  Mail Outbox: {}",
            mail_outbox.as_deref().unwrap_or("(log only)")
        );
        info!("  Artifact Extension: {artifact_extension}");
        info!("  Bcrypt Cost: {bcrypt_cost}");

        Self {
            port,
            host,
            data_dir,
            database_url,
            artifact_dir,
            api_url,
            site_url,
            confirmation_ttl_secs,
            session_ttl_secs,
            mail_from,
            mail_outbox,
            artifact_extension,
            bcrypt_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.confirmation_ttl_secs, 86400);
        assert_eq!(config.session_ttl_secs, 900);
        assert_eq!(config.artifact_extension, "napp");
        assert!(config.mail_outbox.is_none());
    }

    #[test]
    fn test_config_parsing() {
        assert_eq!("8080".parse::<u16>().unwrap_or(8000), 8080);
        assert_eq!("invalid".parse::<u16>().unwrap_or(8000), 8000);
        assert_eq!(parsed_or("NAPPS_TEST_UNSET_VARIABLE", 42u32), 42);
    }

    #[test]
    #[serial]
    fn test_token_ttls_fall_back_when_out_of_range() {
        for (raw, expected) in [
            ("3600", 3600),
            ("0", 900),
            ("-5", 900),
            ("9300000000000000", 900),
            ("soon", 900),
        ] {
            unsafe {
                env::set_var("NAPPS_TEST_SESSION_TTL", raw);
            }
            assert_eq!(ttl_or("NAPPS_TEST_SESSION_TTL", 900), expected, "{raw}");
        }

        unsafe {
            env::remove_var("NAPPS_TEST_SESSION_TTL");
        }
    }
}
