use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the report API listens on
    pub port: u16,
    /// Path to the SQLite database holding reports, rosters and sessions
    pub database_url: String,
    /// How long an untouched interview session stays resumable
    pub session_ttl: Duration,
    /// How often expired sessions are swept
    pub session_cleanup_period: Duration,
    /// Webhook receiving finished reports. Unset means log-only delivery.
    pub notify_url: Option<String>,
    /// Per-delivery HTTP timeout
    pub notify_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: env_or("REPORTER_PORT", 9190)?,
            database_url: env_value("REPORTER_DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./data/reporter.db".to_string()),
            session_ttl: env_secs("REPORTER_SESSION_TTL_SECS", 7 * 24 * 3600)?,
            session_cleanup_period: env_secs("REPORTER_SESSION_CLEANUP_SECS", 3600)?,
            notify_url: env_value("REPORTER_NOTIFY_URL"),
            notify_timeout: env_secs("REPORTER_NOTIFY_TIMEOUT_SECS", 10)?,
        })
    }
}

/// Trimmed value of `key`; blank counts as unset.
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_value(key) {
        Some(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={val:?} is not valid: {e}")),
        None => Ok(default),
    }
}

fn env_secs(key: &str, default: u64) -> anyhow::Result<Duration> {
    env_or(key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique to each test so parallel tests do not race on them.

    #[test]
    fn test_env_or_default_when_unset() {
        let value: u64 = env_or("REPORTER_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("REPORTER_TEST_BAD_PORT", "not-a-port");
        let err = env_or::<u16>("REPORTER_TEST_BAD_PORT", 1).unwrap_err();
        assert!(err.to_string().contains("REPORTER_TEST_BAD_PORT"));
        std::env::remove_var("REPORTER_TEST_BAD_PORT");
    }

    #[test]
    fn test_blank_value_counts_as_unset() {
        std::env::set_var("REPORTER_TEST_BLANK_URL", "   ");
        assert_eq!(env_value("REPORTER_TEST_BLANK_URL"), None);
        std::env::set_var("REPORTER_TEST_BLANK_URL", " http://hook.local ");
        assert_eq!(
            env_value("REPORTER_TEST_BLANK_URL").as_deref(),
            Some("http://hook.local")
        );
        std::env::remove_var("REPORTER_TEST_BLANK_URL");
    }

    #[test]
    fn test_env_secs_builds_duration() {
        std::env::set_var("REPORTER_TEST_TTL_SECS", "90");
        assert_eq!(
            env_secs("REPORTER_TEST_TTL_SECS", 1).unwrap(),
            Duration::from_secs(90)
        );
        std::env::remove_var("REPORTER_TEST_TTL_SECS");
    }
}
