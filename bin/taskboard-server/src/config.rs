//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use taskboard_core::RetentionConfig;

/// Runtime configuration for taskboard-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://taskboard.db?mode=rwc"`).
    pub database_url: String,

    /// Token the reporter and API clients must send in the `access-token`
    /// header. When unset, `/api` is open.
    pub api_token: Option<String>,

    /// Comma-separated CORS origins. When unset, any origin is allowed.
    pub cors_allowed_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Directory for a daily-rotated log file, in addition to stdout.
    pub log_dir: Option<String>,

    pub cleanup: CleanupConfig,
}

/// Retention settings; see [`RetentionConfig`].
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    /// `0` disables the TTL policy.
    pub ttl_days: u32,
    /// `0` disables the count policy.
    pub max_tasks: u64,
    pub interval_hours: u64,
    /// Run one pass before the periodic runner is armed.
    pub on_startup: bool,
}

impl CleanupConfig {
    pub fn retention(&self) -> RetentionConfig {
        RetentionConfig {
            enabled: self.enabled,
            ttl_days: (self.ttl_days > 0).then_some(self.ttl_days),
            max_tasks: (self.max_tasks > 0).then_some(self.max_tasks),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.max(1).saturating_mul(3600))
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_days: 30,
            max_tasks: 10_000,
            interval_hours: 1,
            on_startup: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = CleanupConfig::default();
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_address: env_or("TASKBOARD_BIND", "0.0.0.0:8000"),
            database_url: env_or("TASKBOARD_DATABASE_URL", "sqlite://taskboard.db?mode=rwc"),
            api_token: non_empty("TASKBOARD_API_TOKEN"),
            cors_allowed_origins: non_empty("TASKBOARD_CORS_ORIGINS"),
            log_level: env_or("TASKBOARD_LOG", "info"),
            log_json: parse_flag(lookup("TASKBOARD_LOG_JSON"), false),
            log_dir: non_empty("TASKBOARD_LOG_DIR"),
            cleanup: CleanupConfig {
                enabled: parse_flag(lookup("TASKBOARD_CLEANUP_ENABLED"), defaults.enabled),
                ttl_days: parse_or(lookup("TASKBOARD_CLEANUP_TTL_DAYS"), defaults.ttl_days),
                max_tasks: parse_or(lookup("TASKBOARD_CLEANUP_MAX_TASKS"), defaults.max_tasks),
                interval_hours: parse_or(
                    lookup("TASKBOARD_CLEANUP_INTERVAL_HOURS"),
                    defaults.interval_hours,
                ),
                on_startup: parse_flag(lookup("TASKBOARD_CLEANUP_ON_STARTUP"), defaults.on_startup),
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:8000");
        assert_eq!(cfg.api_token, None);
        assert!(!cfg.log_json);
        assert!(cfg.cleanup.enabled);
        assert!(cfg.cleanup.on_startup);
        assert_eq!(
            cfg.cleanup.retention(),
            RetentionConfig {
                enabled: true,
                ttl_days: Some(30),
                max_tasks: Some(10_000),
            }
        );
        assert_eq!(cfg.cleanup.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_disables_individual_policies() {
        let cfg = config_from(&[
            ("TASKBOARD_CLEANUP_TTL_DAYS", "0"),
            ("TASKBOARD_CLEANUP_MAX_TASKS", "250"),
            ("TASKBOARD_CLEANUP_INTERVAL_HOURS", "0"),
        ]);
        let retention = cfg.cleanup.retention();
        assert_eq!(retention.ttl_days, None);
        assert_eq!(retention.max_tasks, Some(250));
        assert_eq!(cfg.cleanup.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn huge_interval_saturates() {
        let cfg = config_from(&[("TASKBOARD_CLEANUP_INTERVAL_HOURS", "18446744073709551615")]);
        assert_eq!(cfg.cleanup.interval_hours, u64::MAX);
        assert_eq!(cfg.cleanup.interval(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn flags_and_bad_numbers() {
        let cfg = config_from(&[
            ("TASKBOARD_CLEANUP_ENABLED", "false"),
            ("TASKBOARD_LOG_JSON", "TRUE"),
            ("TASKBOARD_CLEANUP_TTL_DAYS", "thirty"),
            ("TASKBOARD_API_TOKEN", "   "),
        ]);
        assert!(!cfg.cleanup.enabled);
        assert!(cfg.log_json);
        assert_eq!(cfg.cleanup.ttl_days, 30);
        assert_eq!(cfg.api_token, None);
    }
}
