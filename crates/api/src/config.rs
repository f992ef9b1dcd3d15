//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use engine::SweeperConfig;
use relay::RelayConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8081`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL stores when set, in-memory otherwise
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `KAFKA_BROKERS` — Kafka publisher when set (needs the `kafka` feature)
/// - `ORDER_EVENTS_TOPIC` — broker topic (default: `"loms.order-events"`)
/// - `APP_NAME` — `app-name` message header (default: `"loms"`)
/// - `RELAY_INTERVAL_MS`, `RELAY_BATCH_SIZE`, `RELAY_PUBLISH_TIMEOUT_MS`
/// - `SWEEP_INTERVAL_MS`, `SWEEP_STALE_AFTER_SECS`, `SWEEP_BATCH_SIZE`
/// - `STOCK_SEED_PATH` — seed catalogue file (default: bundled catalogue)
///
/// Unparseable values, and zero for the relay and sweep settings, fall back
/// to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub kafka_brokers: Option<String>,
    pub order_events_topic: String,
    pub app_name: String,
    pub relay_interval: Duration,
    pub relay_batch_size: usize,
    pub relay_publish_timeout: Duration,
    pub sweep_interval: Duration,
    pub sweep_stale_after: Duration,
    pub sweep_batch_size: usize,
    pub stock_seed_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            kafka_brokers: non_empty("KAFKA_BROKERS"),
            order_events_topic: non_empty("ORDER_EVENTS_TOPIC")
                .unwrap_or(defaults.order_events_topic),
            app_name: non_empty("APP_NAME").unwrap_or(defaults.app_name),
            relay_interval: parse("RELAY_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.relay_interval),
            relay_batch_size: parse("RELAY_BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.relay_batch_size),
            relay_publish_timeout: parse("RELAY_PUBLISH_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.relay_publish_timeout),
            sweep_interval: parse("SWEEP_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            sweep_stale_after: parse("SWEEP_STALE_AFTER_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_stale_after),
            sweep_batch_size: parse("SWEEP_BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.sweep_batch_size),
            stock_seed_path: non_empty("STOCK_SEED_PATH").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the outbox relay.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            topic: self.order_events_topic.clone(),
            interval: self.relay_interval,
            batch_size: self.relay_batch_size,
            publish_timeout: self.relay_publish_timeout,
        }
    }

    /// Settings for the stale order sweeper.
    pub fn sweeper_config(&self) -> SweeperConfig {
        SweeperConfig {
            interval: self.sweep_interval,
            stale_after: chrono::Duration::from_std(self.sweep_stale_after)
                .unwrap_or(chrono::Duration::MAX),
            batch_size: self.sweep_batch_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            kafka_brokers: None,
            order_events_topic: "loms.order-events".to_string(),
            app_name: "loms".to_string(),
            relay_interval: Duration::from_millis(3000),
            relay_batch_size: 500,
            relay_publish_timeout: Duration::from_millis(5000),
            sweep_interval: Duration::from_millis(60_000),
            sweep_stale_after: Duration::from_secs(300),
            sweep_batch_size: 500,
            stock_seed_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.order_events_topic, "loms.order-events");
        assert_eq!(config.relay_interval, Duration::from_secs(3));
        assert_eq!(config.relay_batch_size, 500);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), Config::default().addr());
        assert!(config.kafka_brokers.is_none());
        assert!(config.stock_seed_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "9090"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/loms"),
            ("RELAY_INTERVAL_MS", "250"),
            ("RELAY_BATCH_SIZE", "50"),
            ("SWEEP_STALE_AFTER_SECS", "30"),
            ("ORDER_EVENTS_TOPIC", "orders"),
        ]);

        assert_eq!(config.port, 9090);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/loms")
        );

        let relay = config.relay_config();
        assert_eq!(relay.topic, "orders");
        assert_eq!(relay.interval, Duration::from_millis(250));
        assert_eq!(relay.batch_size, 50);

        let sweeper = config.sweeper_config();
        assert_eq!(sweeper.stale_after, chrono::Duration::seconds(30));
    }

    #[test]
    fn test_sweeper_batch_size_is_independent_of_relay() {
        let config = from_pairs(&[("RELAY_BATCH_SIZE", "50")]);
        assert_eq!(config.relay_config().batch_size, 50);
        assert_eq!(config.sweeper_config().batch_size, 500);

        let config = from_pairs(&[("SWEEP_BATCH_SIZE", "20")]);
        assert_eq!(config.relay_config().batch_size, 500);
        assert_eq!(config.sweeper_config().batch_size, 20);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("RELAY_BATCH_SIZE", "-1"),
            ("SWEEP_INTERVAL_MS", "0"),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.relay_batch_size, 500);
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
