//! Application configuration loaded from environment variables.

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — PostgreSQL connection string (default: `None`, uses in-memory store)
/// - `DB_MAX_CONNECTIONS` — max database pool connections (default: `10`)
/// - `KAFKA_BROKERS` — comma-separated broker list (default: `"localhost:9092"`)
/// - `CONSUMER_GROUP_PREFIX` — prefix for the consumer group name (default: `""`)
/// - `TOPIC_PREFIX` — prefix applied to consumed topics (default: `""`)
/// - `PLATFORM_FEE_PERCENT` — platform fee percentage (default: `15.0`; non-positive
///   or unparsable values fall back to the default)
/// - `GATEWAY_SECRET_KEY` — gateway credentials (default: `None`, uses mock gateway)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub kafka_brokers: Vec<String>,
    pub consumer_group_prefix: String,
    pub topic_prefix: String,
    pub platform_fee_percent: f64,
    pub gateway_secret_key: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let platform_fee_percent = std::env::var("PLATFORM_FEE_PERCENT")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|fee| *fee > 0.0)
            .unwrap_or(15.0);

        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            kafka_brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string())
                .split(',')
                .map(|broker| broker.trim().to_string())
                .filter(|broker| !broker.is_empty())
                .collect(),
            consumer_group_prefix: std::env::var("CONSUMER_GROUP_PREFIX").unwrap_or_default(),
            topic_prefix: std::env::var("TOPIC_PREFIX").unwrap_or_default(),
            platform_fee_percent,
            gateway_secret_key: std::env::var("GATEWAY_SECRET_KEY").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Returns the durable consumer group name for this service.
    pub fn consumer_group(&self) -> String {
        format!("{}payment-service", self.consumer_group_prefix)
    }

    /// Applies the topic prefix to a base topic name.
    pub fn topic(&self, base: &str) -> String {
        format!("{}{}", self.topic_prefix, base)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            kafka_brokers: vec!["localhost:9092".to_string()],
            consumer_group_prefix: String::new(),
            topic_prefix: String::new(),
            platform_fee_percent: 15.0,
            gateway_secret_key: None,
            log_level: "info".to_string(),
        }
    }
}
