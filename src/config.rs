use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mqtt_broker: String,
    pub mqtt_port: u16,
    pub mqtt_topic: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_keep_alive_secs: u64,
    pub mqtt_channel_capacity: usize,
    pub database_url: String,
    pub db_max_connections: u32,
    pub ui_channel_capacity: usize,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let mqtt_broker =
            env::var("MQTT_BROKER").unwrap_or_else(|_| "broker.sundaebytestt.com".to_string());
        let mqtt_port = parse_or("MQTT_PORT", 1883);
        let mqtt_topic =
            env::var("MQTT_TOPIC").unwrap_or_else(|_| "assignment/location".to_string());
        let mqtt_username = env::var("MQTT_USERNAME").ok().filter(|s| !s.is_empty());
        let mqtt_password = env::var("MQTT_PASSWORD").ok().filter(|s| !s.is_empty());
        let mqtt_keep_alive_secs = parse_or("MQTT_KEEP_ALIVE_SECS", 30);
        let mqtt_channel_capacity = parse_or("MQTT_CHANNEL_CAPACITY", 10);

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://LocationData.db".to_string());
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 5);

        let ui_channel_capacity = parse_or("UI_CHANNEL_CAPACITY", 100);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            mqtt_broker,
            mqtt_port,
            mqtt_topic,
            mqtt_username,
            mqtt_password,
            mqtt_keep_alive_secs,
            mqtt_channel_capacity,
            database_url,
            db_max_connections,
            ui_channel_capacity,
            log_level,
        })
    }
}

/// Reads `key` and parses it, falling back to `default` when unset or malformed.
fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
