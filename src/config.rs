use std::env;

use crate::error::DispatchError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub average_speed_kmh: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, DispatchError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            average_speed_kmh: parse_or_default("AVERAGE_SPEED_KMH", 30.0)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            average_speed_kmh: 30.0,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, DispatchError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| DispatchError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
