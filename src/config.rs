/// 환경 변수 기반 설정 (.env 는 dotenvy 로 로드)
// region:    --- Imports
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

// endregion: --- Imports

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} 값이 올바르지 않습니다: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("{0} 설정이 필요합니다")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBus {
    Kafka,
    Local,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub event_bus: EventBus,
    pub kafka_brokers: String,
    pub kafka_group_id: String,
    pub events_topic: String,
    pub market_utc_offset_hours: i32,
    pub scheduler_tick_ms: u64,
    pub closing_window_secs: i64,
    pub phase_rotation: bool,
}

impl Config {
    /// 프로세스 환경 변수에서 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env 파일이 없어도 무시
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };
        let event_bus = match lookup("EVENT_BUS").as_deref() {
            None | Some("kafka") => EventBus::Kafka,
            Some("local") => EventBus::Local,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EVENT_BUS",
                    value: other.to_string(),
                })
            }
        };

        let database_url = lookup("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Config {
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            store_backend,
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            event_bus,
            kafka_brokers: lookup("KAFKA_BROKERS").unwrap_or_else(|| "localhost:9092".to_string()),
            kafka_group_id: lookup("KAFKA_GROUP_ID")
                .unwrap_or_else(|| "auction-events-group".to_string()),
            events_topic: lookup("EVENTS_TOPIC").unwrap_or_else(|| "auction-events".to_string()),
            market_utc_offset_hours: parse_or(&lookup, "MARKET_UTC_OFFSET_HOURS", 3)?,
            scheduler_tick_ms: parse_or(&lookup, "SCHEDULER_TICK_MS", 1000)?,
            closing_window_secs: parse_or(&lookup, "CLOSING_WINDOW_SECS", 60)?,
            phase_rotation: parse_or(&lookup, "PHASE_ROTATION", true)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_for_memory_backend() {
        let config = config(&[("STORE_BACKEND", "memory"), ("EVENT_BUS", "local")]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.event_bus, EventBus::Local);
        assert_eq!(config.events_topic, "auction-events");
        assert_eq!(config.market_utc_offset_hours, 3);
        assert_eq!(config.closing_window_secs, 60);
        assert!(config.phase_rotation);
    }

    #[test]
    fn postgres_requires_database_url() {
        assert_eq!(
            config(&[]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let config = config(&[("DATABASE_URL", "postgres://localhost/dasm")]).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.event_bus, EventBus::Kafka);
    }

    #[test]
    fn malformed_values_are_reported() {
        let err = config(&[("STORE_BACKEND", "memory"), ("SCHEDULER_TICK_MS", "soon")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "SCHEDULER_TICK_MS",
                value: "soon".to_string()
            }
        );
        assert!(config(&[("STORE_BACKEND", "mongo")]).is_err());
    }
}
