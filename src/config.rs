// Copyright (c) 2025 - Cowboy AI, Inc.
//! Store configuration
//!
//! Defaults suit a local NATS server; every field can be overridden from the
//! environment:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `AGGREGATE_STORE_BACKEND` | `backend` (`memory` or `nats`) | `memory` |
//! | `NATS_URL` | `nats.servers` (comma separated) | `nats://localhost:4222` |
//! | `NATS_STREAM` | `jetstream.stream_name` | `AGGREGATE_EVENTS` |
//! | `NATS_SUBJECT_PREFIX` | `subject_prefix` | `events` |

use std::env;
use std::str::FromStr;

use crate::errors::ConfigError;
use crate::jetstream::JetStreamConfig;
use crate::nats::NatsConfig;

pub const BACKEND_VAR: &str = "AGGREGATE_STORE_BACKEND";
pub const NATS_URL_VAR: &str = "NATS_URL";
pub const NATS_STREAM_VAR: &str = "NATS_STREAM";
pub const SUBJECT_PREFIX_VAR: &str = "NATS_SUBJECT_PREFIX";

/// Which event store implementation to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    Nats,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Backend::Memory),
            "nats" | "jetstream" => Ok(Backend::Nats),
            _ => Err(ConfigError::InvalidValue {
                key: BACKEND_VAR.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Everything needed to open an event store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: Backend,
    pub nats: NatsConfig,
    pub jetstream: JetStreamConfig,
    /// Root of every subject this crate publishes on
    pub subject_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let subject_prefix = "events".to_string();
        Self {
            backend: Backend::Memory,
            nats: NatsConfig::default(),
            jetstream: JetStreamConfig::for_prefix("AGGREGATE_EVENTS", &subject_prefix),
            subject_prefix,
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup(BACKEND_VAR) {
            config.backend = backend.parse()?;
        }

        if let Some(urls) = lookup(NATS_URL_VAR) {
            let servers: Vec<String> = urls
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if servers.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: NATS_URL_VAR.to_string(),
                    value: urls,
                });
            }
            config.nats.servers = servers;
        }

        if let Some(prefix) = lookup(SUBJECT_PREFIX_VAR) {
            let prefix = prefix.trim().trim_end_matches('.').to_string();
            if prefix.is_empty() || prefix.contains(['*', '>', ' ']) {
                return Err(ConfigError::InvalidValue {
                    key: SUBJECT_PREFIX_VAR.to_string(),
                    value: prefix,
                });
            }
            config.jetstream.subjects = JetStreamConfig::for_prefix("", &prefix).subjects;
            config.subject_prefix = prefix;
        }

        if let Some(stream) = lookup(NATS_STREAM_VAR) {
            let stream = stream.trim().to_string();
            if stream.is_empty() || stream.contains(['.', '*', '>', ' ']) {
                return Err(ConfigError::InvalidValue {
                    key: NATS_STREAM_VAR.to_string(),
                    value: stream,
                });
            }
            config.jetstream.stream_name = stream;
        }

        Ok(config)
    }

    /// First configured server, used for single-URL connects
    pub fn nats_url(&self) -> &str {
        self.nats
            .servers
            .first()
            .map(String::as_str)
            .unwrap_or("nats://localhost:4222")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.subject_prefix, "events");
        assert_eq!(config.jetstream.subjects, vec!["events.aggregate.>"]);
        assert_eq!(config.nats_url(), "nats://localhost:4222");
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            (BACKEND_VAR, "NATS"),
            (NATS_URL_VAR, "nats://a:4222, nats://b:4222"),
            (NATS_STREAM_VAR, "ROSTERS"),
            (SUBJECT_PREFIX_VAR, "rosters."),
        ]))
        .unwrap();

        assert_eq!(config.backend, Backend::Nats);
        assert_eq!(config.nats.servers, vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.jetstream.stream_name, "ROSTERS");
        assert_eq!(config.subject_prefix, "rosters");
        assert_eq!(config.jetstream.subjects, vec!["rosters.aggregate.>"]);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(StoreConfig::from_lookup(lookup(&[(BACKEND_VAR, "postgres")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[(NATS_URL_VAR, " , ")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[(NATS_STREAM_VAR, "a.b")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[(SUBJECT_PREFIX_VAR, "events.>")])).is_err());
    }
}
