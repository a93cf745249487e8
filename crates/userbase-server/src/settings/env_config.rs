use std::env;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::config::ServerConfig;

pub(super) fn load_config(path: &str) -> ServerConfig {
    if !Path::new(path).exists() {
        return ServerConfig::default();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(event = "config_read_failed", path, error = %err);
            return ServerConfig::default();
        }
    };
    match serde_yaml::from_str(&contents) {
        Ok(config) => config,
        Err(err) => {
            warn!(event = "config_parse_failed", path, error = %err);
            ServerConfig::default()
        }
    }
}

pub(super) fn apply_server_env_overrides(config: &mut ServerConfig) {
    if let Ok(value) = env::var("USERBASE_REQUEST_TIMEOUT_MS") {
        match value.trim().parse::<u64>() {
            Ok(ms) if ms > 0 => config.server.request_timeout_ms = ms,
            _ => warn!(
                event = "config_invalid",
                field = "USERBASE_REQUEST_TIMEOUT_MS",
                value = %value
            ),
        }
    }
    if let Ok(value) = env::var("USERBASE_MAX_BODY_BYTES") {
        match value.trim().parse::<usize>() {
            Ok(bytes) if bytes > 0 => config.server.max_body_bytes = bytes,
            _ => warn!(
                event = "config_invalid",
                field = "USERBASE_MAX_BODY_BYTES",
                value = %value
            ),
        }
    }
}
