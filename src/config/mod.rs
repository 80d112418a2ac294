use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::check::fetch::{
    FetchConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT,
    DEFAULT_USER_AGENT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,
    pub fetch_timeout: Duration,
    pub fetch_max_redirects: usize,
    pub fetch_max_body_bytes: usize,
    pub fetch_user_agent: String,
    pub trust_proxy: bool,
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: parse_var("SERVER_PORT", 8080)?,
            is_dev: env::var("APP_ENV").as_deref() != Ok("production"),
            fetch_timeout: Duration::from_secs(parse_var(
                "FETCH_TIMEOUT_SECS",
                DEFAULT_TIMEOUT.as_secs(),
            )?),
            fetch_max_redirects: parse_var("FETCH_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS)?,
            fetch_max_body_bytes: parse_var("FETCH_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            fetch_user_agent: env::var("FETCH_USER_AGENT")
                .ok()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            trust_proxy: parse_var("TRUST_PROXY", false)?,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: self.fetch_timeout,
            max_redirects: self.fetch_max_redirects,
            max_body_bytes: self.fetch_max_body_bytes,
            user_agent: self.fetch_user_agent.clone(),
            block_private_addresses: true,
        }
    }
}
