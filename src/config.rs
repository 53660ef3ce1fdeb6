//! Process-wide configuration: CLI flags with environment-variable fallback.

use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_root: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_ttl_min: i64,
    pub refresh_ttl_hour: i64,
}

impl Config {
    pub fn from_args_and_env(matches: &clap::ArgMatches) -> Result<Config> {
        let storage_root = matches
            .value_of("storage-dir")
            .map(String::from)
            .or_else(|| std::env::var("STORAGE_DIR").ok())
            .unwrap_or_else(|| "./data".to_string());

        let bind_addr = matches
            .value_of("bind-addr")
            .map(String::from)
            .or_else(|| std::env::var("BIND_ADDR").ok())
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = matches
            .value_of("port")
            .map(String::from)
            .or_else(|| std::env::var("PORT").ok())
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid u16")?;

        let jwt_secret = matches
            .value_of("jwt-secret")
            .map(String::from)
            .or_else(|| std::env::var("JWT_SECRET").ok())
            .context("JWT_SECRET must be set via --jwt-secret or the environment")?;

        let access_ttl_min = matches
            .value_of("access-ttl-min")
            .map(String::from)
            .or_else(|| std::env::var("ACCESS_TOKEN_EXPIRY_MIN").ok())
            .unwrap_or_else(|| "15".to_string())
            .parse::<i64>()
            .context("ACCESS_TOKEN_EXPIRY_MIN must be an integer")?;

        let refresh_ttl_hour = matches
            .value_of("refresh-ttl-hour")
            .map(String::from)
            .or_else(|| std::env::var("REFRESH_TOKEN_EXPIRY_HOUR").ok())
            .unwrap_or_else(|| "24".to_string())
            .parse::<i64>()
            .context("REFRESH_TOKEN_EXPIRY_HOUR must be an integer")?;

        Ok(Config {
            storage_root: PathBuf::from(storage_root),
            bind_addr,
            port,
            jwt_secret,
            access_ttl_min,
            refresh_ttl_hour,
        })
    }
}
