//! Configuration management for Coffer Server

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::upload::MAX_BYTES_PER_FILE;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transcoder: TranscoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub content_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub max_bytes_per_file: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscoderConfig {
    pub program: String,
    pub sample_rate: u32,
    pub extension: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid bind address {0}")]
    BindAddr(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8730,
                static_dir: PathBuf::from("static"),
            },
            storage: StorageConfig {
                content_dir: PathBuf::from("uploads"),
                temp_dir: env::temp_dir(),
                max_bytes_per_file: MAX_BYTES_PER_FILE,
            },
            transcoder: TranscoderConfig {
                program: "ffmpeg".to_string(),
                sample_rate: 48000,
                extension: "ogg".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: env::var("COFFER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("COFFER_PORT", defaults.server.port)?,
                static_dir: env::var("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.server.static_dir),
            },
            storage: StorageConfig {
                content_dir: env::var("CONTENT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.content_dir),
                temp_dir: env::var("TEMP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.temp_dir),
                max_bytes_per_file: parse_var("MAX_BYTES_PER_FILE", defaults.storage.max_bytes_per_file)?,
            },
            transcoder: TranscoderConfig {
                program: env::var("TRANSCODER_BIN").unwrap_or(defaults.transcoder.program),
                sample_rate: parse_var("TRANSCODE_SAMPLE_RATE", defaults.transcoder.sample_rate)?,
                extension: env::var("CANONICAL_EXTENSION")
                    .map(|ext| ext.trim_start_matches('.').to_string())
                    .unwrap_or(defaults.transcoder.extension),
            },
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse().map_err(|_| ConfigError::BindAddr(addr))
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
