use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    /// Model artifact, read once at startup.
    pub model_path: PathBuf,
    pub log_dir: String,
    pub predict_timeout_ms: Option<u64>,
    pub cors_allow_any_origin: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    listen_address: Option<String>,
    model_path: Option<PathBuf>,
    log_dir: Option<String>,
    predict_timeout_ms: Option<u64>,
    cors_allow_any_origin: Option<bool>,
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5000))
}

fn default_model_path() -> PathBuf {
    PathBuf::from("model_pipeline.json")
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: default_listen_address(),
            model_path: default_model_path(),
            log_dir: default_log_dir(),
            predict_timeout_ms: None,
            cors_allow_any_origin: true,
        }
    }
}

impl ServerConfig {
    /// File values first, environment variables on top, defaults for the rest.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };
        let env_config: PartialServerConfig = envy::from_env()?;

        merge(env_config, file_config)
    }

    pub fn predict_timeout(&self) -> Option<Duration> {
        self.predict_timeout_ms.map(Duration::from_millis)
    }
}

fn read_file(path: &Path) -> Result<PartialServerConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge(
    env_config: PartialServerConfig,
    file_config: PartialServerConfig,
) -> Result<ServerConfig, ConfigError> {
    let listen_address = match env_config.listen_address.or(file_config.listen_address) {
        Some(raw) => raw
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("listen_address '{raw}': {e}")))?,
        None => default_listen_address(),
    };

    let predict_timeout_ms = env_config
        .predict_timeout_ms
        .or(file_config.predict_timeout_ms);
    if predict_timeout_ms == Some(0) {
        return Err(ConfigError::Invalid(
            "predict_timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(ServerConfig {
        listen_address,
        model_path: env_config
            .model_path
            .or(file_config.model_path)
            .unwrap_or_else(default_model_path),
        log_dir: env_config
            .log_dir
            .or(file_config.log_dir)
            .unwrap_or_else(default_log_dir),
        predict_timeout_ms,
        cors_allow_any_origin: env_config
            .cors_allow_any_origin
            .or(file_config.cors_allow_any_origin)
            .unwrap_or(true),
    })
}
