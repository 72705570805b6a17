use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

/// Default listening port for the server role.
pub const DEFAULT_PORT: u16 = 6000;

/// Default cap on the body length a peer may declare, in 8-byte words.
pub const DEFAULT_MAX_FRAME_WORDS: u64 = 8 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
    pub max_frame_words: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            ip: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_frame_words: DEFAULT_MAX_FRAME_WORDS,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
}

impl ServerConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<ServerConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;

        Ok(server_config)
    }
}
