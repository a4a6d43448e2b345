//! Caller configuration management.
//!
//! Merges command-line overrides with the `BINGO_*` environment and
//! validates the result.

use bingo_royale::{
    GameMode,
    config::{ConfigError, DEFAULT_SERVER_NAME, NetworkConfig, Preferences},
};

/// Values given on the command line; each one beats the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub name: Option<String>,
    pub mode: Option<GameMode>,
    pub game_port: Option<u16>,
    pub discovery_port: Option<u16>,
}

/// Complete caller configuration
#[derive(Debug, Clone)]
pub struct CallerConfig {
    /// Name announced to players during discovery
    pub name: String,
    /// Mode of the first game
    pub mode: GameMode,
    pub network: NetworkConfig,
}

impl CallerConfig {
    /// Load configuration from environment variables, then apply `overrides`
    ///
    /// # Errors
    ///
    /// Returns error if a variable is invalid or the merged ports collide
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let network = NetworkConfig::from_env()?;
        let env_name = std::env::var("BINGO_SERVER_NAME").ok();
        let env_mode = Preferences::from_env()?.default_mode;
        Self::merge(network, env_name, env_mode, overrides)
    }

    fn merge(
        mut network: NetworkConfig,
        env_name: Option<String>,
        env_mode: GameMode,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        if let Some(port) = overrides.game_port {
            network.game_port = port;
        }
        if let Some(port) = overrides.discovery_port {
            network.discovery_port = port;
        }
        network.validate()?;

        let name = overrides
            .name
            .or(env_name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        Ok(Self {
            name,
            mode: overrides.mode.unwrap_or(env_mode),
            network,
        })
    }
}
