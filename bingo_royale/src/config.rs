//! Network and preference configuration.
//!
//! Consolidates all environment variable reads. Both the caller and the
//! player binaries start from these values and apply their CLI overrides on
//! top.

use std::{
    net::{IpAddr, Ipv4Addr},
    str::FromStr,
    time::Duration,
};

use crate::game::mode::GameMode;

/// Default TCP port of the game channel.
pub const DEFAULT_GAME_PORT: u16 = 8888;

/// Default UDP port of the discovery responder.
pub const DEFAULT_DISCOVERY_PORT: u16 = 8889;

/// Default name a caller advertises.
pub const DEFAULT_SERVER_NAME: &str = "BingoRoyale";

/// Sockets, addresses and timeouts shared by the caller and the players.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NetworkConfig {
    /// Address the caller binds both sockets to
    pub bind_ip: IpAddr,
    /// TCP game port; 0 picks an ephemeral port
    pub game_port: u16,
    /// UDP discovery port; 0 picks an ephemeral port
    pub discovery_port: u16,
    /// Where players send discovery requests
    pub broadcast_addr: IpAddr,
    /// How long a player collects discovery responses
    pub discovery_timeout: Duration,
    /// Upper bound on a TCP connect
    pub connect_timeout: Duration,
    /// How long a player shows an error before reverting to disconnected
    pub error_revert_delay: Duration,
    /// How long the caller waits for goodbye messages to flush on stop
    pub shutdown_grace: Duration,
    /// A player that takes longer than this to accept one record is dropped
    pub write_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            game_port: DEFAULT_GAME_PORT,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            discovery_timeout: Duration::from_millis(3000),
            connect_timeout: Duration::from_millis(5000),
            error_revert_delay: Duration::from_millis(2000),
            shutdown_grace: Duration::from_millis(500),
            write_timeout: Duration::from_millis(5000),
        }
    }
}

impl NetworkConfig {
    /// Loopback-only settings on ephemeral ports with short timeouts.
    ///
    /// Players built from this config still need the caller's actual ports.
    pub fn loopback() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            game_port: 0,
            discovery_port: 0,
            broadcast_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            discovery_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(1000),
            error_revert_delay: Duration::from_millis(200),
            shutdown_grace: Duration::from_millis(200),
            write_timeout: Duration::from_millis(1000),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Unset or unparseable variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration fails [`Self::validate`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bind_ip: parse_env_or("BINGO_BIND_IP", defaults.bind_ip),
            game_port: parse_env_or("BINGO_GAME_PORT", defaults.game_port),
            discovery_port: parse_env_or("BINGO_DISCOVERY_PORT", defaults.discovery_port),
            broadcast_addr: parse_env_or("BINGO_BROADCAST_ADDR", defaults.broadcast_addr),
            discovery_timeout: parse_millis_or(
                "BINGO_DISCOVERY_TIMEOUT_MS",
                defaults.discovery_timeout,
            ),
            connect_timeout: parse_millis_or("BINGO_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            error_revert_delay: parse_millis_or(
                "BINGO_ERROR_DELAY_MS",
                defaults.error_revert_delay,
            ),
            shutdown_grace: defaults.shutdown_grace,
            write_timeout: defaults.write_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// Returns error if both ports collide or a timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game_port != 0 && self.game_port == self.discovery_port {
            return Err(ConfigError::Invalid {
                var: "BINGO_DISCOVERY_PORT".to_string(),
                reason: format!("Must differ from the game port ({})", self.game_port),
            });
        }

        if self.discovery_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BINGO_DISCOVERY_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "BINGO_CONNECT_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// User preferences, read once at startup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Preferences {
    pub sound: bool,
    pub vibration: bool,
    /// Mark received balls on the card automatically
    pub auto_mark: bool,
    /// Name sent with win claims; binaries fall back to the OS user
    pub player_name: Option<String>,
    pub default_mode: GameMode,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound: true,
            vibration: true,
            auto_mark: false,
            player_name: None,
            default_mode: GameMode::default(),
        }
    }
}

impl Preferences {
    /// Load preferences from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if `BINGO_DEFAULT_MODE` is set to anything but 75 or 90
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_mode = match std::env::var("BINGO_DEFAULT_MODE") {
            Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "BINGO_DEFAULT_MODE".to_string(),
                reason: format!("'{value}' is not 75 or 90"),
            })?,
            Err(_) => defaults.default_mode,
        };

        let player_name = std::env::var("BINGO_PLAYER_NAME")
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(Self {
            sound: parse_env_or("BINGO_SOUND", defaults.sound),
            vibration: parse_env_or("BINGO_VIBRATION", defaults.vibration),
            auto_mark: parse_env_or("BINGO_AUTO_MARK", defaults.auto_mark),
            player_name,
            default_mode,
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_millis_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map_or(default, Duration::from_millis)
}
