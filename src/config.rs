//! Process-wide configuration: loaded once at startup, then treated as
//! immutable for the life of the process (spec §6 configuration table).
//!
//! Resolution order, lowest to highest precedence: built-in defaults,
//! environment variables, CLI flags.

use std::time::Duration;

use clap::Parser;

use crate::codec::CompressionMode;
use crate::error::RelayError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOKEN: &str = "secret";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_STATS_INTERVAL_SECS: u64 = 60;

/// Command-line flags, highest-precedence override of [`Config`].
#[derive(Debug, Parser)]
#[command(name = "ptyrelay", about = "PTY-over-WebSocket terminal sharing relay")]
pub struct CliArgs {
    /// HTTP listen port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Shared auth token for /runner and /ws.
    #[arg(long)]
    pub token: Option<String>,

    /// Binary codec: none, zstd, smaz, deflate.
    #[arg(long)]
    pub compression: Option<String>,

    /// Idle cleanup delay after a runner exits, in seconds.
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Periodic stats log cadence, in seconds.
    #[arg(long)]
    pub stats_interval_secs: Option<u64>,
}

/// Process-wide relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub token: String,
    pub compression: CompressionMode,
    pub session_ttl: Duration,
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            token: DEFAULT_TOKEN.to_string(),
            compression: CompressionMode::Deflate,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            stats_interval: Duration::from_secs(DEFAULT_STATS_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Build a config from defaults, environment variables, then `cli`
    /// (highest precedence). Returns a `Fatal`-class error (spec §7) on any
    /// invalid value so the caller can exit non-zero before binding a
    /// listener.
    pub fn load(cli: CliArgs) -> Result<Self, RelayError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.apply_cli_overrides(cli)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), RelayError> {
        if let Ok(port) = std::env::var("RELAY_PORT") {
            self.port = port
                .parse()
                .map_err(|_| RelayError::InvalidConfig(format!("RELAY_PORT {port:?} is not a valid port")))?;
        }
        if let Ok(token) = std::env::var("RELAY_TOKEN") {
            self.token = token;
        }
        if let Ok(mode) = std::env::var("RELAY_COMPRESSION") {
            self.compression = mode.parse()?;
        }
        if let Ok(secs) = std::env::var("RELAY_SESSION_TTL_SECS") {
            self.session_ttl = Duration::from_secs(
                secs.parse()
                    .map_err(|_| RelayError::InvalidConfig(format!("RELAY_SESSION_TTL_SECS {secs:?} is not a number")))?,
            );
        }
        if let Ok(secs) = std::env::var("RELAY_STATS_INTERVAL_SECS") {
            self.stats_interval = Duration::from_secs(
                secs.parse()
                    .map_err(|_| RelayError::InvalidConfig(format!("RELAY_STATS_INTERVAL_SECS {secs:?} is not a number")))?,
            );
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli: CliArgs) -> Result<(), RelayError> {
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(token) = cli.token {
            self.token = token;
        }
        if let Some(mode) = cli.compression {
            self.compression = mode.parse()?;
        }
        if let Some(secs) = cli.session_ttl_secs {
            self.session_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = cli.stats_interval_secs {
            self.stats_interval = Duration::from_secs(secs);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.port == 0 {
            return Err(RelayError::InvalidConfig("port must be between 1 and 65535".into()));
        }
        if self.token.is_empty() {
            return Err(RelayError::InvalidConfig("token must not be empty".into()));
        }
        Ok(())
    }
}
