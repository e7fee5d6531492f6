//! Command-line flags. Every flag overrides the config file and the
//! environment.

use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "matchroom-server", version, about = "Room-code match lobby server")]
pub struct Cli {
    /// TOML configuration file. Defaults are used when it does not exist.
    #[arg(short, long, value_name = "FILE", default_value = "matchroom.toml")]
    pub config: PathBuf,

    /// Address to listen on, e.g. 0.0.0.0:7777
    #[arg(short, long, value_name = "ADDRESS")]
    pub bind: Option<String>,

    /// Capacity of each new match, owner included.
    #[arg(short = 'm', long, value_name = "N")]
    pub max_players: Option<usize>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Writes the flags that were given into `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind_address = bind.clone();
        }
        if let Some(max_players) = self.max_players {
            config.lobby.max_players = max_players;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}
