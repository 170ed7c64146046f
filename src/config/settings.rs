use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use teamscope_core::stream::PublisherConfig;
use teamscope_core::teams::StorePaths;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Live dashboard backend for agent teams")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding `teams/` and `tasks/` (defaults to ~/.claude)
    #[arg(long, global = true)]
    pub claude_dir: Option<PathBuf>,

    /// Address to bind the web server to
    #[arg(long)]
    pub host: Option<String>,

    /// Web server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Live channel polling interval in milliseconds
    #[arg(short = 'i', long)]
    pub poll_interval: Option<u64>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the REST API and live stream (default)
    Serve,
    /// Print one aggregation pass as JSON and exit
    Snapshot {
        /// Only print this team
        #[arg(short, long)]
        team: Option<String>,
    },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Subcommand to run, `serve` when none was given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Store root containing `teams/` and `tasks/`
    #[serde(default)]
    pub claude_dir: Option<PathBuf>,

    /// Web server settings
    #[serde(default)]
    pub web: WebSettings,

    /// Live channel settings
    #[serde(default)]
    pub stream: StreamSettings,
}

/// Web server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSettings {
    /// Bind address
    #[serde(default = "default_web_host")]
    pub host: String,

    /// Web server port
    #[serde(default = "default_web_port")]
    pub port: u16,
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    3000
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

/// Live channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Data poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Heartbeat interval in milliseconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,

    /// Events buffered per channel before the publisher waits on the client
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_poll_interval() -> u64 {
    3000
}

fn default_heartbeat_interval() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StreamSettings {
    /// Timer settings handed to each channel
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                return Self::read(p);
            }
            tracing::warn!("Config file {:?} not found, falling back to defaults", p);
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("teamscope/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/teamscope/config.toml")),
            dirs::home_dir().map(|p| p.join(".teamscope.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::read(path);
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    fn read(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(dir) = &cli.claude_dir {
            self.claude_dir = Some(dir.clone());
        }
        if let Some(host) = &cli.host {
            self.web.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.web.port = port;
        }
        if let Some(poll_interval) = cli.poll_interval {
            self.stream.poll_interval_ms = poll_interval;
        }
    }

    /// Validate and normalize settings values
    ///
    /// Ensures intervals have a minimum value to prevent busy-polling the store.
    pub fn validate(&mut self) {
        const MIN_POLL_INTERVAL: u64 = 100;
        const MIN_HEARTBEAT_INTERVAL: u64 = 1000;

        if self.stream.poll_interval_ms < MIN_POLL_INTERVAL {
            self.stream.poll_interval_ms = MIN_POLL_INTERVAL;
        }
        if self.stream.heartbeat_interval_ms < MIN_HEARTBEAT_INTERVAL {
            self.stream.heartbeat_interval_ms = MIN_HEARTBEAT_INTERVAL;
        }
        if self.stream.channel_capacity == 0 {
            self.stream.channel_capacity = 1;
        }
    }

    /// Store layout these settings point at
    pub fn store_paths(&self) -> StorePaths {
        StorePaths::resolve(self.claude_dir.as_deref())
    }
}
