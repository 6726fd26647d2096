//! Command-line flags and environment overrides
//!
//! Flags are parsed with clap; environment variables take precedence
//! over flags, matching the deployment convention the agent and
//! collector are shipped with (`ADDRESS`, `STORE_INTERVAL`, ...).

use std::path::PathBuf;

use clap::Parser;

/// Collector (server) configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "collector-server", about = "Central metrics collector")]
pub struct ServerConfig {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    pub address: String,

    /// Snapshot interval in seconds (0 = save synchronously after
    /// every update)
    #[arg(short = 'i', long, default_value_t = 300)]
    pub store_interval: u64,

    /// Snapshot file path (enables the file-snapshot backend)
    #[arg(short, long)]
    pub file_storage_path: Option<PathBuf>,

    /// Restore metrics from the snapshot file on startup
    #[arg(short, long, default_value_t = true, action = clap::ArgAction::Set)]
    pub restore: bool,

    /// Database DSN (enables the SQL backend, takes precedence over
    /// the snapshot file)
    #[arg(short, long)]
    pub database_dsn: Option<String>,
}

impl ServerConfig {
    /// Parse flags and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::parse();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ADDRESS") {
            self.address = v;
        }
        if let Some(v) = lookup("STORE_INTERVAL")
            && let Ok(interval) = v.parse()
        {
            self.store_interval = interval;
        }
        if let Some(v) = lookup("FILE_STORAGE_PATH") {
            self.file_storage_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("RESTORE")
            && let Ok(restore) = v.parse()
        {
            self.restore = restore;
        }
        if let Some(v) = lookup("DATABASE_DSN") {
            self.database_dsn = Some(v);
        }
    }
}

/// Reporting agent configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "collector-agent", about = "Host telemetry reporting agent")]
pub struct AgentConfig {
    /// Collector address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    pub address: String,

    /// Poll interval in seconds
    #[arg(short, long, default_value_t = 2)]
    pub poll_interval: u64,

    /// Report interval in seconds
    #[arg(short, long, default_value_t = 10)]
    pub report_interval: u64,
}

impl AgentConfig {
    /// Parse flags and apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::parse();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ADDRESS") {
            self.address = v;
        }
        if let Some(v) = lookup("POLL_INTERVAL")
            && let Ok(interval) = v.parse()
        {
            self.poll_interval = interval;
        }
        if let Some(v) = lookup("REPORT_INTERVAL")
            && let Ok(interval) = v.parse()
        {
            self.report_interval = interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_flags_parse() {
        let config = ServerConfig::parse_from([
            "collector-server",
            "-a",
            "0.0.0.0:9090",
            "-i",
            "0",
            "-f",
            "/tmp/snap.json",
            "-r",
            "false",
        ]);

        assert_eq!(config.address, "0.0.0.0:9090");
        assert_eq!(config.store_interval, 0);
        assert_eq!(config.file_storage_path, Some(PathBuf::from("/tmp/snap.json")));
        assert!(!config.restore);
        assert!(config.database_dsn.is_none());
    }

    #[test]
    fn env_overrides_flags() {
        let mut config = ServerConfig::parse_from(["collector-server", "-a", "flag:1111"]);

        config.apply_env(|key| match key {
            "ADDRESS" => Some("env:2222".to_string()),
            "STORE_INTERVAL" => Some("42".to_string()),
            "RESTORE" => Some("false".to_string()),
            _ => None,
        });

        assert_eq!(config.address, "env:2222");
        assert_eq!(config.store_interval, 42);
        assert!(!config.restore);
    }

    #[test]
    fn malformed_env_values_are_ignored() {
        let mut config = ServerConfig::parse_from(["collector-server"]);

        config.apply_env(|key| match key {
            "STORE_INTERVAL" => Some("soon".to_string()),
            "RESTORE" => Some("maybe".to_string()),
            _ => None,
        });

        assert_eq!(config.store_interval, 300);
        assert!(config.restore);
    }

    #[test]
    fn agent_env_overrides() {
        let mut config = AgentConfig::parse_from(["collector-agent", "-p", "5"]);

        config.apply_env(|key| match key {
            "REPORT_INTERVAL" => Some("30".to_string()),
            _ => None,
        });

        assert_eq!(config.poll_interval, 5);
        assert_eq!(config.report_interval, 30);
    }
}
