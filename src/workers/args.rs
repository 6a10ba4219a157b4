//! Command-line argument parsing and configuration.
//!
//! Supports:
//! - CLI arguments via clap
//! - TOML configuration file (`--config`, `./skiff.toml`, or
//!   `~/.config/skiff/skiff.toml`, first hit wins)
//! - Merging CLI with file config (CLI takes precedence)

use crate::core::config::PerformanceConfig;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Skiff - dual-pane SFTP transfer client.
#[derive(Parser, Deserialize, Clone, Debug)]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Args {
    /// SSH host to connect to.
    #[clap(long)]
    pub host: Option<String>,

    /// SSH port.
    #[clap(short, long, default_value_t = 22)]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username for password authentication.
    #[clap(short, long)]
    pub user: Option<String>,

    /// Password for authentication. Prefer the config file over the
    /// command line, which leaks into shell history.
    #[clap(long)]
    pub password: Option<String>,

    /// Starting directory for the local pane. Defaults to the working
    /// directory.
    #[clap(long)]
    pub local_root: Option<PathBuf>,

    /// Starting directory for the remote pane. Defaults to the server
    /// home directory.
    #[clap(long)]
    pub remote_root: Option<String>,

    /// Verbosity level (-v, -vv, -vvv).
    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    #[serde(default)]
    pub verbose: u8,

    /// Explicit config file path, overriding the default candidates.
    #[clap(long)]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Directory for persistent data (logs). Defaults to ~/.skiff/
    #[clap(long)]
    pub conf: Option<PathBuf>,

    /// Transfer tuning, only settable through the `[performance]` table
    /// of the config file.
    #[clap(skip)]
    #[serde(default)]
    pub performance: PerformanceConfig,
}

fn default_port() -> u16 {
    22
}

impl Args {
    /// Load Args from CLI + TOML file (if one exists).
    /// CLI values override those from the file.
    pub fn load() -> Self {
        let mut cli_args = Args::parse();

        // Resolve relative paths to absolute before any working directory change
        cli_args.conf = cli_args.conf.map(Self::resolve_path);
        cli_args.config = cli_args.config.map(Self::resolve_path);

        for candidate in Self::config_candidates(cli_args.config.as_deref()) {
            if let Some(file_args) = Self::from_file(&candidate) {
                return Self::merge(file_args, cli_args);
            }
        }

        cli_args
    }

    /// Config file search order: explicit path, working directory, then
    /// the user config directory.
    fn config_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }
        let mut candidates = vec![PathBuf::from("skiff.toml")];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("skiff").join("skiff.toml"));
        }
        candidates
    }

    /// Resolve a potentially relative path to an absolute one.
    fn resolve_path(p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            p
        } else {
            std::env::current_dir().unwrap_or_default().join(p)
        }
    }

    /// Load args from a TOML file.
    fn from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = fs::read_to_string(path).ok()?;
        toml::from_str::<Args>(&content).ok()
    }

    /// Merge file args with CLI args (CLI takes precedence).
    fn merge(mut file: Args, cli: Args) -> Args {
        if cli.host.is_some() {
            file.host = cli.host;
        }
        if cli.port != 22 {
            file.port = cli.port;
        }
        if cli.user.is_some() {
            file.user = cli.user;
        }
        if cli.password.is_some() {
            file.password = cli.password;
        }
        if cli.local_root.is_some() {
            file.local_root = cli.local_root;
        }
        if cli.remote_root.is_some() {
            file.remote_root = cli.remote_root;
        }
        if cli.verbose > 0 {
            file.verbose = cli.verbose;
        }
        if cli.conf.is_some() {
            file.conf = cli.conf;
        }
        file.config = cli.config;
        file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_toml(content: &str) -> Args {
        toml::from_str::<Args>(content).unwrap()
    }

    #[test]
    fn config_file_parses_performance_table() {
        let args = parse_toml(
            r#"
            host = "files.example.net"
            user = "deploy"

            [performance]
            max_packet_kb = 512
            parallel_streams = 8
            "#,
        );
        assert_eq!(args.host.as_deref(), Some("files.example.net"));
        assert_eq!(args.port, 22);
        assert_eq!(args.performance.max_packet_bytes(), 512 * 1024);
        assert_eq!(args.performance.parallel_streams(), 8);
        // Untouched fields keep their defaults.
        assert_eq!(args.performance.concurrent_requests(), 128);
    }

    #[test]
    fn cli_values_override_file_values() {
        let file = parse_toml(
            r#"
            host = "old.example.net"
            port = 2022
            user = "alice"
            "#,
        );
        let cli = Args {
            host: Some("new.example.net".to_string()),
            port: 22,
            user: None,
            password: None,
            local_root: None,
            remote_root: None,
            verbose: 2,
            config: None,
            conf: None,
            performance: PerformanceConfig::default(),
        };
        let merged = Args::merge(file, cli);
        assert_eq!(merged.host.as_deref(), Some("new.example.net"));
        // Default CLI port means the file value wins.
        assert_eq!(merged.port, 2022);
        assert_eq!(merged.user.as_deref(), Some("alice"));
        assert_eq!(merged.verbose, 2);
    }
}
