//! CLI for isoprep.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use isoprep_core::checksum::HashAlgorithm;
use isoprep_core::config::{self, IsoprepConfig};
use std::path::{Path, PathBuf};

use commands::{
    run_checksum, run_completions, run_probe, run_purge, run_resolve, run_scan, run_verify,
    ResolveArgs, ScanArgs, ShellType,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "isoprep")]
#[command(about = "isoprep: fetch, verify and cache the assets of an installer image build", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/isoprep/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Mirror log output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Resolve every declared asset into the cache and report the local paths.
    Resolve(ResolveArgs),

    /// Scan a staging tree, print a summary, optionally save a manifest or config snippet.
    Scan(ScanArgs),

    /// Re-hash a staging tree and compare it with its manifest.
    Verify {
        /// Staging root (default: config staging_dir or ./local_assets).
        #[arg(long)]
        root: Option<PathBuf>,
        /// Manifest to check against (default: <root>/manifest.json).
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// Print the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// sha256 or md5.
        #[arg(long, default_value = "sha256")]
        algorithm: HashAlgorithm,
    },

    /// Send a HEAD request and print what the server reports.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,
    },

    /// Delete cached files older than the configured (or given) age.
    Purge {
        /// Age threshold in days (default: cache_max_age_days from config).
        #[arg(long, value_name = "N")]
        days: Option<u64>,
        /// Cache root (default: config cache_dir or $XDG_CACHE_HOME/isoprep).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: ShellType,
    },
}

fn load_config(path: Option<&Path>) -> Result<IsoprepConfig> {
    let cfg = match path {
        Some(p) => config::load_from(p).with_context(|| format!("loading {}", p.display()))?,
        None => config::load_or_init().context("loading config")?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            CliCommand::Resolve(args) => run_resolve(&load_config(config_path)?, args)?,
            CliCommand::Scan(args) => run_scan(&load_config(config_path)?, args)?,
            CliCommand::Verify { root, manifest } => {
                let cfg = load_config(config_path)?;
                let root = root.unwrap_or_else(|| cfg.staging_root());
                run_verify(&root, manifest.as_deref())?;
            }
            CliCommand::Checksum { path, algorithm } => run_checksum(&path, algorithm)?,
            CliCommand::Probe { url } => run_probe(&url)?,
            CliCommand::Purge { days, cache_dir } => {
                let cfg = load_config(config_path)?;
                let root = match cache_dir {
                    Some(d) => d,
                    None => cfg.cache_root()?,
                };
                run_purge(&root, days.unwrap_or(cfg.cache_max_age_days))?;
            }
            CliCommand::Completions { shell } => run_completions(shell)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
