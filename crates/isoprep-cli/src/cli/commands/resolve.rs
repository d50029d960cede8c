//! `isoprep resolve <declarations.json>` – obtain and verify every declared asset.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use isoprep_core::build_config::AssetDeclarations;
use isoprep_core::config::IsoprepConfig;
use isoprep_core::{AssetCache, AssetResolver, ResolveMode, RetryingFetcher};
use std::path::PathBuf;

/// Which source kind to use; `auto` picks local paths, then staging, then remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    #[default]
    Auto,
    Local,
    Staged,
    Remote,
}

impl ModeArg {
    pub fn to_mode(self) -> Option<ResolveMode> {
        match self {
            ModeArg::Auto => None,
            ModeArg::Local => Some(ResolveMode::LocalPaths),
            ModeArg::Staged => Some(ResolveMode::Staged),
            ModeArg::Remote => Some(ResolveMode::Remote),
        }
    }
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Build configuration JSON holding the asset declarations.
    pub declarations: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Re-obtain assets even if a verified cached copy exists.
    #[arg(long)]
    pub force: bool,

    /// Write the name → path mapping as JSON to this file.
    #[arg(long, value_name = "PATH")]
    pub handoff: Option<PathBuf>,

    /// Cache root (default: config cache_dir or $XDG_CACHE_HOME/isoprep).
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Staging root (default: config staging_dir or ./local_assets).
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,
}

pub fn run_resolve(cfg: &IsoprepConfig, args: ResolveArgs) -> Result<()> {
    let decls = AssetDeclarations::load(&args.declarations)?;
    let cache_root = match args.cache_dir {
        Some(d) => d,
        None => cfg.cache_root()?,
    };
    let staging_root = args.staging_dir.unwrap_or_else(|| cfg.staging_root());

    let cache = AssetCache::new(&cache_root, RetryingFetcher::new(cfg.fetch_options()))
        .with_options(cfg.cache_options());
    let mut resolver = AssetResolver::new(cache, staging_root).with_force(args.force);

    let resolved = resolver
        .resolve(&decls, args.mode.to_mode())
        .context("resolving assets")?;

    println!(
        "Resolved {} asset(s) in {} mode (cache: {})",
        resolved.assets.len(),
        resolved.mode,
        cache_root.display()
    );
    println!("{:<24} {:<8} {:<10} {}", "NAME", "KIND", "SOURCE", "PATH");
    for (name, asset) in &resolved.assets {
        println!(
            "{:<24} {:<8} {:<10} {}",
            name,
            asset.kind.to_string(),
            format!("{:?}", asset.provenance).to_lowercase(),
            asset.local_path.display()
        );
    }

    if let Some(path) = &args.handoff {
        resolved.write_handoff(path)?;
        println!("Handoff written to {}", path.display());
    }
    Ok(())
}
