//! `isoprep scan` – inventory of a staging tree.

use anyhow::Result;
use clap::Args;
use isoprep_core::config::IsoprepConfig;
use isoprep_core::scanner::LocalAssetScanner;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Staging root (default: config staging_dir or ./local_assets).
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Save a manifest of the scan.
    #[arg(long)]
    pub save_manifest: bool,

    /// Save the manifest here instead of <root>/manifest.json. Implies --save-manifest.
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Print declarations JSON that adopts the scanned assets.
    #[arg(long)]
    pub generate_config: bool,

    /// Leave checksums out of the generated declarations.
    #[arg(long)]
    pub no_checksums: bool,
}

pub fn run_scan(cfg: &IsoprepConfig, args: ScanArgs) -> Result<()> {
    let root = args.root.unwrap_or_else(|| cfg.staging_root());
    let scanner = LocalAssetScanner::new(&root);
    let scan = scanner.scan_all();

    print!("{}", scan.render_summary(&root));

    if args.save_manifest || args.manifest.is_some() {
        let path = args
            .manifest
            .unwrap_or_else(|| scanner.default_manifest_path());
        scanner.write_manifest(&scan, &path)?;
        println!("\nManifest saved to {}", path.display());
    }

    if args.generate_config {
        let decls = scanner.config_snippet(&scan, !args.no_checksums);
        println!("\nConfiguration snippet:");
        println!("{}", decls.to_json_pretty()?);
    }
    Ok(())
}
