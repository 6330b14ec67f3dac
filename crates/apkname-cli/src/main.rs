//! apkname - Rename Android packages after their identity and packer
//!
//! This tool reads the package name, version and display name of APK files
//! and copies each one to `<packer>_<app>_<package>_<version>.apk`.

use anyhow::{bail, Context, Result};
use apkname_core::{
    open_archive, MemoryArchive, MetadataResolver, PackageMetadata, PackerLabel, RenameOptions,
    RenameOutcome, Renamer, ResolverConfig,
};
use clap::{Args, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Extension of a per-archive findings sidecar file
const FINDINGS_EXTENSION: &str = "findings";

/// Rename Android packages after their identity and detected packer
#[derive(Parser, Debug)]
#[command(name = "apkname")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    input: InputMode,

    /// Packer findings for the archive, one per line (`<descriptor> <vendor> -> <location>`)
    #[arg(long, conflicts_with = "directory")]
    findings: Option<PathBuf>,

    /// Copy each archive to its canonical name
    #[arg(long)]
    rename: bool,

    /// Delete the original after a successful rename
    #[arg(long, requires = "rename")]
    delete_original: bool,

    /// Badging tool used when the manifest yields no package name
    #[arg(long, env = "APKNAME_AAPT", default_value = "aapt")]
    aapt: PathBuf,

    /// Never run the badging tool
    #[arg(long)]
    no_aapt: bool,

    /// Dry run - print the new names without copying anything
    #[arg(long)]
    dry_run: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single APK
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of APKs to process recursively
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Counts reported after a run
#[derive(Default)]
struct RunStats {
    processed: usize,
    renamed: usize,
    failed: usize,
}

impl RunStats {
    fn print_summary(&self) {
        info!(
            "Summary: {} processed, {} renamed, {} failed",
            self.processed, self.renamed, self.failed
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .init();

    let resolver = build_resolver(&cli);
    let renamer = Renamer::new(
        RenameOptions::new()
            .rename(cli.rename)
            .delete_original(cli.delete_original),
    );

    if let Some(ref file) = cli.input.file {
        process_single_file(&cli, &resolver, &renamer, file)
    } else if let Some(ref directory) = cli.input.directory {
        process_directory(&cli, &resolver, &renamer, directory)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

fn build_resolver(cli: &Cli) -> MetadataResolver {
    let config = if cli.no_aapt {
        ResolverConfig::new().without_badging_tool()
    } else {
        ResolverConfig::new().badging_tool(&cli.aapt)
    };
    MetadataResolver::with_config(config)
}

/// Process a single APK
fn process_single_file(
    cli: &Cli,
    resolver: &MetadataResolver,
    renamer: &Renamer,
    file: &Path,
) -> Result<()> {
    if !file.exists() {
        bail!("Input file does not exist: {}", file.display());
    }
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }

    let findings = match &cli.findings {
        Some(path) => read_findings(path)?,
        None => Vec::new(),
    };

    process_apk(cli, resolver, renamer, file, &findings)
}

/// Process every APK below a directory
fn process_directory(
    cli: &Cli,
    resolver: &MetadataResolver,
    renamer: &Renamer,
    directory: &Path,
) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    // Collect first so renamed copies are not picked up by the walk
    let apks: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.is_file() && !is_hidden(path) && is_apk(path))
        .collect();

    let mut stats = RunStats::default();

    for apk in &apks {
        let findings = match sidecar_findings(apk) {
            Ok(findings) => findings,
            Err(e) => {
                warn!("{:#}", e);
                Vec::new()
            }
        };

        debug!("Processing APK: {}", apk.display());
        stats.processed += 1;
        match process_apk(cli, resolver, renamer, apk, &findings) {
            Ok(()) => {
                if cli.rename && !cli.dry_run {
                    stats.renamed += 1;
                }
            }
            Err(e) => {
                // Log error but continue with other files
                warn!("Error processing {}: {:#}", apk.display(), e);
                stats.failed += 1;
            }
        }
    }

    stats.print_summary();
    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn is_apk(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("apk"))
        .unwrap_or(false)
}

/// Findings file next to an archive: `app.apk` -> `app.apk.findings`
fn sidecar_path(apk: &Path) -> PathBuf {
    let mut name = apk.as_os_str().to_owned();
    name.push(".");
    name.push(FINDINGS_EXTENSION);
    PathBuf::from(name)
}

fn sidecar_findings(apk: &Path) -> Result<Vec<String>> {
    let path = sidecar_path(apk);
    if !path.is_file() {
        trace!("No findings file for {}", apk.display());
        return Ok(Vec::new());
    }
    read_findings(&path)
}

/// Read one finding per non-blank line
fn read_findings(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read findings file: {}", path.display()))?;
    Ok(parse_findings(&content))
}

fn parse_findings(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve, report and optionally rename one APK
fn process_apk(
    cli: &Cli,
    resolver: &MetadataResolver,
    renamer: &Renamer,
    path: &Path,
    findings: &[String],
) -> Result<()> {
    let meta = resolve_metadata(resolver, path);
    let label = PackerLabel::from_findings(findings);

    println!("{}", meta);
    println!("Packer:       {}", label);

    if cli.dry_run {
        let planned = renamer
            .plan(&meta, &label)
            .with_context(|| format!("Failed to plan new name for {}", path.display()))?;
        println!("Would rename: {}", planned.display());
        return Ok(());
    }

    match renamer.rename(&meta, &label) {
        Ok(RenameOutcome::Skipped) => {
            trace!("Rename not requested for {}", path.display());
        }
        Ok(RenameOutcome::Renamed {
            to,
            original_deleted,
            ..
        }) => {
            println!("Renamed to:   {}", to.display());
            if original_deleted {
                println!("Deleted original {}", path.display());
            }
        }
        Err(e) if e.is_partial() => {
            bail!("Rename completed but the original was kept: {}", e);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to rename {}", path.display()));
        }
    }

    Ok(())
}

/// Open the archive if possible; without it only the badging fallback runs
fn resolve_metadata(resolver: &MetadataResolver, path: &Path) -> PackageMetadata {
    match open_archive(path) {
        Ok(mut archive) => resolver.resolve(path, Some(&mut archive)),
        Err(e) => {
            warn!("{}", e);
            resolver.resolve(path, None::<&mut MemoryArchive>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/apks/app.apk")),
            PathBuf::from("/apks/app.apk.findings")
        );
    }

    #[test]
    fn test_parse_findings_skips_blank_lines() {
        let content = "    Sopath  VendorX -> assets/libx.so\n\n   \n    Class  VendorY -> com/y/Stub\n";
        assert_eq!(
            parse_findings(content),
            vec![
                "    Sopath  VendorX -> assets/libx.so",
                "    Class  VendorY -> com/y/Stub",
            ]
        );
    }

    #[test]
    fn test_sidecar_findings() {
        let temp_dir = TempDir::new().unwrap();
        let apk = temp_dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();

        assert!(sidecar_findings(&apk).unwrap().is_empty());

        fs::write(sidecar_path(&apk), "    Sopath  VendorX -> assets/libx.so\n").unwrap();
        let findings = sidecar_findings(&apk).unwrap();
        assert_eq!(PackerLabel::from_findings(&findings).to_string(), "VendorX");
    }

    #[test]
    fn test_is_apk() {
        assert!(is_apk(Path::new("/tmp/app.apk")));
        assert!(is_apk(Path::new("/tmp/APP.APK")));
        assert!(!is_apk(Path::new("/tmp/app.apk.findings")));
        assert!(!is_apk(Path::new("/tmp/app")));
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("/tmp/.app.apk")));
        assert!(!is_hidden(Path::new("/tmp/app.apk")));
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
