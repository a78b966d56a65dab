//! pfh - Inspect and extract PFH pack archives
//!
//! This tool reads the header and member index of `.pack` files and extracts
//! members without unpacking the whole archive.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pfh_core::{IndexStatus, Inventory, PackArchive, PackEntry};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Inspect and extract PFH pack archives
#[derive(Parser, Debug)]
#[command(name = "pfh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show header fields and file type statistics
    Info {
        /// Path to the pack file
        pack: PathBuf,

        /// Number of file types to show
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// List members, optionally filtered by a case-insensitive substring
    List {
        /// Path to the pack file
        pack: PathBuf,

        /// Only list members whose path contains this text
        pattern: Option<String>,

        /// Maximum number of members to print (0 = unlimited)
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Print a short content hash for each listed member
        #[arg(long)]
        checksum: bool,
    },

    /// Extract members matched by exact path or path suffix
    Extract {
        /// Path to the pack file
        pack: PathBuf,

        /// Member paths (or path suffixes) to extract
        #[arg(required = true)]
        names: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = "extracted")]
        output: PathBuf,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,

        /// Dry run - don't write files, just show what would be extracted
        #[arg(long)]
        dry_run: bool,
    },

    /// Find .pack files under a directory and report on each
    Scan {
        /// Directory to search
        directory: PathBuf,

        /// Number of largest pack files to list individually
        #[arg(long, default_value = "10")]
        top: usize,
    },
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

    match cli.command {
        Command::Info { ref pack, top } => show_info(pack, top),
        Command::List {
            ref pack,
            ref pattern,
            limit,
            checksum,
        } => list_members(pack, pattern.as_deref(), limit, checksum),
        Command::Extract {
            ref pack,
            ref names,
            ref output,
            force,
            dry_run,
        } => extract_members(pack, names, output, force, dry_run).map(|_| ()),
        Command::Scan { ref directory, top } => scan_directory(directory, top),
    }
}

fn open_archive(pack: &Path) -> Result<PackArchive> {
    PackArchive::open(pack)
        .with_context(|| format!("Failed to open pack file: {}", pack.display()))
}

/// Print header information and suffix statistics
fn show_info(pack: &Path, top: usize) -> Result<()> {
    let archive = open_archive(pack)?;
    let header = archive.header();

    println!("Pack file: {}", pack.display());
    println!("  Format:         {}", header.version);
    println!("  Pack type:      {}", header.kind);
    println!("  Members:        {}", header.member_count);
    println!("  Encrypted:      {}", header.flags.index_encrypted);
    println!("  Timestamps:     {}", header.flags.index_has_timestamps);
    println!("  Padded data:    {}", header.flags.data_padded);
    println!("  Created:        {}", header.creation_timestamp);
    println!("  Data offset:    {}", header.data_region_start());

    match archive.index_status() {
        IndexStatus::Complete => {}
        IndexStatus::TrailingBytes(n) => println!("  Index:          {} unread trailing bytes", n),
        IndexStatus::Unsupported(feature) => {
            println!("  Index:          not decoded ({})", feature);
            return Ok(());
        }
    }

    print_inventory(&archive.summarize(), top);
    Ok(())
}

fn print_inventory(inventory: &Inventory, top: usize) {
    println!();
    println!("  Total files:    {}", inventory.file_count);
    println!(
        "  Total size:     {:.1} MB",
        inventory.total_size as f64 / BYTES_PER_MB
    );

    if inventory.is_empty() {
        return;
    }

    println!();
    println!("  File types (top {}):", top);
    for (suffix, stats) in inventory.top_by_count(top) {
        println!(
            "    {:20} : {:6} files ({:8.1} MB)",
            suffix,
            stats.count,
            stats.total_size as f64 / BYTES_PER_MB
        );
    }
}

/// List members of an archive
fn list_members(pack: &Path, pattern: Option<&str>, limit: usize, checksum: bool) -> Result<()> {
    let archive = open_archive(pack)?;
    let entries: Vec<&PackEntry> = match pattern {
        Some(pattern) => archive.filter(pattern),
        None => archive.entries().iter().collect(),
    };

    match pattern {
        Some(pattern) => println!("Members matching '{}': {}", pattern, entries.len()),
        None => println!("All members: {}", entries.len()),
    }

    let shown = if limit == 0 { entries.len() } else { limit.min(entries.len()) };
    for entry in &entries[..shown] {
        let size_kb = f64::from(entry.size) / BYTES_PER_KB;
        if checksum {
            let data = archive
                .extract(entry)
                .with_context(|| format!("Failed to read member: {}", entry.path))?;
            println!("  {:10.1} KB  {}  {}", size_kb, content_hash(&data), entry.path);
        } else {
            println!("  {:10.1} KB  {}", size_kb, entry.path);
        }
    }

    if shown < entries.len() {
        println!("... and {} more", entries.len() - shown);
    }

    Ok(())
}

/// Compute a short hash of the content (first 8 chars of blake3)
fn content_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex()[..8].to_string()
}

/// Extract the named members into the output directory
fn extract_members(
    pack: &Path,
    names: &[String],
    output: &Path,
    force: bool,
    dry_run: bool,
) -> Result<usize> {
    let archive = open_archive(pack)?;
    if archive.index_status().is_degraded() {
        bail!(
            "Cannot extract from {}: member index was not decoded",
            pack.display()
        );
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        match archive.find_matching(name) {
            Some(entry) => selected.push(entry),
            None => bail!("Member not found in {}: {}", pack.display(), name),
        }
    }

    let mut pending = Vec::with_capacity(selected.len());
    for entry in selected {
        let target = output.join(
            pfh_core::store::sanitize_member_path(&entry.path)
                .with_context(|| format!("Refusing to extract member: {}", entry.path))?,
        );

        if dry_run {
            println!("Would write: {} ({} bytes)", target.display(), entry.size);
            continue;
        }

        if target.exists() && !force {
            warn!(
                "Skipping {}: file already exists (use --force to overwrite)",
                target.display()
            );
            continue;
        }

        pending.push(entry);
    }

    let extracted = archive
        .extract_entries(&pending)
        .with_context(|| format!("Failed to read members from {}", pack.display()))?;

    let mut written = 0;
    for (entry, data) in &extracted {
        let path = pfh_core::store::write_member(entry, data, output)
            .with_context(|| format!("Failed to extract member: {}", entry.path))?;
        println!("Extracted: {} -> {}", entry.path, path.display());
        written += 1;
    }

    info!("Summary: {} requested, {} written", names.len(), written);
    Ok(written)
}

/// Report on every .pack file below a directory
fn scan_directory(directory: &Path, top: usize) -> Result<()> {
    if !directory.exists() {
        bail!("Directory does not exist: {}", directory.display());
    }
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    info!("Scanning directory: {}", directory.display());

    let mut packs: Vec<(PathBuf, u64)> = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_pack_file(path) {
            trace!("Skipping: {}", path.display());
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        packs.push((path.to_path_buf(), size));
    }

    if packs.is_empty() {
        println!("No .pack files found in {}", directory.display());
        return Ok(());
    }

    packs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total: u64 = packs.iter().map(|(_, size)| size).sum();

    println!("Found {} .pack files:", packs.len());
    for (path, size) in packs.iter().take(top) {
        let rel = path.strip_prefix(directory).unwrap_or(path);
        println!("  {:8.1} MB - {}", *size as f64 / BYTES_PER_MB, rel.display());
    }
    if packs.len() > top {
        let rest: u64 = packs[top..].iter().map(|(_, size)| size).sum();
        println!(
            "  ... and {} more files ({:.1} MB)",
            packs.len() - top,
            rest as f64 / BYTES_PER_MB
        );
    }
    println!("Total .pack data: {:.1} MB", total as f64 / BYTES_PER_MB);

    println!();
    let mut readable = 0;
    for (path, _) in &packs {
        debug!("Opening: {}", path.display());
        // A bad archive must not stop the scan of the others
        match PackArchive::open(path) {
            Ok(archive) => {
                readable += 1;
                let rel = path.strip_prefix(directory).unwrap_or(path);
                match archive.index_status() {
                    IndexStatus::Unsupported(feature) => println!(
                        "  {} {:8} members  {} ({})",
                        archive.header().version,
                        archive.header().member_count,
                        rel.display(),
                        feature
                    ),
                    _ => println!(
                        "  {} {:8} members  {}",
                        archive.header().version,
                        archive.len(),
                        rel.display()
                    ),
                }
            }
            Err(e) => warn!("Error reading {}: {}", path.display(), e),
        }
    }

    info!("Read {} of {} pack files", readable, packs.len());
    Ok(())
}

fn is_pack_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pack"))
        .unwrap_or(false)
}
