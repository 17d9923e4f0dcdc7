//! azfp - Inspection tool for AZFP raw files
//!
//! Usage:
//!   azfp info <file> --params <cfg>                    - Show termination, config and ancillary ranges
//!   azfp dump <file> --params <cfg> [--output <path>]  - Write the unpacked dataset as JSON
//!   azfp list <directory> [--recursive]                - List all .01A files with their hour

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use azfp_rs::config::InstrumentParameters;
use azfp_rs::dataset::{finite_range, UnpackedDataset};
use azfp_rs::reader::{is_raw_file, parse_file, raw_file_hour};

#[derive(Parser)]
#[command(name = "azfp")]
#[command(about = "Inspection tool for AZFP raw files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show termination reason, configuration and ancillary ranges
    Info {
        /// Path to the .01A file
        file: PathBuf,

        /// Instrument parameter file (TOML or JSON)
        #[arg(short, long, env = "AZFP_PARAMS")]
        params: PathBuf,
    },

    /// Write the unpacked dataset as JSON
    Dump {
        /// Path to the .01A file
        file: PathBuf,

        /// Instrument parameter file (TOML or JSON)
        #[arg(short, long, env = "AZFP_PARAMS")]
        params: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List all .01A files in a directory
    List {
        /// Directory to scan
        directory: PathBuf,

        /// Include subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("azfp_rs=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file, params } => show_info(&file, &params),
        Commands::Dump {
            file,
            params,
            output,
        } => dump_file(&file, &params, output.as_deref()),
        Commands::List {
            directory,
            recursive,
        } => list_files(&directory, recursive),
    }
}

fn load_dataset(file: &Path, params_path: &Path) -> anyhow::Result<UnpackedDataset> {
    let params = InstrumentParameters::load(params_path)
        .with_context(|| format!("loading parameters from {}", params_path.display()))?;
    let config_name = params_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    parse_file(file, &params, &config_name)
        .with_context(|| format!("parsing {}", file.display()))
}

fn show_info(file: &Path, params_path: &Path) -> anyhow::Result<()> {
    let dataset = load_dataset(file, params_path)?;

    println!("File: {}", file.display());
    println!("Size: {} bytes", std::fs::metadata(file)?.len());
    println!();

    println!("=== Stream ===");
    println!("  Pings:          {}", dataset.len());
    println!("  Stopped on:     {}", dataset.termination);
    if let (Some(first), Some(last)) = (dataset.ping_time.first(), dataset.ping_time.last()) {
        println!("  Time Range:     {} - {}", first, last);
    }

    let Some(config) = &dataset.config else {
        println!();
        println!("No pings decoded");
        return Ok(());
    };

    println!();
    println!("=== Configuration ===");
    println!("  Serial Number:  {}", config.serial_number);
    println!("  Channels:       {}", config.num_chan);
    println!("  Frequency kHz:  {:?}", config.frequency);
    println!("  Bins:           {:?}", config.num_bins);
    println!("  Data Type:      {:?}", config.data_type);
    println!("  Pings/Profile:  {}", config.ping_per_profile);
    println!("  Avg Pings:      {}", config.avg_pings);
    println!("  Burst Interval: {}", config.burst_interval);

    println!();
    println!("=== Ancillary ===");
    print_range("Temperature", &dataset.temperature);
    print_range("Tilt X", &dataset.tilt_x);
    print_range("Tilt Y", &dataset.tilt_y);
    print_range("Cos Tilt Mag", &dataset.cos_tilt_mag);
    print_range("Battery Main", &dataset.battery_main);
    print_range("Battery Tx", &dataset.battery_tx);

    Ok(())
}

fn print_range(label: &str, values: &[f64]) {
    let label = format!("{}:", label);
    match finite_range(values) {
        Some((min, max)) => println!("  {:<15} {:>10.4} - {:<10.4}", label, min, max),
        None => println!("  {:<15} {:>10}", label, "n/a"),
    }
}

fn dump_file(file: &Path, params_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let dataset = load_dataset(file, params_path)?;

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    serde_json::to_writer_pretty(&mut writer, &dataset)?;
    writeln!(writer)?;
    writer.flush()?;

    if let Some(path) = output {
        eprintln!("Wrote {} pings to {}", dataset.len(), path.display());
    }
    Ok(())
}

fn list_files(directory: &Path, recursive: bool) -> anyhow::Result<()> {
    println!("Scanning: {}", directory.display());
    println!();

    let mut files = Vec::new();
    collect_raw_files(directory, recursive, &mut files)?;
    files.sort();

    if files.is_empty() {
        println!("No .01A files found");
        return Ok(());
    }

    println!("{:<50} {:>20} {:>10}", "File", "Hour", "Size (KB)");
    println!("{}", "-".repeat(82));

    let mut total_size = 0u64;
    for path in &files {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        total_size += size;

        let hour = raw_file_hour(path)
            .map(|t| t.format("%Y-%m-%d %H:00").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{:<50} {:>20} {:>10.1}",
            path.display(),
            hour,
            size as f64 / 1024.0
        );
    }

    println!("{}", "-".repeat(82));
    println!(
        "{} files, {:.1} KB total",
        files.len(),
        total_size as f64 / 1024.0
    );
    Ok(())
}

fn collect_raw_files(
    dir: &Path,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), std::io::Error> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() && is_raw_file(&path) {
            files.push(path);
        } else if recursive && path.is_dir() {
            collect_raw_files(&path, recursive, files)?;
        }
    }
    Ok(())
}
