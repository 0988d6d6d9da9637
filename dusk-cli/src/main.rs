use std::io::Write;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::bail;
use dusk_core::{
    Backend, Database, DbConfig, Histogram, IndexOptions, IndexReport, Indexer, OpenOptions,
    SizeType, SortBy, format_count, format_duration, format_size, size_percentage,
};
use tracing_subscriber::{EnvFilter, fmt};

/// DUSK - disk usage indexer
#[derive(Parser, Debug)]
#[command(name = "dusk")]
#[command(about = "Index disk usage once, then browse it without touching the disk")]
#[command(version)]
struct Args {
    /// Database file (defaults to $DUSK_DATABASE, then the user cache dir)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Storage backend
    #[arg(long, global = true, default_value_t = Backend::File)]
    backend: Backend,

    /// More log output, repeat for more detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index one or more directories
    Index(IndexArgs),

    /// List a directory from the index
    Ls(LsArgs),

    /// Show the stored index reports
    Info(InfoArgs),
}

#[derive(ClapArgs, Debug)]
struct IndexArgs {
    /// Directories to index
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Don't cross filesystem boundaries
    #[arg(short = 'x', long)]
    one_file_system: bool,

    /// Only cross into mounts of these filesystem types, comma separated
    #[arg(long, value_name = "TYPES")]
    fs_include: Vec<String>,

    /// Don't cross into mounts of these filesystem types, comma separated
    #[arg(long, value_name = "TYPES")]
    fs_exclude: Vec<String>,

    /// Store "<FILE>" instead of file names
    #[arg(short = 'H', long)]
    hide_file_names: bool,

    /// Count files with several hard links once
    #[arg(long)]
    check_hard_links: bool,

    /// Skip entries whose name matches this glob (repeatable)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Leave files out of listings deeper than this (0 = unlimited)
    #[arg(short, long)]
    max_depth: Option<usize>,

    /// Only index entries owned by this user id
    #[arg(short, long)]
    uid: Option<u32>,

    /// Start a fresh database, discarding the existing one
    #[arg(short, long)]
    force: bool,

    /// Walk and report without writing the database
    #[arg(long)]
    dry_run: bool,

    /// Show progress while indexing
    #[arg(short, long)]
    progress: bool,
}

#[derive(ClapArgs, Debug)]
struct LsArgs {
    /// Directory to list
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Show apparent sizes instead of disk usage
    #[arg(short, long, conflicts_with = "count")]
    apparent: bool,

    /// Show entry counts instead of sizes
    #[arg(short, long)]
    count: bool,

    /// Sort by name instead of size
    #[arg(short, long)]
    name: bool,

    /// Show exact byte counts
    #[arg(short, long)]
    bytes: bool,

    /// Append a type indicator to names
    #[arg(short = 'F', long)]
    classify: bool,

    /// Print a size histogram instead of the listing
    #[arg(long)]
    histogram: bool,
}

#[derive(ClapArgs, Debug)]
struct InfoArgs {
    /// Show apparent sizes instead of disk usage
    #[arg(short, long)]
    apparent: bool,

    /// Show exact byte counts
    #[arg(short, long)]
    bytes: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let mut builder = DbConfig::builder().backend(args.backend);
    if let Some(path) = args.database {
        builder = builder.path(path);
    }
    let config = builder.build();
    tracing::debug!(database = ?config.path, backend = %config.backend, "configuration");

    match args.command {
        Command::Index(cmd) => run_index(&config, cmd),
        Command::Ls(cmd) => run_ls(&config, cmd),
        Command::Info(cmd) => run_info(&config, cmd),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_index(config: &DbConfig, cmd: IndexArgs) -> Result<()> {
    let mut db = if cmd.dry_run {
        Database::in_memory()?
    } else {
        Database::open(config, OpenOptions::read_write().force(cmd.force))?
    };

    let mut options = IndexOptions {
        max_depth: cmd.max_depth,
        exclude: cmd.exclude,
        one_file_system: cmd.one_file_system,
        hide_file_names: cmd.hide_file_names,
        check_hard_links: cmd.check_hard_links,
        dry_run: cmd.dry_run,
        uid: cmd.uid,
        ..Default::default()
    };
    for types in &cmd.fs_include {
        options = options.fs_include(types);
    }
    for types in &cmd.fs_exclude {
        options = options.fs_exclude(types);
    }

    let results = {
        let mut indexer = Indexer::new(&mut db, options)?;
        if cmd.progress {
            indexer = indexer.with_progress(print_progress);
        }
        indexer.index_all(&cmd.paths)
    };

    if cmd.progress {
        eprintln!();
    }

    let mut failures = 0;
    for (path, result) in cmd.paths.iter().zip(results) {
        match result {
            Ok(report) => print_summary(&report),
            Err(e) => {
                eprintln!("dusk: {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }

    db.close()?;

    if failures > 0 {
        bail!("{} of {} paths failed to index", failures, cmd.paths.len());
    }
    Ok(())
}

fn print_progress(report: &IndexReport) {
    let mut stderr = std::io::stderr();
    let _ = write!(
        stderr,
        "\r[{:>8}] in {} files and {} directories",
        format_size(report.size.actual, false),
        format_count(report.file_count, false),
        format_count(report.dir_count, false),
    );
    let _ = stderr.flush();
}

fn print_summary(report: &IndexReport) {
    println!(
        "Indexed {} files and {} directories, ({}B apparent, {}B actual) in {}",
        format_count(report.file_count, true),
        format_count(report.dir_count, true),
        format_size(report.size.apparent, false),
        format_size(report.size.actual, false),
        format_duration(report.duration()),
    );
}

fn run_ls(config: &DbConfig, cmd: LsArgs) -> Result<()> {
    let db = Database::open(config, OpenOptions::read_only())?;
    let mut dir = db.open_dir(&cmd.path)?;

    let size_type = if cmd.apparent {
        SizeType::Apparent
    } else if cmd.count {
        SizeType::Count
    } else {
        SizeType::Actual
    };
    let sort = if cmd.name { SortBy::Name } else { SortBy::Size };
    let show = |value: u64| match size_type {
        SizeType::Count => format_count(value, cmd.bytes),
        _ => format_size(value, cmd.bytes),
    };

    if cmd.histogram {
        let histogram = Histogram::new(&dir, size_type, 1024, 1 << 40, 2.0);
        for bin in &histogram.bins {
            if bin.file_count == 0 && bin.dir_count == 0 {
                continue;
            }
            println!(
                "{:>8} - {:<8} {:>8} files {:>8} dirs",
                show(bin.min),
                if bin.max == u64::MAX { "...".to_string() } else { show(bin.max) },
                bin.file_count,
                bin.dir_count
            );
        }
    } else {
        let total = dir.size().get(size_type);
        while let Some(entry) = dir.read(size_type, sort) {
            let value = entry.size.get(size_type);
            let indicator = if cmd.classify {
                entry.file_type.indicator().to_string()
            } else {
                String::new()
            };
            println!(
                "{:>10} {:>5.1}% {}{}",
                show(value),
                size_percentage(value, total),
                entry.name,
                indicator.trim_end()
            );
        }
    }

    dir.close();
    db.close()?;
    Ok(())
}

fn run_info(config: &DbConfig, cmd: InfoArgs) -> Result<()> {
    let db = Database::open(config, OpenOptions::read_only())?;
    let reports = db.reports()?;

    if reports.is_empty() {
        let location = db
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory database".to_string());
        println!("No indexed paths in {}", location);
    } else {
        println!(
            "{:>10} {:>10} {:>10} {:>12}  Path",
            "Files", "Dirs", "Size", "Took"
        );
        for report in &reports {
            let size = if cmd.apparent {
                report.size.apparent
            } else {
                report.size.actual
            };
            println!(
                "{:>10} {:>10} {:>10} {:>12}  {}",
                format_count(report.file_count, cmd.bytes),
                format_count(report.dir_count, cmd.bytes),
                format_size(size, cmd.bytes),
                format!("{:.2}s", report.duration().as_secs_f64()),
                report.path
            );
        }
    }

    db.close()?;
    Ok(())
}
