// Run with: cargo run --example debug_index -- /path/to/index
// Registered in dusk-core/Cargo.toml: [[example]] name = "debug_index" path = "../debug_index.rs"

use dusk_core::{Database, IndexOptions, Indexer, SizeType, SortBy, format_size};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    println!("Indexing: {:?}", path);

    let mut db = Database::in_memory().unwrap();
    let start = Instant::now();
    let mut last_files = 0u64;
    let mut stuck_count = 0;

    let options = IndexOptions::default().progress_interval(Duration::from_millis(500));
    let report = Indexer::new(&mut db, options)
        .unwrap()
        .with_progress(|p| {
            // Same file count on consecutive updates means a slow directory
            if p.file_count == last_files {
                stuck_count += 1;
            } else {
                stuck_count = 0;
            }
            last_files = p.file_count;

            println!(
                "[{:>6.1}s] files={:<8} dirs={:<8} bytes={:<12} stuck={}",
                start.elapsed().as_secs_f64(),
                p.file_count,
                p.dir_count,
                p.size.actual,
                stuck_count,
            );
        })
        .index(&path)
        .unwrap();

    println!(
        "\nFinal: {} files, {} dirs, {} total size in {:.2}s",
        report.file_count,
        report.dir_count,
        format_size(report.size.actual, false),
        report.duration().as_secs_f64()
    );

    let mut root = db.open_dir(&report.path).unwrap();
    for _ in 0..10 {
        let Some(entry) = root.read(SizeType::Actual, SortBy::Size) else {
            break;
        };
        println!(
            "{:>10} {}{}",
            format_size(entry.size.actual, false),
            entry.name,
            entry.file_type.indicator()
        );
    }
}
