use std::fs::OpenOptions;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::error;

use wb_cache::{logging, search_file, search_file_direct, BlockCache, Handle, SearchOutcome};

#[derive(Parser)]
#[command(about = "Block cache benchmark and self-test")]
struct Args {
    /// Directory the searches start from
    #[arg(long, default_value = "/", global = true)]
    root: PathBuf,

    /// Cache block size in bytes
    #[arg(long, default_value_t = wb_cache::config::DEFAULT_BLOCK_SIZE, global = true)]
    block_size: usize,

    /// Cache capacity in pages
    #[arg(long, default_value_t = wb_cache::config::DEFAULT_MAX_CACHE_SIZE, global = true)]
    max_pages: usize,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Find a file and read its prefix through the block cache
    Search { file_name: String, repeat_count: u32 },
    /// Find a file and read its prefix with plain file I/O
    OldSearch { file_name: String, repeat_count: u32 },
    /// Write, read back and flush a short message through the cache
    SelfTest {
        #[arg(long, default_value = "test_dir/file1.txt")]
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    let result = match &args.mode {
        Mode::Search {
            file_name,
            repeat_count,
        } => BlockCache::new(args.block_size, args.max_pages).and_then(|mut cache| {
            benchmark(*repeat_count, || search_file(&mut cache, &args.root, file_name))
        }),
        Mode::OldSearch {
            file_name,
            repeat_count,
        } => benchmark(*repeat_count, || search_file_direct(&args.root, file_name)),
        Mode::SelfTest { path } => self_test(&args, path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs `search` up to `repeat_count` times, stopping early on a miss.
fn benchmark(
    repeat_count: u32,
    mut search: impl FnMut() -> wb_cache::Result<SearchOutcome>,
) -> wb_cache::Result<()> {
    let start = Instant::now();
    let mut outcome = SearchOutcome::NotFound;

    // Results are printed once, after the clock stops, so terminal output
    // stays out of the measurement.
    for _ in 0..repeat_count {
        outcome = search()?;
        if !outcome.is_found() {
            break;
        }
    }
    println!(
        "Total execution time: {:.6} seconds",
        start.elapsed().as_secs_f64()
    );

    match outcome {
        SearchOutcome::Found { path, prefix } => {
            println!("File found: {}", path.display());
            println!("Read from file: {}", String::from_utf8_lossy(&prefix));
        }
        SearchOutcome::NotFound => println!("File not found"),
    }
    Ok(())
}

fn self_test(args: &Args, path: &Path) -> wb_cache::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| wb_cache::Error::Open {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|source| wb_cache::Error::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut cache = BlockCache::new(args.block_size, args.max_pages)?;
    let fd = cache.open(path)?;
    println!("File successfully opened: {}", fd);

    let steps = write_read_flush(&mut cache, fd);
    let closed = cache.close(fd);
    steps?;
    closed?;
    println!("File successfully closed");
    Ok(())
}

fn write_read_flush(cache: &mut BlockCache, fd: Handle) -> wb_cache::Result<()> {
    let written = cache.write(fd, b"Hello!")?;
    println!("Data successfully written: {} bytes", written);

    cache.seek(fd, SeekFrom::Start(0))?;
    println!("File pointer successfully moved to the beginning");

    let mut buf = [0u8; 127];
    let read = cache.read(fd, &mut buf)?;
    let text = String::from_utf8_lossy(&buf[..read]);
    println!("Data successfully read: {}", text.trim_end_matches('\0'));

    cache.flush(fd)?;
    println!("Data successfully synchronized to disk");
    Ok(())
}
