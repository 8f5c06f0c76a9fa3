//! filecache - read files through a size-bounded in-memory LRU cache

use anyhow::{Context, Result};
use clap::Parser;
use filecache_core::{CacheConfig, FileCache};
use filecache_storage::{LocalStorage, format_bytes};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{Config, LoggingConfig};

/// filecache - serve repeated whole-file reads from memory
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Cache capacity in bytes
    #[arg(long, env = "FILECACHE_CAPACITY")]
    capacity: Option<u64>,

    /// Directory relative file names are resolved against
    #[arg(long, env = "FILECACHE_ROOT")]
    root: Option<String>,

    /// Number of passes over the file list per thread
    #[arg(short, long, default_value_t = 1)]
    repeat: usize,

    /// Number of reader threads sharing the cache
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,

    /// Print the cache structure after reading
    #[arg(long)]
    dump: bool,

    /// Print cache metrics in Prometheus text format after reading
    #[arg(long)]
    metrics: bool,

    /// Files to read
    #[arg(required = true)]
    files: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting filecache v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = if args.metrics {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install metrics recorder")?;
        Some(handle)
    } else {
        None
    };

    let root = args.root.unwrap_or(config.storage.root);
    let storage = Arc::new(
        LocalStorage::new(&root).with_context(|| format!("Invalid storage root: {}", root))?,
    );

    let cache = FileCache::new(
        storage,
        CacheConfig {
            max_size: args.capacity.unwrap_or(config.cache.max_size),
        },
    );

    let failures = AtomicUsize::new(0);
    thread::scope(|s| {
        for worker in 0..args.threads.max(1) {
            let cache = &cache;
            let files = &args.files;
            let failures = &failures;
            s.spawn(move || {
                for pass in 0..args.repeat {
                    for file in files {
                        match cache.read(file) {
                            Ok(content) => {
                                info!(worker, pass, file = %file, bytes = content.len(), "read");
                            }
                            Err(e) => {
                                error!(worker, pass, "{}", e);
                                failures.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            });
        }
    });

    let stats = cache.stats();
    println!(
        "reads: {} (hits {}, misses {}, hit rate {:.1}%)",
        stats.total_reads(),
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );
    println!(
        "evictions: {} ({}), pass-throughs: {}, storage errors: {}",
        stats.evictions,
        format_bytes(stats.evicted_bytes),
        stats.pass_throughs,
        stats.storage_errors
    );
    println!(
        "cached: {} files, {} of {}",
        cache.len(),
        format_bytes(cache.total_size()),
        format_bytes(cache.capacity())
    );

    if args.dump {
        cache.dump();
        print!("{}", cache.diagnose());
    }

    if let Some(handle) = metrics_handle {
        print!("{}", handle.render());
    }

    let failed = failures.load(Ordering::Relaxed);
    if failed > 0 {
        anyhow::bail!("{} reads failed", failed);
    }
    Ok(())
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}
