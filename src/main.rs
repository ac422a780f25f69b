use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clutrec::db::db_open;
use clutrec::engine::PatchEngine;
use clutrec::experiment::{ExperimentRunner, TrainFeaturesCache};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let db_path = PathBuf::from(args.next().unwrap_or_else(|| "clutrec.sqlite3".to_string()));
    let data_root = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let cache_dir = PathBuf::from(args.next().unwrap_or_else(|| "train_cache".to_string()));

    info!(
        "dispatching experiments from {} (data root {}, cache {})",
        db_path.display(),
        data_root.display(),
        cache_dir.display()
    );

    let conn = db_open(&db_path)?;
    let cache = TrainFeaturesCache::new(cache_dir);
    let mut runner = ExperimentRunner::new(conn, cache, data_root, Arc::new(PatchEngine));
    runner.run()?;
    Ok(())
}
