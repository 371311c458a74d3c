use crate::cli::CleanArgs;
use crate::error::{CliError, Result};
use respfit::core::store::fs::FsStore;
use tracing::info;

pub fn run(args: CleanArgs) -> Result<i32> {
    if !args.work_dir.is_dir() {
        return Err(CliError::Other(anyhow::anyhow!(
            "work directory {} does not exist",
            args.work_dir.display()
        )));
    }

    let mut store = FsStore::open(&args.work_dir)?;
    let removed = if args.failed {
        info!("Clearing failed bundles from {:?}.", &args.work_dir);
        store.clear_failed()?
    } else {
        info!("Clearing all bundles from {:?}.", &args.work_dir);
        store.clear()?
    };

    if removed == 0 {
        println!("Nothing to remove.");
    } else if args.failed {
        println!(
            "✓ Removed {} failed bundle(s); the next run will re-issue those tasks.",
            removed
        );
    } else {
        println!("✓ Removed {} file(s).", removed);
    }

    Ok(0)
}
