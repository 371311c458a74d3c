use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use respfit::core::io::jobfile::JobSpec;
use respfit::core::io::report;
use respfit::core::store::fs::FsStore;
use respfit::engine::orchestrator::{Advance, Job, PendingBatch};
use respfit::engine::progress::ProgressReporter;
use std::fs::File;
use tracing::{info, warn};

/// Exit code signalling queued external work, distinct from failure so batch
/// wrappers can loop on it.
pub const PENDING_EXIT_CODE: i32 = 2;

pub fn run(args: RunArgs) -> Result<i32> {
    let spec = JobSpec::load(&args.job)?;
    info!(
        "Loaded {} molecule(s) from {:?}.",
        spec.molecules.len(),
        &args.job
    );

    let mut job = Job::new(spec.molecules, spec.constraints, spec.config)?;
    let mut store = FsStore::open(&args.work_dir)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Starting charge derivation...");
    info!("Advancing the job as far as the cached results allow.");

    match job.advance_to_completion(&mut store, &reporter)? {
        Advance::Fitted(fit) => {
            if !fit.converged {
                warn!("The fit stopped at the iteration cap without converging.");
                println!("Warning: the fit did not converge; inspect the charges before use.");
            }
            info!(
                "Fit finished after {} iteration(s) across {} stage(s).",
                fit.iterations,
                fit.stages.len()
            );

            match &args.charges {
                Some(path) => {
                    let file = File::create(path)?;
                    report::write_charges_csv(file, job.molecules(), &fit)?;
                    println!("✓ Fitted charges written to: {}", path.display());
                }
                None => {
                    println!("✓ Fitted charges:");
                    report::write_charges_csv(std::io::stdout().lock(), job.molecules(), &fit)?;
                }
            }
            Ok(0)
        }
        Advance::Pending(batch) => {
            print_pending(&batch);
            Ok(PENDING_EXIT_CODE)
        }
        Advance::Failed(failures) => {
            eprintln!("❌ {} external task(s) failed:", failures.len());
            for failure in &failures {
                eprintln!("  {} [{}]: {}", failure.label, failure.key, failure.message);
            }
            eprintln!(
                "Remove them with 'respfit clean --work-dir {} --failed' and re-run the computations.",
                args.work_dir.display()
            );
            Ok(1)
        }
        Advance::Advanced(state) => Err(CliError::Other(anyhow::anyhow!(
            "the pipeline stopped in the non-terminal state '{state}'"
        ))),
    }
}

fn print_pending(batch: &PendingBatch) {
    println!(
        "⏸ {} {} task(s) await an external run:",
        batch.tasks.len(),
        batch.stage
    );
    for task in &batch.tasks {
        println!("  {} → {}", task.descriptor.label(), task.locator);
    }
    if let Some(script) = &batch.script {
        println!("Execute the dispatch script, then re-run this command to resume:");
        println!("  sh {script}");
    }
}
