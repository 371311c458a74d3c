use tracing::{info, instrument};

use crate::core::models::constraints::ConstraintSet;
use crate::core::models::molecule::Molecule;
use crate::core::store::BundleStore;
use crate::engine::config::JobConfig;
use crate::engine::error::EngineError;
use crate::engine::orchestrator::{Advance, Job};
use crate::engine::progress::ProgressReporter;

/// Runs the charge-derivation pipeline as far as the store allows.
///
/// The pipeline is resumable: results of earlier invocations are picked up
/// from the store, and only missing work is dispatched. The outcome is one
/// of [`Advance::Fitted`] (all results present, charges fitted),
/// [`Advance::Pending`] (external tasks still have to run), or
/// [`Advance::Failed`] (external tasks reported failure).
#[instrument(skip_all, name = "charges_workflow")]
pub fn run(
    molecules: Vec<Molecule>,
    constraints: ConstraintSet,
    config: JobConfig,
    store: &mut dyn BundleStore,
    reporter: &ProgressReporter,
) -> Result<Advance, EngineError> {
    info!(
        molecules = molecules.len(),
        optimize = config.optimize_geometry,
        "Starting charge derivation."
    );

    let mut job = Job::new(molecules, constraints, config)?;
    let outcome = job.advance_to_completion(store, reporter)?;

    match &outcome {
        Advance::Fitted(report) => info!(
            iterations = report.iterations,
            converged = report.converged,
            "Charge derivation complete."
        ),
        Advance::Pending(batch) => info!(
            stage = %batch.stage,
            tasks = batch.tasks.len(),
            "Halting until external tasks finish."
        ),
        Advance::Failed(failures) => info!(
            failed = failures.len(),
            "Halting on failed external tasks."
        ),
        Advance::Advanced(_) => {}
    }
    Ok(outcome)
}
