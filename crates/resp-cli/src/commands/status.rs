use crate::cli::StatusArgs;
use crate::error::Result;
use respfit::core::io::jobfile::JobSpec;
use respfit::core::store::fs::FsStore;
use respfit::core::store::memory::MemStore;
use respfit::engine::orchestrator::Job;
use tracing::info;

pub fn run(args: StatusArgs) -> Result<i32> {
    let spec = JobSpec::load(&args.job)?;
    let job = Job::new(spec.molecules, spec.constraints, spec.config)?;

    // A missing work directory means nothing has run yet; survey an empty
    // store instead of creating the directory as a side effect.
    let survey = if args.work_dir.is_dir() {
        let store = FsStore::open(&args.work_dir)?;
        job.survey(&store)?
    } else {
        info!("Work directory {:?} does not exist yet.", &args.work_dir);
        job.survey(&MemStore::new())?
    };

    println!(
        "Job: {} molecule(s), work dir {}",
        job.molecules().len(),
        args.work_dir.display()
    );
    for status in &survey.stages {
        println!(
            "  {:<12} {:>3} task(s): {} complete, {} pending, {} failed",
            status.stage.stage_name(),
            status.total,
            status.complete,
            status.pending,
            status.failed
        );
    }

    if survey.ready_to_fit {
        println!("✓ All external results are in; 'respfit run' will fit the charges.");
    } else if survey.stages.iter().any(|s| s.failed > 0) {
        println!("❌ Some tasks failed; remove them with 'respfit clean --failed'.");
    } else {
        println!("⏸ External work is still outstanding; 'respfit run' will issue dispatch scripts.");
    }

    Ok(0)
}
