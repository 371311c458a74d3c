use std::fmt;

use nalgebra::Point3;
use tracing::{debug, info, instrument, warn};

use super::config::JobConfig;
use super::driver::{self, PendingTask, StageOutcome, TaskFailure};
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use crate::core::fitting::solver::{FitReport, fit_charges};
use crate::core::models::constraints::{ConstraintSet, check_reference};
use crate::core::models::molecule::{EspGrid, Molecule, Orientation};
use crate::core::qm::bundle::TaskOutput;
use crate::core::qm::options::{DriverKind, QmOptions};
use crate::core::qm::task::{StructureSpec, TaskDescriptor};
use crate::core::store::BundleStore;

/// Pipeline position of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NeedsOptimization,
    NeedsEsp,
    ReadyToFit,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::NeedsOptimization => "needs_optimization",
            JobState::NeedsEsp => "needs_esp",
            JobState::ReadyToFit => "ready_to_fit",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// External work blocking a stage.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub stage: DriverKind,
    pub tasks: Vec<PendingTask>,
    /// Locator of the rendered dispatch script.
    pub script: Option<String>,
}

/// What one [`Job::advance`] call produced.
#[derive(Debug, Clone)]
pub enum Advance {
    /// An internal transition; the pipeline can continue immediately.
    Advanced(JobState),
    /// External tasks must run before the pipeline can continue.
    Pending(PendingBatch),
    /// The terminal result.
    Fitted(FitReport),
    /// External tasks failed; the job halts until they are cleared or rerun.
    Failed(Vec<TaskFailure>),
}

/// A resumable charge-derivation pipeline over one set of molecules.
///
/// A `Job` holds no connection to the store; every [`Self::advance`] call
/// re-derives the current stage's tasks from the molecular data and settles
/// them against whatever the store contains. Two jobs built from the same
/// inputs therefore behave identically, whether work completed in this
/// process or a previous one.
#[derive(Debug)]
pub struct Job {
    molecules: Vec<Molecule>,
    constraints: ConstraintSet,
    config: JobConfig,
    state: JobState,
    report: Option<FitReport>,
    failures: Vec<TaskFailure>,
}

impl Job {
    /// Validates the inputs and positions the pipeline at its first stage.
    pub fn new(
        molecules: Vec<Molecule>,
        constraints: ConstraintSet,
        config: JobConfig,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|source| EngineError::Initialization(source.to_string()))?;
        if molecules.is_empty() {
            return Err(EngineError::Initialization("job has no molecules".to_string()));
        }
        for (m, molecule) in molecules.iter().enumerate() {
            let atoms = molecule.atom_count();
            if atoms == 0 {
                return Err(EngineError::Initialization(format!(
                    "molecule {m} has no atoms"
                )));
            }
            if molecule.conformers.is_empty() {
                return Err(EngineError::Initialization(format!(
                    "molecule {m} has no conformers"
                )));
            }
            for (c, conformer) in molecule.conformers.iter().enumerate() {
                if conformer.coordinates.len() != atoms {
                    return Err(EngineError::Initialization(format!(
                        "molecule {m} conformer {c} has {} coordinate(s) for {atoms} atom(s)",
                        conformer.coordinates.len()
                    )));
                }
                if config.optimize_geometry && !conformer.orientations.is_empty() {
                    return Err(EngineError::Initialization(format!(
                        "molecule {m} conformer {c} carries explicit orientations; \
                         these only make sense with optimize_geometry = false"
                    )));
                }
                for (o, orientation) in conformer.orientations.iter().enumerate() {
                    if orientation.coordinates.len() != atoms {
                        return Err(EngineError::Initialization(format!(
                            "molecule {m} conformer {c} orientation {o} has {} coordinate(s) \
                             for {atoms} atom(s)",
                            orientation.coordinates.len()
                        )));
                    }
                }
            }
        }
        let atom_counts: Vec<usize> = molecules.iter().map(Molecule::atom_count).collect();
        constraints.validate(&atom_counts)?;
        for reference in &config.resp.stage2_atoms {
            check_reference(*reference, &atom_counts)?;
        }

        let state = if config.optimize_geometry {
            JobState::NeedsOptimization
        } else {
            JobState::NeedsEsp
        };
        Ok(Self {
            molecules,
            constraints,
            config,
            state,
            report: None,
            failures: Vec::new(),
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn molecules(&self) -> &[Molecule] {
        &self.molecules
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Performs the work of the current stage and moves at most one step.
    ///
    /// Returns [`Advance::Pending`] (repeatedly, and without duplicating any
    /// store writes) while external results are missing. Calling this on a
    /// finished job replays the cached outcome.
    #[instrument(skip_all, name = "job_advance", fields(state = %self.state))]
    pub fn advance(
        &mut self,
        store: &mut dyn BundleStore,
        reporter: &ProgressReporter,
    ) -> Result<Advance, EngineError> {
        match self.state {
            JobState::NeedsOptimization => self.advance_optimization(store, reporter),
            JobState::NeedsEsp => self.advance_esp(store, reporter),
            JobState::ReadyToFit => self.run_fit(reporter),
            JobState::Done => match &self.report {
                Some(report) => Ok(Advance::Fitted(report.clone())),
                None => Err(EngineError::Internal(
                    "job is done but carries no report".to_string(),
                )),
            },
            JobState::Failed => Ok(Advance::Failed(self.failures.clone())),
        }
    }

    /// Loops [`Self::advance`] until the pipeline blocks or finishes.
    pub fn advance_to_completion(
        &mut self,
        store: &mut dyn BundleStore,
        reporter: &ProgressReporter,
    ) -> Result<Advance, EngineError> {
        loop {
            match self.advance(store, reporter)? {
                Advance::Advanced(state) => debug!(%state, "pipeline advanced"),
                terminal => return Ok(terminal),
            }
        }
    }

    fn advance_optimization(
        &mut self,
        store: &mut dyn BundleStore,
        reporter: &ProgressReporter,
    ) -> Result<Advance, EngineError> {
        reporter.report(Progress::StageStart {
            name: "optimization",
        });
        let (tasks, targets) = optimization_tasks(&self.molecules, &self.config.optimization)?;
        reporter.report(Progress::TaskStart {
            total_steps: tasks.len() as u64,
        });
        let outcome =
            driver::evaluate_stage(store, DriverKind::Optimize, &tasks, &self.config.executable)?;
        for _ in &outcome.ready {
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::StageFinish);
        if let Some(halt) = self.absorb_halt(DriverKind::Optimize, &outcome) {
            return Ok(halt);
        }

        for (index, output) in &outcome.ready {
            let (m, c) = targets[*index];
            let TaskOutput::Optimization {
                coordinates,
                energy,
            } = output
            else {
                return Err(EngineError::Internal(
                    "optimization stage yielded a single-point payload".to_string(),
                ));
            };
            let conformer = &mut self.molecules[m].conformers[c];
            conformer.coordinates = coordinates
                .iter()
                .map(|&[x, y, z]| Point3::new(x, y, z))
                .collect();
            conformer.energy = Some(*energy);
        }
        info!(conformers = targets.len(), "geometries optimized");
        self.state = JobState::NeedsEsp;
        Ok(Advance::Advanced(self.state))
    }

    fn advance_esp(
        &mut self,
        store: &mut dyn BundleStore,
        reporter: &ProgressReporter,
    ) -> Result<Advance, EngineError> {
        materialize_orientations(&mut self.molecules);
        reporter.report(Progress::StageStart {
            name: "single_point",
        });
        let (tasks, targets) = esp_tasks(&self.molecules, &self.config.single_point)?;
        reporter.report(Progress::TaskStart {
            total_steps: tasks.len() as u64,
        });
        let outcome = driver::evaluate_stage(
            store,
            DriverKind::SinglePoint,
            &tasks,
            &self.config.executable,
        )?;
        for _ in &outcome.ready {
            reporter.report(Progress::TaskIncrement);
        }
        reporter.report(Progress::TaskFinish);
        reporter.report(Progress::StageFinish);
        if let Some(halt) = self.absorb_halt(DriverKind::SinglePoint, &outcome) {
            return Ok(halt);
        }

        for (index, output) in &outcome.ready {
            let (m, c, o) = targets[*index];
            let TaskOutput::SinglePoint { grid, esp, energy } = output else {
                return Err(EngineError::Internal(
                    "single-point stage yielded an optimization payload".to_string(),
                ));
            };
            let orientation = &mut self.molecules[m].conformers[c].orientations[o];
            orientation.grid = Some(EspGrid::from_samples(
                grid.iter()
                    .map(|&[x, y, z]| Point3::new(x, y, z))
                    .zip(esp.iter().copied()),
            ));
            orientation.energy = Some(*energy);
        }
        info!(orientations = targets.len(), "potential grids attached");
        self.state = JobState::ReadyToFit;
        Ok(Advance::Advanced(self.state))
    }

    fn run_fit(&mut self, reporter: &ProgressReporter) -> Result<Advance, EngineError> {
        reporter.report(Progress::StageStart { name: "fit" });
        let report = fit_charges(&self.molecules, &self.constraints, &self.config.resp)?;
        reporter.report(Progress::Message(format!(
            "fitted {} molecule(s) in {} iteration(s)",
            self.molecules.len(),
            report.iterations
        )));
        reporter.report(Progress::StageFinish);
        self.report = Some(report.clone());
        self.state = JobState::Done;
        Ok(Advance::Fitted(report))
    }

    fn absorb_halt(&mut self, stage: DriverKind, outcome: &StageOutcome) -> Option<Advance> {
        if !outcome.failed.is_empty() {
            warn!(%stage, failed = outcome.failed.len(), "external tasks failed");
            self.failures = outcome.failed.clone();
            self.state = JobState::Failed;
            return Some(Advance::Failed(outcome.failed.clone()));
        }
        if !outcome.pending.is_empty() {
            info!(%stage, pending = outcome.pending.len(), "waiting on external tasks");
            return Some(Advance::Pending(PendingBatch {
                stage,
                tasks: outcome.pending.clone(),
                script: outcome.script.clone(),
            }));
        }
        None
    }

    /// Reports per-stage completion against the store without writing
    /// anything or touching this job's state.
    ///
    /// Single-point tasks derive from optimized geometries, so that stage is
    /// only reported once the optimization stage is fully complete.
    pub fn survey(&self, store: &dyn BundleStore) -> Result<JobSurvey, EngineError> {
        let mut stages = Vec::new();
        let mut molecules = self.molecules.clone();
        let mut blocked = false;

        if self.config.optimize_geometry {
            let (tasks, targets) = optimization_tasks(&molecules, &self.config.optimization)?;
            let outcome = driver::survey_stage(
                store,
                DriverKind::Optimize,
                &tasks,
                &self.config.executable,
            )?;
            if outcome.ready.len() == tasks.len() {
                for (index, output) in &outcome.ready {
                    if let TaskOutput::Optimization {
                        coordinates,
                        energy,
                    } = output
                    {
                        let (m, c) = targets[*index];
                        let conformer = &mut molecules[m].conformers[c];
                        conformer.coordinates = coordinates
                            .iter()
                            .map(|&[x, y, z]| Point3::new(x, y, z))
                            .collect();
                        conformer.energy = Some(*energy);
                    }
                }
            } else {
                blocked = true;
            }
            stages.push(stage_status(DriverKind::Optimize, tasks.len(), &outcome));
        }

        let mut ready_to_fit = false;
        if !blocked {
            materialize_orientations(&mut molecules);
            let (tasks, _) = esp_tasks(&molecules, &self.config.single_point)?;
            let outcome = driver::survey_stage(
                store,
                DriverKind::SinglePoint,
                &tasks,
                &self.config.executable,
            )?;
            ready_to_fit = outcome.ready.len() == tasks.len();
            stages.push(stage_status(DriverKind::SinglePoint, tasks.len(), &outcome));
        }

        Ok(JobSurvey {
            stages,
            ready_to_fit,
        })
    }
}

/// Completion counts for one stage.
#[derive(Debug, Clone)]
pub struct StageStatus {
    pub stage: DriverKind,
    /// Number of tasks the stage derives, duplicates included.
    pub total: usize,
    /// Tasks with a usable completed result.
    pub complete: usize,
    /// Distinct work units still awaiting an external run.
    pub pending: usize,
    /// Distinct work units whose external run failed.
    pub failed: usize,
}

/// Read-only completion report for a job, stage by stage.
#[derive(Debug, Clone)]
pub struct JobSurvey {
    /// Derivable stages in pipeline order. The single-point stage is absent
    /// while optimization results are still missing.
    pub stages: Vec<StageStatus>,
    /// `true` once every external result needed by the fit is present.
    pub ready_to_fit: bool,
}

fn stage_status(stage: DriverKind, total: usize, outcome: &StageOutcome) -> StageStatus {
    StageStatus {
        stage,
        total,
        complete: outcome.ready.len(),
        pending: outcome.pending.len(),
        failed: outcome.failed.len(),
    }
}

// Implicit single orientations appear once the conformer geometry is final,
// never earlier.
fn materialize_orientations(molecules: &mut [Molecule]) {
    for molecule in molecules {
        for conformer in &mut molecule.conformers {
            if conformer.orientations.is_empty() {
                conformer
                    .orientations
                    .push(Orientation::new(conformer.coordinates.clone()));
            }
        }
    }
}

fn optimization_tasks(
    molecules: &[Molecule],
    options: &QmOptions,
) -> Result<(Vec<TaskDescriptor>, Vec<(usize, usize)>), EngineError> {
    let mut tasks = Vec::new();
    let mut targets = Vec::new();
    for (m, molecule) in molecules.iter().enumerate() {
        for (c, conformer) in molecule.conformers.iter().enumerate() {
            let structure = StructureSpec::from_points(
                &molecule.atomic_numbers,
                &conformer.coordinates,
                molecule.charge,
                molecule.multiplicity,
            );
            tasks.push(TaskDescriptor::new(
                structure,
                DriverKind::Optimize,
                options.clone(),
            )?);
            targets.push((m, c));
        }
    }
    Ok((tasks, targets))
}

fn esp_tasks(
    molecules: &[Molecule],
    options: &QmOptions,
) -> Result<(Vec<TaskDescriptor>, Vec<(usize, usize, usize)>), EngineError> {
    let mut tasks = Vec::new();
    let mut targets = Vec::new();
    for (m, molecule) in molecules.iter().enumerate() {
        for (c, conformer) in molecule.conformers.iter().enumerate() {
            for (o, orientation) in conformer.orientations.iter().enumerate() {
                let structure = StructureSpec::from_points(
                    &molecule.atomic_numbers,
                    &orientation.coordinates,
                    molecule.charge,
                    molecule.multiplicity,
                );
                tasks.push(TaskDescriptor::new(
                    structure,
                    DriverKind::SinglePoint,
                    options.clone(),
                )?);
                targets.push((m, c, o));
            }
        }
    }
    Ok((tasks, targets))
}
