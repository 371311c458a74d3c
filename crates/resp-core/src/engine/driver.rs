use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use super::error::EngineError;
use crate::core::qm::bundle::{TaskBundle, TaskOutput, TaskStatus};
use crate::core::qm::options::DriverKind;
use crate::core::qm::task::{TaskDescriptor, TaskKey};
use crate::core::store::{BundleStore, Lookup};

/// A task whose result is not in the store yet.
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub descriptor: TaskDescriptor,
    /// Where the external program finds (and overwrites) the bundle.
    pub locator: String,
    /// The shell command that runs the task.
    pub command: String,
}

/// A task whose external run reported failure.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub key: TaskKey,
    pub label: String,
    pub message: String,
}

/// The partition of one stage's tasks against the store.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Completed outputs, paired with the position of their task in the
    /// evaluated slice. Duplicate tasks each receive their own entry.
    pub ready: Vec<(usize, TaskOutput)>,
    /// Tasks awaiting an external run, one entry per distinct key.
    pub pending: Vec<PendingTask>,
    /// Tasks whose external run failed, one entry per distinct key.
    pub failed: Vec<TaskFailure>,
    /// Locator of the dispatch script, present when anything is pending.
    pub script: Option<String>,
}

enum Disposition {
    Ready(TaskOutput),
    Pending { seed: bool },
    Failed,
}

/// Partitions tasks without touching the store, for status inspection.
pub fn survey_stage(
    store: &dyn BundleStore,
    stage: DriverKind,
    tasks: &[TaskDescriptor],
    executable: &str,
) -> Result<StageOutcome, EngineError> {
    let (outcome, _) = partition(store, stage, tasks, executable)?;
    Ok(outcome)
}

/// Evaluates one stage: looks every task up, seeds pending bundles for
/// anything absent or corrupt, and renders a dispatch script when external
/// work remains.
#[instrument(skip_all, name = "stage_evaluation", fields(stage = %stage, tasks = tasks.len()))]
pub fn evaluate_stage(
    store: &mut dyn BundleStore,
    stage: DriverKind,
    tasks: &[TaskDescriptor],
    executable: &str,
) -> Result<StageOutcome, EngineError> {
    let (mut outcome, seeds) = partition(store, stage, tasks, executable)?;
    for index in seeds {
        store.put(&TaskBundle::pending(&tasks[index]))?;
    }
    if !outcome.pending.is_empty() {
        // No `set -e`: the lines are independent, so a partial or re-ordered
        // run is safe and the survivors still count.
        let mut contents = String::from("#!/bin/sh\n");
        for task in &outcome.pending {
            contents.push_str(&task.command);
            contents.push('\n');
        }
        let name = format!("run_{}.sh", stage.stage_name());
        outcome.script = Some(store.write_script(&name, &contents)?);
    }
    debug!(
        ready = outcome.ready.len(),
        pending = outcome.pending.len(),
        failed = outcome.failed.len(),
        "stage partitioned"
    );
    Ok(outcome)
}

fn partition(
    store: &dyn BundleStore,
    stage: DriverKind,
    tasks: &[TaskDescriptor],
    executable: &str,
) -> Result<(StageOutcome, Vec<usize>), EngineError> {
    let mut ready = Vec::new();
    let mut pending = Vec::new();
    let mut failed = Vec::new();
    let mut seeds = Vec::new();
    let mut seen: HashMap<TaskKey, Disposition> = HashMap::new();

    for (index, task) in tasks.iter().enumerate() {
        if let Some(disposition) = seen.get(task.key()) {
            // Identical content, identical store entry; only completed
            // outputs need to be delivered to every occurrence.
            if let Disposition::Ready(output) = disposition {
                ready.push((index, output.clone()));
            }
            debug!(key = %task.key(), "duplicate task shares one store entry");
            continue;
        }

        let disposition = match store.lookup(task.key(), task.label())? {
            Lookup::Found(bundle) => classify_bundle(stage, task, &bundle, &mut failed),
            Lookup::Absent | Lookup::Corrupt => Disposition::Pending { seed: true },
        };
        match &disposition {
            Disposition::Ready(output) => ready.push((index, output.clone())),
            Disposition::Pending { seed } => {
                if *seed {
                    seeds.push(index);
                }
                let locator = store.locator(task.key(), task.label());
                let command = format!("{executable} --qcschema '{locator}'");
                pending.push(PendingTask {
                    descriptor: task.clone(),
                    locator,
                    command,
                });
            }
            Disposition::Failed => {}
        }
        seen.insert(task.key().clone(), disposition);
    }

    Ok((
        StageOutcome {
            ready,
            pending,
            failed,
            script: None,
        },
        seeds,
    ))
}

fn classify_bundle(
    stage: DriverKind,
    task: &TaskDescriptor,
    bundle: &TaskBundle,
    failed: &mut Vec<TaskFailure>,
) -> Disposition {
    match bundle.status {
        TaskStatus::Pending => Disposition::Pending { seed: false },
        TaskStatus::Error => {
            failed.push(TaskFailure {
                key: task.key().clone(),
                label: task.label().to_string(),
                message: bundle.error_message(),
            });
            Disposition::Failed
        }
        TaskStatus::Complete => {
            let expected_atoms = task.structure().atomic_numbers.len();
            match bundle.completed_output(expected_atoms) {
                Some(output) if output_matches_stage(stage, output) => {
                    Disposition::Ready(output.clone())
                }
                _ => {
                    // The file exists, so the external re-run overwrites it
                    // in place; no fresh seed is written.
                    warn!(
                        key = %task.key(),
                        label = task.label(),
                        "completed bundle has an inconsistent payload; queuing a recompute"
                    );
                    Disposition::Pending { seed: false }
                }
            }
        }
    }
}

fn output_matches_stage(stage: DriverKind, output: &TaskOutput) -> bool {
    matches!(
        (stage, output),
        (DriverKind::Optimize, TaskOutput::Optimization { .. })
            | (DriverKind::SinglePoint, TaskOutput::SinglePoint { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::qm::options::QmOptions;
    use crate::core::qm::task::StructureSpec;
    use crate::core::store::memory::MemStore;

    fn water_task(driver: DriverKind, x_shift: f64) -> TaskDescriptor {
        let structure = StructureSpec {
            atomic_numbers: vec![8, 1, 1],
            coordinates: vec![
                [x_shift, 0.0, 0.0],
                [x_shift + 0.96, 0.0, 0.0],
                [x_shift - 0.24, 0.93, 0.0],
            ],
            charge: 0,
            multiplicity: 1,
        };
        TaskDescriptor::new(structure, driver, QmOptions::default()).unwrap()
    }

    fn optimized(task: &TaskDescriptor) -> TaskBundle {
        TaskBundle::completed(
            task,
            TaskOutput::Optimization {
                coordinates: vec![[0.0, 0.0, 0.0], [0.95, 0.0, 0.0], [-0.25, 0.92, 0.0]],
                energy: -76.02,
            },
        )
    }

    #[test]
    fn absent_tasks_are_seeded_and_scripted() {
        let mut store = MemStore::new();
        let tasks = vec![
            water_task(DriverKind::Optimize, 0.0),
            water_task(DriverKind::Optimize, 5.0),
        ];

        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();

        assert!(outcome.ready.is_empty());
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.pending.len(), 2);
        assert_eq!(store.writes(), 2);
        assert_eq!(outcome.script.as_deref(), Some("mem://run_optimization.sh"));

        let contents = store.scripts().get("run_optimization.sh").unwrap();
        assert!(contents.starts_with("#!/bin/sh\n"));
        assert!(!contents.contains("set -e"));
        assert_eq!(contents.lines().count(), 3);
        for task in &outcome.pending {
            assert!(contents.contains(&task.command));
            assert!(task.command.starts_with("psi4 --qcschema "));
        }
    }

    #[test]
    fn re_evaluation_does_not_rewrite_pending_seeds() {
        let mut store = MemStore::new();
        let tasks = vec![water_task(DriverKind::Optimize, 0.0)];
        evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        let writes = store.writes();

        let again = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();

        assert_eq!(store.writes(), writes);
        assert_eq!(again.pending.len(), 1);
    }

    #[test]
    fn completed_tasks_come_back_ready() {
        let mut store = MemStore::new();
        let tasks = vec![
            water_task(DriverKind::Optimize, 0.0),
            water_task(DriverKind::Optimize, 5.0),
        ];
        evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        store.put(&optimized(&tasks[0])).unwrap();

        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();

        assert_eq!(outcome.ready.len(), 1);
        assert_eq!(outcome.ready[0].0, 0);
        assert_eq!(outcome.pending.len(), 1);
        assert_eq!(outcome.pending[0].descriptor.key(), tasks[1].key());
    }

    #[test]
    fn failures_are_reported_with_their_messages() {
        let mut store = MemStore::new();
        let tasks = vec![water_task(DriverKind::Optimize, 0.0)];
        evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        store
            .put(&TaskBundle::failed(&tasks[0], "scf did not converge"))
            .unwrap();

        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();

        assert!(outcome.ready.is_empty());
        assert!(outcome.pending.is_empty());
        assert!(outcome.script.is_none());
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].message, "scf did not converge");
        assert_eq!(outcome.failed[0].label, "H2O");
    }

    #[test]
    fn duplicate_tasks_share_one_store_entry() {
        let mut store = MemStore::new();
        let tasks = vec![
            water_task(DriverKind::Optimize, 0.0),
            water_task(DriverKind::Optimize, 0.0),
        ];

        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        assert_eq!(outcome.pending.len(), 1);
        assert_eq!(store.writes(), 1);

        store.put(&optimized(&tasks[0])).unwrap();
        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        assert_eq!(outcome.ready.len(), 2);
        assert_eq!(outcome.ready[0].0, 0);
        assert_eq!(outcome.ready[1].0, 1);
    }

    #[test]
    fn inconsistent_completed_payload_is_requeued() {
        let mut store = MemStore::new();
        let tasks = vec![water_task(DriverKind::Optimize, 0.0)];
        evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();
        // Wrong payload kind for an optimization task.
        store
            .put(&TaskBundle::completed(
                &tasks[0],
                TaskOutput::SinglePoint {
                    grid: vec![[0.0, 0.0, 2.0]],
                    esp: vec![0.04],
                    energy: -76.0,
                },
            ))
            .unwrap();
        let writes = store.writes();

        let outcome = evaluate_stage(&mut store, DriverKind::Optimize, &tasks, "psi4").unwrap();

        assert!(outcome.ready.is_empty());
        assert_eq!(outcome.pending.len(), 1);
        assert_eq!(store.writes(), writes);
    }

    #[test]
    fn survey_reports_without_writing() {
        let store = MemStore::new();
        let tasks = vec![water_task(DriverKind::SinglePoint, 0.0)];

        let outcome = survey_stage(&store, DriverKind::SinglePoint, &tasks, "psi4").unwrap();

        assert_eq!(outcome.pending.len(), 1);
        assert!(outcome.script.is_none());
        assert_eq!(store.writes(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn empty_stage_yields_an_empty_outcome() {
        let mut store = MemStore::new();
        let outcome = evaluate_stage(&mut store, DriverKind::SinglePoint, &[], "psi4").unwrap();
        assert!(outcome.ready.is_empty());
        assert!(outcome.pending.is_empty());
        assert!(outcome.failed.is_empty());
        assert!(outcome.script.is_none());
    }
}
