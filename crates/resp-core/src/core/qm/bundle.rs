use super::options::{DriverKind, QmOptions};
use super::task::{StructureSpec, TaskDescriptor, TaskKey};
use serde::{Deserialize, Serialize};

/// Schema marker embedded in every bundle document.
pub const BUNDLE_SCHEMA: &str = "respfit.task.v1";

/// The lifecycle state recorded inside a bundle document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Written by the pipeline; waiting for an external program to fill it in.
    Pending,
    /// The external program finished and wrote an output payload.
    Complete,
    /// The external program failed and wrote an error report.
    Error,
}

/// The output payload of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOutput {
    /// Result of a geometry optimization.
    Optimization {
        /// Optimized coordinates in Angstroms, in input atom order.
        coordinates: Vec<[f64; 3]>,
        /// Final total energy in Hartree.
        energy: f64,
    },
    /// Result of a single-point ESP evaluation.
    SinglePoint {
        /// Grid point locations in Angstroms.
        grid: Vec<[f64; 3]>,
        /// Electrostatic potential at each grid point, in atomic units.
        esp: Vec<f64>,
        /// Total energy in Hartree.
        energy: f64,
    },
}

/// The input snapshot embedded in a bundle so external runners are
/// self-contained: everything needed to perform the task is in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    pub structure: StructureSpec,
    pub driver: DriverKind,
    pub options: QmOptions,
}

/// The self-describing JSON document exchanged with external programs.
///
/// A bundle embeds its full [`TaskKey`]; filenames only carry truncated hash
/// prefixes, so the embedded key is the authority when a lookup has to decide
/// whether a file really belongs to the requested task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBundle {
    pub schema: String,
    pub key: TaskKey,
    pub label: String,
    pub status: TaskStatus,
    pub input: TaskInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskBundle {
    /// Creates the pending bundle the pipeline writes before dispatch.
    pub fn pending(descriptor: &TaskDescriptor) -> Self {
        Self {
            schema: BUNDLE_SCHEMA.to_string(),
            key: descriptor.key().clone(),
            label: descriptor.label().to_string(),
            status: TaskStatus::Pending,
            input: TaskInput {
                structure: descriptor.structure().clone(),
                driver: descriptor.driver(),
                options: descriptor.options().clone(),
            },
            output: None,
            error: None,
        }
    }

    /// Creates a completed bundle carrying an output payload.
    pub fn completed(descriptor: &TaskDescriptor, output: TaskOutput) -> Self {
        let mut bundle = Self::pending(descriptor);
        bundle.status = TaskStatus::Complete;
        bundle.output = Some(output);
        bundle
    }

    /// Creates a failed bundle carrying an error report.
    pub fn failed(descriptor: &TaskDescriptor, message: impl Into<String>) -> Self {
        let mut bundle = Self::pending(descriptor);
        bundle.status = TaskStatus::Error;
        bundle.error = Some(message.into());
        bundle
    }

    /// Returns the error report of a failed bundle, with a placeholder when
    /// the external program wrote none.
    pub fn error_message(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "external task failed without an error report".to_string())
    }

    /// Returns the output payload when this bundle is a trustworthy completion
    /// for a structure with `expected_atoms` atoms.
    ///
    /// A `Complete` bundle whose payload is missing, has the wrong shape, or
    /// contains non-finite numbers is not trusted; callers treat it like a
    /// corrupt file and recompute.
    pub fn completed_output(&self, expected_atoms: usize) -> Option<&TaskOutput> {
        if self.status != TaskStatus::Complete {
            return None;
        }
        match self.output.as_ref()? {
            output @ TaskOutput::Optimization {
                coordinates,
                energy,
            } => {
                let shape_ok = coordinates.len() == expected_atoms
                    && coordinates.iter().all(|c| c.iter().all(|v| v.is_finite()))
                    && energy.is_finite();
                shape_ok.then_some(output)
            }
            output @ TaskOutput::SinglePoint { grid, esp, energy } => {
                let shape_ok = !grid.is_empty()
                    && grid.len() == esp.len()
                    && grid.iter().all(|p| p.iter().all(|v| v.is_finite()))
                    && esp.iter().all(|v| v.is_finite())
                    && energy.is_finite();
                shape_ok.then_some(output)
            }
        }
    }

    /// Serializes the bundle as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a bundle from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> TaskDescriptor {
        let structure = StructureSpec {
            atomic_numbers: vec![8, 1, 1],
            coordinates: vec![
                [0.0, 0.0, 0.117],
                [0.0, 0.757, -0.471],
                [0.0, -0.757, -0.471],
            ],
            charge: 0,
            multiplicity: 1,
        };
        TaskDescriptor::new(structure, DriverKind::SinglePoint, QmOptions::default()).unwrap()
    }

    #[test]
    fn pending_bundle_embeds_key_and_input() {
        let d = descriptor();
        let bundle = TaskBundle::pending(&d);
        assert_eq!(bundle.schema, BUNDLE_SCHEMA);
        assert_eq!(&bundle.key, d.key());
        assert_eq!(bundle.status, TaskStatus::Pending);
        assert_eq!(bundle.input.structure.atomic_numbers, vec![8, 1, 1]);
        assert!(bundle.output.is_none());
    }

    #[test]
    fn json_round_trip_preserves_the_bundle() {
        let d = descriptor();
        let bundle = TaskBundle::completed(
            &d,
            TaskOutput::SinglePoint {
                grid: vec![[0.0, 0.0, 2.0]],
                esp: vec![0.015],
                energy: -76.02,
            },
        );
        let text = bundle.to_json().unwrap();
        let parsed = TaskBundle::from_json(&text).unwrap();
        assert_eq!(parsed, bundle);
    }

    #[test]
    fn truncated_json_fails_to_parse() {
        let d = descriptor();
        let text = TaskBundle::pending(&d).to_json().unwrap();
        let cut = &text[..text.len() / 2];
        assert!(TaskBundle::from_json(cut).is_err());
    }

    #[test]
    fn completed_output_requires_complete_status() {
        let d = descriptor();
        let bundle = TaskBundle::pending(&d);
        assert!(bundle.completed_output(3).is_none());
    }

    #[test]
    fn completed_output_checks_payload_shape() {
        let d = descriptor();

        let wrong_atoms = TaskBundle::completed(
            &d,
            TaskOutput::Optimization {
                coordinates: vec![[0.0; 3]; 2],
                energy: -76.0,
            },
        );
        assert!(wrong_atoms.completed_output(3).is_none());

        let ragged = TaskBundle::completed(
            &d,
            TaskOutput::SinglePoint {
                grid: vec![[0.0, 0.0, 2.0], [0.0, 2.0, 0.0]],
                esp: vec![0.01],
                energy: -76.0,
            },
        );
        assert!(ragged.completed_output(3).is_none());

        let nan = TaskBundle::completed(
            &d,
            TaskOutput::SinglePoint {
                grid: vec![[0.0, 0.0, 2.0]],
                esp: vec![f64::NAN],
                energy: -76.0,
            },
        );
        assert!(nan.completed_output(3).is_none());

        let good = TaskBundle::completed(
            &d,
            TaskOutput::SinglePoint {
                grid: vec![[0.0, 0.0, 2.0]],
                esp: vec![0.01],
                energy: -76.0,
            },
        );
        assert!(good.completed_output(3).is_some());
    }

    #[test]
    fn error_message_falls_back_to_placeholder() {
        let d = descriptor();
        let mut failed = TaskBundle::failed(&d, "scf did not converge");
        assert_eq!(failed.error_message(), "scf did not converge");
        failed.error = None;
        assert!(failed.error_message().contains("without an error report"));
    }
}
