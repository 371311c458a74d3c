use super::hashing::{
    ContentHash, canonical_coordinate, canonical_float, canonical_keyword,
};
use super::options::{DriverKind, QmOptions};
use crate::core::models::element;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Errors raised when a task's structure or options fail validation.
///
/// Validation happens before hashing: a descriptor is only ever created from
/// data that can be canonically serialized, so every descriptor has a key.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TaskError {
    #[error("structure has no atoms")]
    EmptyStructure,
    #[error("atomic number {number} of atom {atom} is not a supported element")]
    UnknownElement { atom: usize, number: u8 },
    #[error("structure has {atoms} atom(s) but {coordinates} coordinate(s)")]
    CoordinateCountMismatch { atoms: usize, coordinates: usize },
    #[error("atom {atom} has a non-finite coordinate")]
    NonFiniteCoordinate { atom: usize },
    #[error("spin multiplicity must be at least 1")]
    ZeroMultiplicity,
    #[error("method must not be empty")]
    EmptyMethod,
    #[error("basis must not be empty")]
    EmptyBasis,
    #[error("solvent name must not be empty when present")]
    EmptySolvent,
    #[error("scf convergence must be finite and positive, got {value}")]
    InvalidConvergence { value: f64 },
}

/// The structural half of a task: everything the external program needs to
/// know about the molecule itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSpec {
    /// The atomic number of each atom.
    pub atomic_numbers: Vec<u8>,
    /// Cartesian coordinates in Angstroms, one `[x, y, z]` triple per atom.
    pub coordinates: Vec<[f64; 3]>,
    /// The net molecular charge in elementary charge units.
    pub charge: i32,
    /// The spin multiplicity (2S + 1).
    pub multiplicity: u32,
}

impl StructureSpec {
    /// Builds a structure spec from model-layer coordinates.
    pub fn from_points(
        atomic_numbers: &[u8],
        coordinates: &[Point3<f64>],
        charge: i32,
        multiplicity: u32,
    ) -> Self {
        Self {
            atomic_numbers: atomic_numbers.to_vec(),
            coordinates: coordinates.iter().map(|p| [p.x, p.y, p.z]).collect(),
            charge,
            multiplicity,
        }
    }
}

/// The content address of a task: a structure hash plus an options hash.
///
/// Keeping the two halves separate means a method change produces a new key
/// while leaving the structure hash (and anything derived from it) untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    /// Hash of the canonical structure text.
    pub structure: ContentHash,
    /// Hash of the canonical driver-plus-options text.
    pub options: ContentHash,
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.structure.short(), self.options.short())
    }
}

/// An immutable description of one unit of external computation.
///
/// A descriptor snapshots its inputs at construction: the structure is copied
/// and the [`TaskKey`] is computed exactly once, so later mutation of the
/// molecule it was derived from cannot silently change the task's identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescriptor {
    structure: StructureSpec,
    driver: DriverKind,
    options: QmOptions,
    label: String,
    key: TaskKey,
}

impl TaskDescriptor {
    /// Validates the inputs, derives the human-readable label from the
    /// molecular formula, and computes the content key.
    pub fn new(
        structure: StructureSpec,
        driver: DriverKind,
        options: QmOptions,
    ) -> Result<Self, TaskError> {
        validate_structure(&structure)?;
        validate_options(&options)?;
        let label = element::hill_formula(&structure.atomic_numbers);
        let key = TaskKey {
            structure: ContentHash::of(&canonical_structure_text(&structure)),
            options: ContentHash::of(&canonical_options_text(driver, &options)),
        };
        Ok(Self {
            structure,
            driver,
            options,
            label,
            key,
        })
    }

    /// Returns the structural input of the task.
    pub fn structure(&self) -> &StructureSpec {
        &self.structure
    }

    /// Returns the driver kind.
    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    /// Returns the method options.
    pub fn options(&self) -> &QmOptions {
        &self.options
    }

    /// Returns the formula-derived label used in filenames and logs.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the content key computed at construction.
    pub fn key(&self) -> &TaskKey {
        &self.key
    }
}

fn validate_structure(structure: &StructureSpec) -> Result<(), TaskError> {
    if structure.atomic_numbers.is_empty() {
        return Err(TaskError::EmptyStructure);
    }
    if structure.coordinates.len() != structure.atomic_numbers.len() {
        return Err(TaskError::CoordinateCountMismatch {
            atoms: structure.atomic_numbers.len(),
            coordinates: structure.coordinates.len(),
        });
    }
    for (atom, &number) in structure.atomic_numbers.iter().enumerate() {
        if element::symbol(number).is_none() {
            return Err(TaskError::UnknownElement { atom, number });
        }
    }
    for (atom, triple) in structure.coordinates.iter().enumerate() {
        if triple.iter().any(|c| !c.is_finite()) {
            return Err(TaskError::NonFiniteCoordinate { atom });
        }
    }
    if structure.multiplicity == 0 {
        return Err(TaskError::ZeroMultiplicity);
    }
    Ok(())
}

fn validate_options(options: &QmOptions) -> Result<(), TaskError> {
    if options.method.trim().is_empty() {
        return Err(TaskError::EmptyMethod);
    }
    if options.basis.trim().is_empty() {
        return Err(TaskError::EmptyBasis);
    }
    if let Some(solvent) = &options.solvent {
        if solvent.trim().is_empty() {
            return Err(TaskError::EmptySolvent);
        }
    }
    if !options.scf_convergence.is_finite() || options.scf_convergence <= 0.0 {
        return Err(TaskError::InvalidConvergence {
            value: options.scf_convergence,
        });
    }
    Ok(())
}

// Field order is fixed and part of the format: reordering either function
// changes every hash ever computed.
fn canonical_structure_text(structure: &StructureSpec) -> String {
    let mut text = String::new();
    let _ = write!(
        text,
        "charge:{};multiplicity:{};atoms:",
        structure.charge, structure.multiplicity
    );
    for (&number, triple) in structure
        .atomic_numbers
        .iter()
        .zip(structure.coordinates.iter())
    {
        let _ = write!(
            text,
            "{},{},{},{};",
            number,
            canonical_coordinate(triple[0]),
            canonical_coordinate(triple[1]),
            canonical_coordinate(triple[2]),
        );
    }
    text
}

fn canonical_options_text(driver: DriverKind, options: &QmOptions) -> String {
    format!(
        "basis:{};driver:{};method:{};scf_convergence:{};solvent:{}",
        canonical_keyword(&options.basis),
        driver.stage_name(),
        canonical_keyword(&options.method),
        canonical_float(options.scf_convergence),
        options
            .solvent
            .as_deref()
            .map(canonical_keyword)
            .unwrap_or_default(),
    )
}
