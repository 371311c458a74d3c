//! Declarative TOML job descriptions.
//!
//! A job file names the molecules (element symbols, conformer geometries,
//! optional explicit orientations), the constraints coupling their charges,
//! and the method and fit settings. Loading parses and validates the whole
//! document in one step; atom references in the file are 1-based and are
//! converted to the library's 0-based [`AtomRef`] convention here.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::core::fitting::options::RespOptions;
use crate::core::models::constraints::{AtomRef, ConstraintError, ConstraintSet, SumConstraint};
use crate::core::models::element;
use crate::core::models::molecule::{Conformer, Molecule, Orientation};
use crate::core::qm::options::QmOptions;
use crate::engine::config::{ConfigError, JobConfig, JobConfigBuilder};
use nalgebra::Point3;

/// Errors arising while loading a job file.
#[derive(Debug, Error)]
pub enum JobFileError {
    #[error("failed to read job file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse job file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("molecule {molecule} uses an unknown element symbol '{symbol}'")]
    UnknownElement { molecule: usize, symbol: String },
    #[error(
        "molecule {molecule} conformer {conformer} lists {coordinates} coordinate triple(s) for {atoms} atom(s)"
    )]
    GeometryMismatch {
        molecule: usize,
        conformer: usize,
        atoms: usize,
        coordinates: usize,
    },
    #[error("atom reference [{molecule}, {atom}] has a zero index; job-file references are 1-based")]
    ZeroReference { molecule: usize, atom: usize },
    #[error(transparent)]
    Constraints(#[from] ConstraintError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobFile {
    optimize_geometry: Option<bool>,
    executable: Option<String>,
    molecules: Vec<FileMolecule>,
    constraints: Option<FileConstraints>,
    fit: Option<FileFit>,
    optimization: Option<QmOptions>,
    single_point: Option<QmOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileMolecule {
    elements: Vec<String>,
    #[serde(default)]
    charge: i32,
    #[serde(default = "default_multiplicity")]
    multiplicity: u32,
    #[serde(default = "default_weight")]
    weight: f64,
    conformers: Vec<FileConformer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConformer {
    coordinates: Vec<[f64; 3]>,
    #[serde(default)]
    orientations: Vec<Vec<[f64; 3]>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConstraints {
    #[serde(default)]
    equivalences: Vec<Vec<[usize; 2]>>,
    #[serde(default)]
    sums: Vec<FileSum>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSum {
    atoms: Vec<[usize; 2]>,
    total: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileFit {
    restraint_height_stage1: Option<f64>,
    restraint_height_stage2: Option<f64>,
    restraint_slope: Option<f64>,
    exclude_hydrogens: Option<bool>,
    constrain_net_charge: Option<bool>,
    two_stage: Option<bool>,
    stage2_atoms: Option<Vec<[usize; 2]>>,
    convergence_tolerance: Option<f64>,
    max_iterations: Option<usize>,
}

fn default_multiplicity() -> u32 {
    1
}

fn default_weight() -> f64 {
    1.0
}

impl FileFit {
    fn into_options(self) -> Result<RespOptions, JobFileError> {
        let defaults = RespOptions::default();
        let stage2_atoms = match self.stage2_atoms {
            Some(pairs) => pairs
                .into_iter()
                .map(atom_ref)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.stage2_atoms,
        };
        Ok(RespOptions {
            restraint_height_stage1: self
                .restraint_height_stage1
                .unwrap_or(defaults.restraint_height_stage1),
            restraint_height_stage2: self
                .restraint_height_stage2
                .unwrap_or(defaults.restraint_height_stage2),
            restraint_slope: self.restraint_slope.unwrap_or(defaults.restraint_slope),
            exclude_hydrogens: self
                .exclude_hydrogens
                .unwrap_or(defaults.exclude_hydrogens),
            constrain_net_charge: self
                .constrain_net_charge
                .unwrap_or(defaults.constrain_net_charge),
            two_stage: self.two_stage.unwrap_or(defaults.two_stage),
            stage2_atoms,
            convergence_tolerance: self
                .convergence_tolerance
                .unwrap_or(defaults.convergence_tolerance),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        })
    }
}

/// A fully validated job loaded from a TOML description.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub molecules: Vec<Molecule>,
    pub constraints: ConstraintSet,
    pub config: JobConfig,
}

impl JobSpec {
    /// Reads and parses a job file from disk.
    pub fn load(path: &Path) -> Result<Self, JobFileError> {
        debug!("Loading job description from {:?}.", path);
        let text = std::fs::read_to_string(path).map_err(|source| JobFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses a job description from TOML text.
    ///
    /// Element symbols are resolved to atomic numbers, geometries are checked
    /// against the declared atom counts, and 1-based atom references are
    /// converted and validated against the molecules they name.
    pub fn parse(text: &str) -> Result<Self, JobFileError> {
        let file: JobFile = toml::from_str(text)?;

        let mut molecules = Vec::with_capacity(file.molecules.len());
        for (index, entry) in file.molecules.into_iter().enumerate() {
            molecules.push(build_molecule(index, entry)?);
        }
        let atom_counts: Vec<usize> = molecules.iter().map(Molecule::atom_count).collect();

        let constraints = match file.constraints {
            Some(section) => build_constraints(section, &atom_counts)?,
            None => ConstraintSet::empty(),
        };

        let resp = file.fit.unwrap_or_default().into_options()?;
        let mut builder = JobConfigBuilder::new().resp(resp);
        if let Some(enabled) = file.optimize_geometry {
            builder = builder.optimize_geometry(enabled);
        }
        if let Some(executable) = file.executable {
            builder = builder.executable(executable);
        }
        if let Some(options) = file.optimization {
            builder = builder.optimization(options);
        }
        if let Some(options) = file.single_point {
            builder = builder.single_point(options);
        }
        let config = builder.build()?;

        Ok(Self {
            molecules,
            constraints,
            config,
        })
    }
}

fn build_molecule(index: usize, entry: FileMolecule) -> Result<Molecule, JobFileError> {
    let mut numbers = Vec::with_capacity(entry.elements.len());
    for symbol in &entry.elements {
        let number =
            element::atomic_number(symbol).ok_or_else(|| JobFileError::UnknownElement {
                molecule: index + 1,
                symbol: symbol.clone(),
            })?;
        numbers.push(number);
    }

    let mut molecule = Molecule::new(numbers, entry.charge, entry.multiplicity);
    molecule.weight = entry.weight;
    for (position, conformer) in entry.conformers.into_iter().enumerate() {
        let mismatch = |coordinates: usize| JobFileError::GeometryMismatch {
            molecule: index + 1,
            conformer: position + 1,
            atoms: molecule.atom_count(),
            coordinates,
        };
        if conformer.coordinates.len() != molecule.atom_count() {
            return Err(mismatch(conformer.coordinates.len()));
        }
        let coordinates = to_points(&conformer.coordinates);
        if conformer.orientations.is_empty() {
            molecule.conformers.push(Conformer::new(coordinates));
        } else {
            let mut orientations = Vec::with_capacity(conformer.orientations.len());
            for orientation in &conformer.orientations {
                if orientation.len() != molecule.atom_count() {
                    return Err(mismatch(orientation.len()));
                }
                orientations.push(Orientation::new(to_points(orientation)));
            }
            molecule
                .conformers
                .push(Conformer::with_orientations(coordinates, orientations));
        }
    }
    Ok(molecule)
}

fn build_constraints(
    section: FileConstraints,
    atom_counts: &[usize],
) -> Result<ConstraintSet, JobFileError> {
    let mut equivalences = Vec::with_capacity(section.equivalences.len());
    for group in section.equivalences {
        equivalences.push(
            group
                .into_iter()
                .map(atom_ref)
                .collect::<Result<Vec<_>, _>>()?,
        );
    }
    let mut sums = Vec::with_capacity(section.sums.len());
    for sum in section.sums {
        let atoms = sum
            .atoms
            .into_iter()
            .map(atom_ref)
            .collect::<Result<Vec<_>, _>>()?;
        sums.push(SumConstraint::new(atoms, sum.total));
    }
    Ok(ConstraintSet::new(equivalences, sums, atom_counts)?)
}

fn atom_ref(pair: [usize; 2]) -> Result<AtomRef, JobFileError> {
    let [molecule, atom] = pair;
    if molecule == 0 || atom == 0 {
        return Err(JobFileError::ZeroReference { molecule, atom });
    }
    Ok(AtomRef::new(molecule - 1, atom - 1))
}

fn to_points(triples: &[[f64; 3]]) -> Vec<Point3<f64>> {
    triples
        .iter()
        .map(|&[x, y, z]| Point3::new(x, y, z))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const WATER_JOB: &str = r#"
        [[molecules]]
        elements = ["O", "H", "H"]

        [[molecules.conformers]]
        coordinates = [
            [0.0, 0.0, 0.117],
            [0.0, 0.757, -0.468],
            [0.0, -0.757, -0.468],
        ]
    "#;

    #[test]
    fn parses_a_minimal_water_job() {
        let spec = JobSpec::parse(WATER_JOB).unwrap();

        assert_eq!(spec.molecules.len(), 1);
        let water = &spec.molecules[0];
        assert_eq!(water.atomic_numbers, vec![8, 1, 1]);
        assert_eq!(water.charge, 0);
        assert_eq!(water.multiplicity, 1);
        assert_eq!(water.weight, 1.0);
        assert_eq!(water.conformers.len(), 1);
        assert_eq!(water.conformers[0].coordinates.len(), 3);
        assert!(water.conformers[0].orientations.is_empty());

        assert!(spec.constraints.equivalences().is_empty());
        assert!(spec.constraints.sums().is_empty());

        assert!(spec.config.optimize_geometry);
        assert_eq!(spec.config.executable, "psi4");
        assert_eq!(spec.config.resp, RespOptions::default());
    }

    #[test]
    fn top_level_settings_override_the_defaults() {
        let text = r#"
            optimize_geometry = false
            executable = "orca"

            [[molecules]]
            elements = ["O"]
            charge = -2
            multiplicity = 3
            weight = 2.5

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0]]

            [optimization]
            method = "b3lyp"

            [single_point]
            basis = "cc-pvtz"
            solvent = "water"
        "#;
        let spec = JobSpec::parse(text).unwrap();

        assert!(!spec.config.optimize_geometry);
        assert_eq!(spec.config.executable, "orca");
        assert_eq!(spec.config.optimization.method, "b3lyp");
        assert_eq!(spec.config.optimization.basis, QmOptions::default().basis);
        assert_eq!(spec.config.single_point.basis, "cc-pvtz");
        assert_eq!(spec.config.single_point.solvent.as_deref(), Some("water"));

        let oxide = &spec.molecules[0];
        assert_eq!(oxide.charge, -2);
        assert_eq!(oxide.multiplicity, 3);
        assert_eq!(oxide.weight, 2.5);
    }

    #[test]
    fn converts_one_based_constraint_references() {
        let text = r#"
            [[molecules]]
            elements = ["O", "H", "H"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.117], [0.0, 0.757, -0.468], [0.0, -0.757, -0.468]]

            [constraints]
            equivalences = [[[1, 2], [1, 3]]]

            [[constraints.sums]]
            atoms = [[1, 1]]
            total = -0.8
        "#;
        let spec = JobSpec::parse(text).unwrap();

        assert_eq!(
            spec.constraints.equivalences(),
            &[vec![AtomRef::new(0, 1), AtomRef::new(0, 2)]]
        );
        assert_eq!(spec.constraints.sums().len(), 1);
        assert_eq!(spec.constraints.sums()[0].atoms, vec![AtomRef::new(0, 0)]);
        assert_eq!(spec.constraints.sums()[0].total, -0.8);
    }

    #[test]
    fn fit_section_designates_stage_two_atoms() {
        let text = r#"
            [[molecules]]
            elements = ["C", "H", "H", "H", "H"]

            [[molecules.conformers]]
            coordinates = [
                [0.0, 0.0, 0.0],
                [0.629, 0.629, 0.629],
                [-0.629, -0.629, 0.629],
                [-0.629, 0.629, -0.629],
                [0.629, -0.629, -0.629],
            ]

            [fit]
            restraint_height_stage2 = 0.002
            stage2_atoms = [[1, 1], [1, 2], [1, 3], [1, 4], [1, 5]]
            max_iterations = 50
        "#;
        let spec = JobSpec::parse(text).unwrap();

        let resp = &spec.config.resp;
        assert_eq!(resp.restraint_height_stage2, 0.002);
        assert_eq!(resp.max_iterations, 50);
        assert_eq!(resp.restraint_slope, RespOptions::default().restraint_slope);
        assert_eq!(resp.stage2_atoms.len(), 5);
        assert_eq!(resp.stage2_atoms[0], AtomRef::new(0, 0));
        assert_eq!(resp.stage2_atoms[4], AtomRef::new(0, 4));
    }

    #[test]
    fn parses_explicit_orientations() {
        let text = r#"
            [[molecules]]
            elements = ["H", "Cl"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0], [0.0, 0.0, 1.27]]
            orientations = [
                [[0.0, 0.0, 0.0], [0.0, 0.0, 1.27]],
                [[0.0, 0.0, 1.27], [0.0, 0.0, 0.0]],
            ]
        "#;
        let spec = JobSpec::parse(text).unwrap();

        let conformer = &spec.molecules[0].conformers[0];
        assert_eq!(conformer.orientations.len(), 2);
        assert_eq!(conformer.orientations[1].coordinates[0].z, 1.27);
    }

    #[test]
    fn rejects_unknown_element_symbols() {
        let text = r#"
            [[molecules]]
            elements = ["Xx"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0]]
        "#;
        let error = JobSpec::parse(text).unwrap_err();
        assert!(matches!(
            error,
            JobFileError::UnknownElement { molecule: 1, ref symbol } if symbol == "Xx"
        ));
    }

    #[test]
    fn rejects_geometry_with_the_wrong_atom_count() {
        let text = r#"
            [[molecules]]
            elements = ["O", "H", "H"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0], [0.0, 0.757, -0.468]]
        "#;
        let error = JobSpec::parse(text).unwrap_err();
        assert!(matches!(
            error,
            JobFileError::GeometryMismatch {
                molecule: 1,
                conformer: 1,
                atoms: 3,
                coordinates: 2,
            }
        ));
    }

    #[test]
    fn rejects_zero_indexed_references() {
        let text = r#"
            [[molecules]]
            elements = ["O", "H", "H"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.117], [0.0, 0.757, -0.468], [0.0, -0.757, -0.468]]

            [constraints]
            equivalences = [[[1, 0], [1, 2]]]
        "#;
        let error = JobSpec::parse(text).unwrap_err();
        assert!(matches!(
            error,
            JobFileError::ZeroReference {
                molecule: 1,
                atom: 0
            }
        ));
    }

    #[test]
    fn rejects_references_beyond_the_declared_atoms() {
        let text = r#"
            [[molecules]]
            elements = ["O", "H", "H"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.117], [0.0, 0.757, -0.468], [0.0, -0.757, -0.468]]

            [constraints]
            equivalences = [[[1, 3], [1, 4]]]
        "#;
        let error = JobSpec::parse(text).unwrap_err();
        assert!(matches!(error, JobFileError::Constraints(_)));
    }

    #[test]
    fn rejects_unknown_keys() {
        let text = r#"
            [[molecules]]
            elements = ["O"]
            multiplicty = 1

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0]]
        "#;
        assert!(matches!(
            JobSpec::parse(text),
            Err(JobFileError::Parse(_))
        ));
    }

    #[test]
    fn rejects_invalid_settings() {
        let text = r#"
            executable = ""

            [[molecules]]
            elements = ["O"]

            [[molecules.conformers]]
            coordinates = [[0.0, 0.0, 0.0]]
        "#;
        assert!(matches!(
            JobSpec::parse(text),
            Err(JobFileError::Config(_))
        ));
    }

    #[test]
    fn loads_a_job_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WATER_JOB.as_bytes()).unwrap();

        let spec = JobSpec::load(file.path()).unwrap();
        assert_eq!(spec.molecules[0].formula(), "H2O");
    }

    #[test]
    fn reports_unreadable_files() {
        let error = JobSpec::load(Path::new("/nonexistent/job.toml")).unwrap_err();
        assert!(matches!(error, JobFileError::Read { .. }));
    }
}
