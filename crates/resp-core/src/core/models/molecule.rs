use super::element;
use nalgebra::Point3;

/// A scalar electrostatic-potential field sampled on a set of points in space.
///
/// Each grid point carries the quantum-mechanical potential evaluated at that
/// location, expressed in atomic units. The point coordinates are stored in
/// Angstroms, matching the molecular geometries they were generated from, and
/// are converted to Bohr only inside the fitting engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EspGrid {
    points: Vec<Point3<f64>>,
    values: Vec<f64>,
}

impl EspGrid {
    /// Creates a grid from matching point and value lists.
    ///
    /// Returns `None` when the two lists have different lengths, since a grid
    /// point without a potential value (or vice versa) is meaningless.
    ///
    /// # Arguments
    ///
    /// * `points` - Sample locations in Angstroms.
    /// * `values` - The electrostatic potential at each location, in atomic units.
    pub fn new(points: Vec<Point3<f64>>, values: Vec<f64>) -> Option<Self> {
        if points.len() == values.len() {
            Some(Self { points, values })
        } else {
            None
        }
    }

    /// Creates a grid from `(point, value)` samples.
    pub fn from_samples(samples: impl IntoIterator<Item = (Point3<f64>, f64)>) -> Self {
        let (points, values) = samples.into_iter().unzip();
        Self { points, values }
    }

    /// Returns the number of sample points in the grid.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the grid contains no sample points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the sample locations in Angstroms.
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Returns the potential values in atomic units, aligned with [`Self::points`].
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterates over `(point, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Point3<f64>, f64)> + '_ {
        self.points.iter().zip(self.values.iter().copied())
    }
}

/// One spatial arrangement of a conformer used for ESP sampling.
///
/// Orientations exist because the electrostatic potential of a rigid geometry
/// still depends on where the sample grid falls relative to the molecule;
/// fitting against several orientations averages out that placement bias.
/// Every orientation must have the same atom count and atom order as its
/// parent conformer.
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    /// Atom coordinates in Angstroms, in the parent molecule's atom order.
    pub coordinates: Vec<Point3<f64>>,
    /// The total energy reported by the ESP computation, in Hartree.
    pub energy: Option<f64>,
    /// The sampled potential field, once the ESP stage has completed.
    pub grid: Option<EspGrid>,
}

impl Orientation {
    /// Creates an orientation from coordinates, with no ESP data attached yet.
    pub fn new(coordinates: Vec<Point3<f64>>) -> Self {
        Self {
            coordinates,
            energy: None,
            grid: None,
        }
    }
}

/// One geometry of a molecule contributing to the fit.
///
/// A conformer starts out with the user-supplied coordinates. When geometry
/// optimization is enabled those coordinates are replaced in place by the
/// optimized ones before any ESP work is derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    /// Atom coordinates in Angstroms, in the parent molecule's atom order.
    pub coordinates: Vec<Point3<f64>>,
    /// The total energy reported by the optimization, in Hartree.
    pub energy: Option<f64>,
    /// Explicit ESP sampling orientations. When empty, a single orientation
    /// identical to the conformer geometry is materialized at the ESP stage.
    pub orientations: Vec<Orientation>,
}

impl Conformer {
    /// Creates a conformer from coordinates, with no explicit orientations.
    pub fn new(coordinates: Vec<Point3<f64>>) -> Self {
        Self {
            coordinates,
            energy: None,
            orientations: Vec::new(),
        }
    }

    /// Creates a conformer with explicit ESP sampling orientations.
    pub fn with_orientations(
        coordinates: Vec<Point3<f64>>,
        orientations: Vec<Orientation>,
    ) -> Self {
        Self {
            coordinates,
            energy: None,
            orientations,
        }
    }
}

/// A molecule whose atoms receive one fitted charge each.
///
/// All conformers and orientations of a molecule share the same atoms in the
/// same order; only the coordinates differ. The ESP equations of every
/// orientation accumulate into the same per-atom unknowns, so a molecule with
/// many conformers still yields a single charge set.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    /// The atomic number of each atom, defining atom count and order.
    pub atomic_numbers: Vec<u8>,
    /// The net molecular charge in elementary charge units.
    pub charge: i32,
    /// The spin multiplicity (2S + 1).
    pub multiplicity: u32,
    /// Relative weight of this molecule's equations in a multi-molecule fit.
    pub weight: f64,
    /// The geometries contributing to the fit.
    pub conformers: Vec<Conformer>,
}

impl Molecule {
    /// Creates a molecule with unit weight and no conformers.
    ///
    /// # Arguments
    ///
    /// * `atomic_numbers` - One entry per atom, fixing atom count and order.
    /// * `charge` - The net molecular charge.
    /// * `multiplicity` - The spin multiplicity (2S + 1).
    pub fn new(atomic_numbers: Vec<u8>, charge: i32, multiplicity: u32) -> Self {
        Self {
            atomic_numbers,
            charge,
            multiplicity,
            weight: 1.0,
            conformers: Vec::new(),
        }
    }

    /// Returns the number of atoms in the molecule.
    pub fn atom_count(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// Returns the molecular formula in Hill order (e.g. `C2H6O`).
    pub fn formula(&self) -> String {
        element::hill_formula(&self.atomic_numbers)
    }

    /// Returns `true` when the given atom is a hydrogen.
    pub fn is_hydrogen(&self, atom: usize) -> bool {
        self.atomic_numbers.get(atom) == Some(&element::HYDROGEN)
    }
}
