use super::{BOHR_RADIUS_ANGSTROM, FitError};
use crate::core::models::molecule::{EspGrid, Molecule};
use nalgebra::{DMatrix, DVector, Point3};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

// Physical grids never sample on top of a nucleus; anything closer than this
// is corrupt input, not geometry.
const MIN_GRID_DISTANCE_BOHR: f64 = 1e-8;

/// One molecule's contribution to the normal equations, accumulated over all
/// of its orientations: `a[j][k] = sum_p w^2 / (r_pj r_pk)`,
/// `b[j] = sum_p w^2 V_p / r_pj`, and the weighted ESP norm `sum_p w^2 V_p^2`
/// used for the relative RMS diagnostic.
#[derive(Debug, Clone)]
pub(crate) struct MoleculeBlock {
    pub a: DMatrix<f64>,
    pub b: DVector<f64>,
    pub esp_norm: f64,
}

struct Accumulator {
    a: DMatrix<f64>,
    b: DVector<f64>,
    esp_norm: f64,
    inv_r: Vec<f64>,
}

impl Accumulator {
    fn zeros(atoms: usize) -> Self {
        Self {
            a: DMatrix::zeros(atoms, atoms),
            b: DVector::zeros(atoms),
            esp_norm: 0.0,
            inv_r: vec![0.0; atoms],
        }
    }

    fn absorb(
        &mut self,
        molecule: usize,
        point_index: usize,
        atoms_bohr: &[Point3<f64>],
        point: &Point3<f64>,
        value: f64,
        weight_sq: f64,
    ) -> Result<(), FitError> {
        let point_bohr = scale_to_bohr(point);
        for (atom, position) in atoms_bohr.iter().enumerate() {
            let distance = (point_bohr - position).norm();
            if distance < MIN_GRID_DISTANCE_BOHR {
                return Err(FitError::CoincidentGridPoint {
                    molecule,
                    point: point_index,
                    atom,
                });
            }
            self.inv_r[atom] = 1.0 / distance;
        }

        // Upper triangle only; mirrored once at the end.
        let atoms = self.inv_r.len();
        for j in 0..atoms {
            self.b[j] += weight_sq * value * self.inv_r[j];
            for k in j..atoms {
                self.a[(j, k)] += weight_sq * self.inv_r[j] * self.inv_r[k];
            }
        }
        self.esp_norm += weight_sq * value * value;
        Ok(())
    }

    fn merge(mut self, other: Self) -> Self {
        self.a += other.a;
        self.b += other.b;
        self.esp_norm += other.esp_norm;
        self
    }

    fn into_block(mut self) -> MoleculeBlock {
        let atoms = self.inv_r.len();
        for j in 0..atoms {
            for k in 0..j {
                self.a[(j, k)] = self.a[(k, j)];
            }
        }
        MoleculeBlock {
            a: self.a,
            b: self.b,
            esp_norm: self.esp_norm,
        }
    }
}

pub(crate) fn scale_to_bohr(point: &Point3<f64>) -> Point3<f64> {
    Point3::from(point.coords / BOHR_RADIUS_ANGSTROM)
}

fn grid_accumulator(
    molecule: usize,
    atoms_bohr: &[Point3<f64>],
    grid: &EspGrid,
    weight_sq: f64,
) -> Result<Accumulator, FitError> {
    let atoms = atoms_bohr.len();

    #[cfg(feature = "parallel")]
    {
        grid.points()
            .par_iter()
            .zip(grid.values().par_iter())
            .enumerate()
            .try_fold(
                || Accumulator::zeros(atoms),
                |mut acc, (point_index, (point, &value))| {
                    acc.absorb(molecule, point_index, atoms_bohr, point, value, weight_sq)?;
                    Ok(acc)
                },
            )
            .try_reduce(
                || Accumulator::zeros(atoms),
                |left, right| Ok(left.merge(right)),
            )
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut acc = Accumulator::zeros(atoms);
        for (point_index, (point, value)) in grid.iter().enumerate() {
            acc.absorb(molecule, point_index, atoms_bohr, point, value, weight_sq)?;
        }
        Ok(acc)
    }
}

/// Accumulates the normal-equation block of one molecule over every
/// orientation of every conformer.
pub(crate) fn molecule_block(
    molecule_index: usize,
    molecule: &Molecule,
) -> Result<MoleculeBlock, FitError> {
    let atoms = molecule.atom_count();
    let weight_sq = molecule.weight * molecule.weight;
    let mut total = Accumulator::zeros(atoms);

    for (conformer_index, conformer) in molecule.conformers.iter().enumerate() {
        if conformer.orientations.is_empty() {
            return Err(FitError::NoEspData {
                molecule: molecule_index,
                conformer: conformer_index,
            });
        }
        for (orientation_index, orientation) in conformer.orientations.iter().enumerate() {
            let grid = orientation
                .grid
                .as_ref()
                .filter(|grid| !grid.is_empty())
                .ok_or(FitError::MissingEsp {
                    molecule: molecule_index,
                    conformer: conformer_index,
                    orientation: orientation_index,
                })?;
            let atoms_bohr: Vec<Point3<f64>> =
                orientation.coordinates.iter().map(scale_to_bohr).collect();
            let acc = grid_accumulator(molecule_index, &atoms_bohr, grid, weight_sq)?;
            total = total.merge(acc);
        }
    }

    Ok(total.into_block())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::{Conformer, Orientation};

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    // Two atoms on the z axis, one grid point between them, with distances of
    // exactly 1 and 2 Bohr so the matrix entries come out by hand.
    fn simple_molecule(weight: f64) -> Molecule {
        let b = BOHR_RADIUS_ANGSTROM;
        let coordinates = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 3.0 * b),
        ];
        let mut orientation = Orientation::new(coordinates.clone());
        orientation.grid = EspGrid::new(vec![Point3::new(0.0, 0.0, b)], vec![0.5]);
        let mut molecule = Molecule::new(vec![1, 1], 0, 1);
        molecule.weight = weight;
        molecule
            .conformers
            .push(Conformer::with_orientations(coordinates, vec![orientation]));
        molecule
    }

    #[test]
    fn block_entries_match_hand_computed_values() {
        let block = molecule_block(0, &simple_molecule(1.0)).unwrap();
        assert!(f64_approx_equal(block.a[(0, 0)], 1.0));
        assert!(f64_approx_equal(block.a[(0, 1)], 0.5));
        assert!(f64_approx_equal(block.a[(1, 0)], 0.5));
        assert!(f64_approx_equal(block.a[(1, 1)], 0.25));
        assert!(f64_approx_equal(block.b[0], 0.5));
        assert!(f64_approx_equal(block.b[1], 0.25));
        assert!(f64_approx_equal(block.esp_norm, 0.25));
    }

    #[test]
    fn molecule_weight_scales_quadratically() {
        let unit = molecule_block(0, &simple_molecule(1.0)).unwrap();
        let tripled = molecule_block(0, &simple_molecule(3.0)).unwrap();
        assert!(f64_approx_equal(tripled.a[(0, 0)], 9.0 * unit.a[(0, 0)]));
        assert!(f64_approx_equal(tripled.b[1], 9.0 * unit.b[1]));
        assert!(f64_approx_equal(tripled.esp_norm, 9.0 * unit.esp_norm));
    }

    #[test]
    fn orientations_accumulate_into_one_block() {
        let mut molecule = simple_molecule(1.0);
        let orientation = molecule.conformers[0].orientations[0].clone();
        molecule.conformers[0].orientations.push(orientation);
        let single = molecule_block(0, &simple_molecule(1.0)).unwrap();
        let double = molecule_block(0, &molecule).unwrap();
        assert!(f64_approx_equal(double.a[(0, 0)], 2.0 * single.a[(0, 0)]));
        assert!(f64_approx_equal(double.b[0], 2.0 * single.b[0]));
    }

    #[test]
    fn conformer_without_orientations_is_rejected() {
        let mut molecule = simple_molecule(1.0);
        molecule.conformers.push(Conformer::new(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ]));
        assert!(matches!(
            molecule_block(0, &molecule).unwrap_err(),
            FitError::NoEspData {
                molecule: 0,
                conformer: 1
            }
        ));
    }

    #[test]
    fn orientation_without_grid_is_rejected() {
        let mut molecule = simple_molecule(1.0);
        molecule.conformers[0].orientations[0].grid = None;
        assert!(matches!(
            molecule_block(0, &molecule).unwrap_err(),
            FitError::MissingEsp {
                molecule: 0,
                conformer: 0,
                orientation: 0
            }
        ));
    }

    #[test]
    fn empty_grid_counts_as_missing_esp() {
        let mut molecule = simple_molecule(1.0);
        molecule.conformers[0].orientations[0].grid = EspGrid::new(vec![], vec![]);
        assert!(matches!(
            molecule_block(0, &molecule).unwrap_err(),
            FitError::MissingEsp { .. }
        ));
    }

    #[test]
    fn grid_point_on_an_atom_is_rejected() {
        let mut molecule = simple_molecule(1.0);
        molecule.conformers[0].orientations[0].grid =
            EspGrid::new(vec![Point3::new(0.0, 0.0, 0.0)], vec![0.1]);
        assert!(matches!(
            molecule_block(0, &molecule).unwrap_err(),
            FitError::CoincidentGridPoint {
                molecule: 0,
                point: 0,
                atom: 0
            }
        ));
    }
}
