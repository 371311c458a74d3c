//! # Charge Fitting Module
//!
//! The numerical core: fitting atomic point charges to reproduce sampled
//! electrostatic potentials.
//!
//! ## Overview
//!
//! The fit minimizes the weighted squared deviation between the quantum
//! potential and the point-charge model potential over every grid point of
//! every orientation, subject to linear equality constraints. A hyperbolic
//! restraint pulls statistically ill-determined charges toward zero; because
//! the restraint is non-linear in the charges, the normal equations are
//! re-linearized about the current estimate and solved repeatedly until the
//! charges stop moving.
//!
//! Equivalence constraints are realized by variable aliasing: all atoms of an
//! equivalence class share one unknown, so their fitted charges are identical
//! down to the last bit. Sum constraints become Lagrange rows of an augmented
//! (KKT) system.
//!
//! ## Key Components
//!
//! - [`options`] - Fit options: restraint strengths, stage control, tolerances
//! - [`restraint`] - The hyperbolic penalty and its linearized diagonal weight
//! - [`matrix`] - Accumulation of normal-equation blocks from ESP grids
//! - [`solver`] - Constraint reduction, the iteration loop, and the fit report

pub(crate) mod matrix;
pub mod options;
pub mod restraint;
pub mod solver;

use crate::core::models::constraints::ConstraintError;
use thiserror::Error;

/// One Bohr radius in Angstroms (CODATA 2010, the value shared by the
/// external programs this pipeline drives).
pub const BOHR_RADIUS_ANGSTROM: f64 = 0.52917721092;

/// Errors raised by the charge-fitting engine.
///
/// Note that failure to converge is deliberately *not* an error: the fit
/// returns its best estimate with a convergence flag instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("no molecules to fit")]
    NoMolecules,
    #[error("molecule {molecule} has no atoms")]
    EmptyMolecule { molecule: usize },
    #[error("molecule {molecule} has no conformers")]
    NoConformers { molecule: usize },
    #[error("molecule {molecule} has a non-positive weight {weight}")]
    InvalidWeight { molecule: usize, weight: f64 },
    #[error("molecule {molecule} conformer {conformer} has no orientations with ESP data")]
    NoEspData { molecule: usize, conformer: usize },
    #[error(
        "molecule {molecule} conformer {conformer} orientation {orientation} has no ESP grid"
    )]
    MissingEsp {
        molecule: usize,
        conformer: usize,
        orientation: usize,
    },
    #[error("grid point {point} of molecule {molecule} coincides with atom {atom}")]
    CoincidentGridPoint {
        molecule: usize,
        point: usize,
        atom: usize,
    },
    #[error("invalid fit options: {reason}")]
    InvalidOptions { reason: String },
    #[error("charge constraints are linearly dependent: {}", offenders.join("; "))]
    DependentConstraints { offenders: Vec<String> },
    #[error("{origin} involves only frozen atoms and misses its target by {residual:.3e}")]
    FrozenConstraintConflict { origin: String, residual: f64 },
    #[error("equivalence group {group} spans frozen atoms with differing charges")]
    FrozenEquivalenceConflict { group: usize },
    #[error("the augmented least-squares system is singular")]
    SingularSystem,
    #[error(transparent)]
    Constraints(#[from] ConstraintError),
}
