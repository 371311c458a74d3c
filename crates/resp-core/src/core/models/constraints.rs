use thiserror::Error;

/// Identifies one atom within a multi-molecule fitting job.
///
/// Both indices are zero-based: `molecule` indexes into the job's molecule
/// list and `atom` indexes into that molecule's atom order. Job files use
/// one-based indices and convert on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomRef {
    /// Index of the molecule within the job.
    pub molecule: usize,
    /// Index of the atom within the molecule.
    pub atom: usize,
}

impl AtomRef {
    /// Creates an atom reference from zero-based indices.
    pub fn new(molecule: usize, atom: usize) -> Self {
        Self { molecule, atom }
    }
}

impl std::fmt::Display for AtomRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "molecule {} atom {}", self.molecule + 1, self.atom + 1)
    }
}

/// Errors raised when a constraint references atoms that do not exist or is
/// structurally degenerate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("{reference} is out of range: the job has {molecules} molecule(s)")]
    MoleculeOutOfRange {
        reference: AtomRef,
        molecules: usize,
    },
    #[error("{reference} is out of range: the molecule has {atoms} atom(s)")]
    AtomOutOfRange { reference: AtomRef, atoms: usize },
    #[error("equivalence group {group} needs at least two atoms")]
    GroupTooSmall { group: usize },
    #[error("equivalence group {group} lists {reference} more than once")]
    DuplicateInGroup { group: usize, reference: AtomRef },
    #[error("sum constraint {constraint} has no atoms")]
    EmptySum { constraint: usize },
    #[error("sum constraint {constraint} lists {reference} more than once")]
    DuplicateInSum {
        constraint: usize,
        reference: AtomRef,
    },
    #[error("sum constraint {constraint} target {target} is not finite")]
    NonFiniteTarget { constraint: usize, target: f64 },
}

/// Requires the charges of a set of atoms to add up to a fixed total.
///
/// The atoms may belong to different molecules, which is how inter-molecular
/// charge transfer is pinned down (e.g. forcing a capping group to carry zero
/// net charge).
#[derive(Debug, Clone, PartialEq)]
pub struct SumConstraint {
    /// The atoms whose charges are summed.
    pub atoms: Vec<AtomRef>,
    /// The required total charge in elementary charge units.
    pub total: f64,
}

impl SumConstraint {
    /// Creates a sum constraint over the given atoms.
    pub fn new(atoms: Vec<AtomRef>, total: f64) -> Self {
        Self { atoms, total }
    }
}

/// The validated set of charge constraints for one fitting job.
///
/// Equivalence groups force every member atom to carry the same charge and are
/// realized inside the fitting engine by variable aliasing, so equivalent
/// charges come out bit-for-bit identical. Sum constraints become Lagrange
/// rows of the augmented least-squares system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    equivalences: Vec<Vec<AtomRef>>,
    sums: Vec<SumConstraint>,
}

pub(crate) fn check_reference(
    reference: AtomRef,
    atom_counts: &[usize],
) -> Result<(), ConstraintError> {
    match atom_counts.get(reference.molecule) {
        None => Err(ConstraintError::MoleculeOutOfRange {
            reference,
            molecules: atom_counts.len(),
        }),
        Some(&atoms) if reference.atom >= atoms => {
            Err(ConstraintError::AtomOutOfRange { reference, atoms })
        }
        Some(_) => Ok(()),
    }
}

impl ConstraintSet {
    /// Creates an empty constraint set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validates and assembles a constraint set against the atom counts of the
    /// job's molecules (`atom_counts[i]` is the atom count of molecule `i`).
    ///
    /// Every referenced atom must exist, equivalence groups must have at least
    /// two distinct members, and sum constraints must be non-empty with a
    /// finite target. An atom may appear in several equivalence groups; the
    /// fitting engine merges overlapping groups into one class.
    pub fn new(
        equivalences: Vec<Vec<AtomRef>>,
        sums: Vec<SumConstraint>,
        atom_counts: &[usize],
    ) -> Result<Self, ConstraintError> {
        let set = Self { equivalences, sums };
        set.validate(atom_counts)?;
        Ok(set)
    }

    /// Re-checks this constraint set against a molecule list's atom counts.
    pub fn validate(&self, atom_counts: &[usize]) -> Result<(), ConstraintError> {
        for (group_index, group) in self.equivalences.iter().enumerate() {
            if group.len() < 2 {
                return Err(ConstraintError::GroupTooSmall { group: group_index });
            }
            let mut seen = std::collections::HashSet::new();
            for &reference in group {
                check_reference(reference, atom_counts)?;
                if !seen.insert(reference) {
                    return Err(ConstraintError::DuplicateInGroup {
                        group: group_index,
                        reference,
                    });
                }
            }
        }

        for (constraint_index, sum) in self.sums.iter().enumerate() {
            if sum.atoms.is_empty() {
                return Err(ConstraintError::EmptySum {
                    constraint: constraint_index,
                });
            }
            if !sum.total.is_finite() {
                return Err(ConstraintError::NonFiniteTarget {
                    constraint: constraint_index,
                    target: sum.total,
                });
            }
            let mut seen = std::collections::HashSet::new();
            for &reference in &sum.atoms {
                check_reference(reference, atom_counts)?;
                if !seen.insert(reference) {
                    return Err(ConstraintError::DuplicateInSum {
                        constraint: constraint_index,
                        reference,
                    });
                }
            }
        }

        Ok(())
    }

    /// Returns the equivalence groups.
    pub fn equivalences(&self) -> &[Vec<AtomRef>] {
        &self.equivalences
    }

    /// Returns the sum constraints.
    pub fn sums(&self) -> &[SumConstraint] {
        &self.sums
    }

    /// Returns `true` when the set imposes no constraints at all.
    pub fn is_empty(&self) -> bool {
        self.equivalences.is_empty() && self.sums.is_empty()
    }
}
