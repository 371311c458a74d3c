use super::matrix;
use super::options::RespOptions;
use super::restraint::restraint_weight;
use super::FitError;
use crate::core::models::constraints::{AtomRef, ConstraintSet, check_reference};
use crate::core::models::molecule::Molecule;
use nalgebra::{DMatrix, DVector};
use std::collections::HashMap;
use tracing::{debug, warn};

// Rank decisions and frozen-target consistency are made against these
// thresholds; constraint coefficients are small integers, so there is a lot
// of headroom.
const RANK_TOLERANCE: f64 = 1e-10;
const FROZEN_TARGET_TOLERANCE: f64 = 1e-8;
const FROZEN_VALUE_TOLERANCE: f64 = 1e-9;

/// Diagnostics for one stage of the fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitStage {
    /// The restraint strength this stage ran with.
    pub restraint_height: f64,
    /// Iterations spent re-linearizing the restraint.
    pub iterations: usize,
    /// Whether the charges stopped moving before the iteration cap.
    pub converged: bool,
    /// Relative root-mean-square deviation of the model potential from the
    /// quantum potential, evaluated with this stage's final charges.
    pub rrms: f64,
}

/// The result of a charge fit.
///
/// Non-convergence is reported through [`Self::converged`] rather than an
/// error: the charges are still the best available estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Fitted charges, one inner vector per molecule in input order.
    pub charges: Vec<Vec<f64>>,
    /// Total iterations across all stages.
    pub iterations: usize,
    /// `true` only if every stage converged.
    pub converged: bool,
    /// Per-stage diagnostics, in execution order.
    pub stages: Vec<FitStage>,
}

/// Union-find over atom indices, used to merge overlapping equivalence
/// groups into disjoint classes.
#[derive(Debug)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub(crate) fn new(items: usize) -> Self {
        Self {
            parent: (0..items).collect(),
            size: vec![1; items],
        }
    }

    pub(crate) fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            self.parent[item] = self.parent[self.parent[item]];
            item = self.parent[item];
        }
        item
    }

    pub(crate) fn union(&mut self, left: usize, right: usize) {
        let mut a = self.find(left);
        let mut b = self.find(right);
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}

struct RawConstraint {
    atoms: Vec<usize>,
    target: f64,
    origin: String,
}

struct Row {
    coefficients: Vec<f64>,
    target: f64,
    origin: String,
}

#[derive(Debug)]
struct StageSolution {
    charges: DVector<f64>,
    iterations: usize,
    converged: bool,
}

/// Fits one charge per atom across all molecules.
///
/// Every orientation of every conformer must already carry an ESP grid. The
/// fit runs one or two stages depending on the options; each stage solves a
/// constrained least-squares problem, iterating when the hyperbolic restraint
/// is active.
pub fn fit_charges(
    molecules: &[Molecule],
    constraints: &ConstraintSet,
    options: &RespOptions,
) -> Result<FitReport, FitError> {
    options.validate()?;
    if molecules.is_empty() {
        return Err(FitError::NoMolecules);
    }
    for (index, molecule) in molecules.iter().enumerate() {
        if molecule.atom_count() == 0 {
            return Err(FitError::EmptyMolecule { molecule: index });
        }
        if molecule.conformers.is_empty() {
            return Err(FitError::NoConformers { molecule: index });
        }
        if !molecule.weight.is_finite() || molecule.weight <= 0.0 {
            return Err(FitError::InvalidWeight {
                molecule: index,
                weight: molecule.weight,
            });
        }
    }
    let atom_counts: Vec<usize> = molecules.iter().map(Molecule::atom_count).collect();
    constraints.validate(&atom_counts)?;
    for reference in &options.stage2_atoms {
        check_reference(*reference, &atom_counts)?;
    }

    let mut offsets = Vec::with_capacity(molecules.len());
    let mut total = 0usize;
    for count in &atom_counts {
        offsets.push(total);
        total += count;
    }
    let index_of = |reference: AtomRef| offsets[reference.molecule] + reference.atom;

    // Global normal equations, block diagonal over molecules.
    let mut a = DMatrix::zeros(total, total);
    let mut b = DVector::zeros(total);
    let mut esp_norm = 0.0;
    for (index, molecule) in molecules.iter().enumerate() {
        let block = matrix::molecule_block(index, molecule)?;
        let count = atom_counts[index];
        a.view_mut((offsets[index], offsets[index]), (count, count))
            .copy_from(&block.a);
        b.rows_mut(offsets[index], count).copy_from(&block.b);
        esp_norm += block.esp_norm;
    }

    let equivalence_groups: Vec<Vec<usize>> = constraints
        .equivalences()
        .iter()
        .map(|group| group.iter().map(|r| index_of(*r)).collect())
        .collect();

    let mut raw_rows = Vec::new();
    for (index, sum) in constraints.sums().iter().enumerate() {
        raw_rows.push(RawConstraint {
            atoms: sum.atoms.iter().map(|r| index_of(*r)).collect(),
            target: sum.total,
            origin: format!("sum constraint {}", index + 1),
        });
    }
    if options.constrain_net_charge {
        for (index, molecule) in molecules.iter().enumerate() {
            raw_rows.push(RawConstraint {
                atoms: (0..molecule.atom_count()).map(|atom| offsets[index] + atom).collect(),
                target: f64::from(molecule.charge),
                origin: format!("net charge of molecule {}", index + 1),
            });
        }
    }

    let mut restrained = vec![false; total];
    for (index, molecule) in molecules.iter().enumerate() {
        for atom in 0..molecule.atom_count() {
            restrained[offsets[index] + atom] =
                !(options.exclude_hydrogens && molecule.is_hydrogen(atom));
        }
    }

    let mut stages = Vec::new();

    let everything_free = vec![true; total];
    let zero_base = DVector::zeros(total);
    let stage1 = solve_stage(
        &a,
        &b,
        &everything_free,
        &zero_base,
        &equivalence_groups,
        &raw_rows,
        &restrained,
        options.restraint_height_stage1,
        options,
    )?;
    if !stage1.converged {
        warn!(
            stage = 1,
            iterations = stage1.iterations,
            "charge refinement hit the iteration cap without converging"
        );
    }
    stages.push(FitStage {
        restraint_height: options.restraint_height_stage1,
        iterations: stage1.iterations,
        converged: stage1.converged,
        rrms: relative_rms(&a, &b, esp_norm, &stage1.charges),
    });
    let mut charges = stage1.charges;

    if options.two_stage {
        if options.stage2_atoms.is_empty() {
            warn!("two-stage fit requested but no stage-two atoms designated; skipping stage 2");
        } else {
            let mut free = vec![false; total];
            for reference in &options.stage2_atoms {
                free[index_of(*reference)] = true;
            }
            let base = charges.clone();
            let stage2 = solve_stage(
                &a,
                &b,
                &free,
                &base,
                &equivalence_groups,
                &raw_rows,
                &restrained,
                options.restraint_height_stage2,
                options,
            )?;
            if !stage2.converged {
                warn!(
                    stage = 2,
                    iterations = stage2.iterations,
                    "charge refinement hit the iteration cap without converging"
                );
            }
            stages.push(FitStage {
                restraint_height: options.restraint_height_stage2,
                iterations: stage2.iterations,
                converged: stage2.converged,
                rrms: relative_rms(&a, &b, esp_norm, &stage2.charges),
            });
            charges = stage2.charges;
        }
    }

    let report = FitReport {
        charges: molecules
            .iter()
            .enumerate()
            .map(|(index, molecule)| {
                (0..molecule.atom_count())
                    .map(|atom| charges[offsets[index] + atom])
                    .collect()
            })
            .collect(),
        iterations: stages.iter().map(|stage| stage.iterations).sum(),
        converged: stages.iter().all(|stage| stage.converged),
        stages,
    };
    debug!(
        stages = report.stages.len(),
        iterations = report.iterations,
        converged = report.converged,
        "charge fit finished"
    );
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn solve_stage(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    free: &[bool],
    base: &DVector<f64>,
    equivalence_groups: &[Vec<usize>],
    raw_rows: &[RawConstraint],
    restrained: &[bool],
    height: f64,
    options: &RespOptions,
) -> Result<StageSolution, FitError> {
    let total = free.len();

    // Merge overlapping equivalence groups over the free atoms.
    let mut dsu = DisjointSet::new(total);
    for members in equivalence_groups {
        let free_members: Vec<usize> =
            members.iter().copied().filter(|&atom| free[atom]).collect();
        for pair in free_members.windows(2) {
            dsu.union(pair[0], pair[1]);
        }
    }

    let mut class_of: Vec<Option<usize>> = vec![None; total];
    let mut class_members: Vec<Vec<usize>> = Vec::new();
    let mut root_to_class: HashMap<usize, usize> = HashMap::new();
    for atom in 0..total {
        if !free[atom] {
            continue;
        }
        let root = dsu.find(atom);
        let class = *root_to_class.entry(root).or_insert_with(|| {
            class_members.push(Vec::new());
            class_members.len() - 1
        });
        class_members[class].push(atom);
        class_of[atom] = Some(class);
    }
    let classes = class_members.len();

    // A group spanning frozen atoms pins its free members to the frozen value.
    let mut pin_targets: HashMap<usize, (f64, usize)> = HashMap::new();
    for (group_index, members) in equivalence_groups.iter().enumerate() {
        let frozen: Vec<usize> = members.iter().copied().filter(|&atom| !free[atom]).collect();
        if frozen.is_empty() {
            continue;
        }
        let value = base[frozen[0]];
        if frozen
            .iter()
            .any(|&atom| (base[atom] - value).abs() > FROZEN_VALUE_TOLERANCE)
        {
            return Err(FitError::FrozenEquivalenceConflict { group: group_index });
        }
        let Some(&first_free) = members.iter().find(|&&atom| free[atom]) else {
            continue;
        };
        let Some(class) = class_of[first_free] else {
            continue;
        };
        match pin_targets.get(&class) {
            Some(&(existing, _)) if (existing - value).abs() > FROZEN_VALUE_TOLERANCE => {
                return Err(FitError::FrozenEquivalenceConflict { group: group_index });
            }
            Some(_) => {}
            None => {
                pin_targets.insert(class, (value, group_index));
            }
        }
    }

    // Reduce the normal equations to class space, folding frozen charges
    // into the right-hand side.
    let mut a_reduced = DMatrix::zeros(classes, classes);
    let mut b_reduced = DVector::zeros(classes);
    for (c, members_c) in class_members.iter().enumerate() {
        for &j in members_c {
            let mut rhs = b[j];
            for k in 0..total {
                if !free[k] {
                    rhs -= a[(j, k)] * base[k];
                }
            }
            b_reduced[c] += rhs;
            for (d, members_d) in class_members.iter().enumerate() {
                for &k in members_d {
                    a_reduced[(c, d)] += a[(j, k)];
                }
            }
        }
    }

    // Constraint rows in class space, frozen members folded into the target.
    let mut rows: Vec<Row> = Vec::new();
    for raw in raw_rows {
        let mut coefficients = vec![0.0; classes];
        let mut target = raw.target;
        for &atom in &raw.atoms {
            match class_of[atom] {
                Some(class) => coefficients[class] += 1.0,
                None => target -= base[atom],
            }
        }
        if coefficients.iter().all(|&coefficient| coefficient == 0.0) {
            if target.abs() > FROZEN_TARGET_TOLERANCE {
                return Err(FitError::FrozenConstraintConflict {
                    origin: raw.origin.clone(),
                    residual: target,
                });
            }
            debug!(origin = %raw.origin, "constraint fully satisfied by frozen charges");
            continue;
        }
        rows.push(Row {
            coefficients,
            target,
            origin: raw.origin.clone(),
        });
    }
    let mut pins: Vec<(usize, (f64, usize))> = pin_targets.into_iter().collect();
    pins.sort_by_key(|&(class, _)| class);
    for (class, (value, group_index)) in pins {
        let mut coefficients = vec![0.0; classes];
        coefficients[class] = 1.0;
        rows.push(Row {
            coefficients,
            target: value,
            origin: format!("equivalence group {} pinned to its frozen members", group_index + 1),
        });
    }

    // Reject linearly dependent rows up front; they would make the KKT
    // system singular with a far less useful diagnostic.
    let mut kept: Vec<Row> = Vec::new();
    let mut offenders: Vec<String> = Vec::new();
    let mut rank = 0usize;
    for row in rows {
        let candidate = DMatrix::from_fn(kept.len() + 1, classes, |r, c| {
            if r < kept.len() {
                kept[r].coefficients[c]
            } else {
                row.coefficients[c]
            }
        });
        let candidate_rank = candidate.rank(RANK_TOLERANCE);
        if candidate_rank > rank {
            rank = candidate_rank;
            kept.push(row);
        } else {
            offenders.push(row.origin);
        }
    }
    if !offenders.is_empty() {
        return Err(FitError::DependentConstraints { offenders });
    }

    // Augmented (KKT) system: [A' + R, G^T; G, 0] [x; lambda] = [B'; t].
    let lagrange = kept.len();
    let dim = classes + lagrange;
    let mut base_kkt = DMatrix::zeros(dim, dim);
    base_kkt
        .view_mut((0, 0), (classes, classes))
        .copy_from(&a_reduced);
    let mut rhs = DVector::zeros(dim);
    rhs.rows_mut(0, classes).copy_from(&b_reduced);
    for (r, row) in kept.iter().enumerate() {
        for (c, &coefficient) in row.coefficients.iter().enumerate() {
            base_kkt[(classes + r, c)] = coefficient;
            base_kkt[(c, classes + r)] = coefficient;
        }
        rhs[classes + r] = row.target;
    }

    // The restraint weight of a class is the sum over its restrained members.
    let restrained_multiplicity: Vec<f64> = class_members
        .iter()
        .map(|members| members.iter().filter(|&&atom| restrained[atom]).count() as f64)
        .collect();
    let restrain = height > 0.0
        && restrained_multiplicity
            .iter()
            .any(|&multiplicity| multiplicity > 0.0);

    let mut x = DVector::from_fn(classes, |class, _| base[class_members[class][0]]);
    let mut iterations = 0usize;
    let mut converged = false;
    loop {
        iterations += 1;
        let mut kkt = base_kkt.clone();
        if restrain {
            for class in 0..classes {
                kkt[(class, class)] += restrained_multiplicity[class]
                    * restraint_weight(x[class], height, options.restraint_slope);
            }
        }
        let solution = kkt
            .full_piv_lu()
            .solve(&rhs)
            .ok_or(FitError::SingularSystem)?;
        let updated = solution.rows(0, classes).into_owned();
        let delta = updated
            .iter()
            .zip(x.iter())
            .map(|(new, old)| (new - old).abs())
            .fold(0.0f64, f64::max);
        x = updated;
        if !restrain || delta < options.convergence_tolerance {
            converged = true;
            break;
        }
        if iterations >= options.max_iterations {
            break;
        }
    }

    let mut charges = base.clone_owned();
    for (class, members) in class_members.iter().enumerate() {
        for &atom in members {
            charges[atom] = x[class];
        }
    }
    Ok(StageSolution {
        charges,
        iterations,
        converged,
    })
}

fn relative_rms(a: &DMatrix<f64>, b: &DVector<f64>, esp_norm: f64, charges: &DVector<f64>) -> f64 {
    if esp_norm <= 0.0 {
        return 0.0;
    }
    let chi_sq = (charges.dot(&(a * charges)) - 2.0 * charges.dot(b) + esp_norm).max(0.0);
    (chi_sq / esp_norm).sqrt()
}
