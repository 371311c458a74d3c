//! Tabular output of fitted charges.

use std::io::Write;

use thiserror::Error;

use crate::core::fitting::solver::FitReport;
use crate::core::models::element;
use crate::core::models::molecule::Molecule;

/// Errors arising while writing a charge table.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report covers {fitted} molecule(s) but the job has {molecules}")]
    MoleculeCountMismatch { molecules: usize, fitted: usize },
    #[error("molecule {molecule} has {atoms} atom(s) but {charges} fitted charge(s)")]
    ChargeCountMismatch {
        molecule: usize,
        atoms: usize,
        charges: usize,
    },
    #[error("failed to write charge table: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush charge table: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes the fitted charges as a CSV table, one row per atom.
///
/// Columns are `molecule`, `formula`, `atom`, `element`, `charge`. Molecule
/// and atom indices are 1-based to match the job-file convention; charges are
/// printed with six decimals.
pub fn write_charges_csv<W: Write>(
    writer: W,
    molecules: &[Molecule],
    report: &FitReport,
) -> Result<(), ReportError> {
    if molecules.len() != report.charges.len() {
        return Err(ReportError::MoleculeCountMismatch {
            molecules: molecules.len(),
            fitted: report.charges.len(),
        });
    }

    let mut table = csv::Writer::from_writer(writer);
    table.write_record(["molecule", "formula", "atom", "element", "charge"])?;
    for (index, (molecule, charges)) in molecules.iter().zip(&report.charges).enumerate() {
        if charges.len() != molecule.atom_count() {
            return Err(ReportError::ChargeCountMismatch {
                molecule: index + 1,
                atoms: molecule.atom_count(),
                charges: charges.len(),
            });
        }
        let formula = molecule.formula();
        for (atom, (&number, charge)) in molecule.atomic_numbers.iter().zip(charges).enumerate() {
            let symbol = match element::symbol(number) {
                Some(s) => s.to_string(),
                None => format!("Z{number}"),
            };
            table.write_record([
                (index + 1).to_string(),
                formula.clone(),
                (atom + 1).to_string(),
                symbol,
                format!("{charge:.6}"),
            ])?;
        }
    }
    table.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fitting::solver::FitStage;

    fn report_for(charges: Vec<Vec<f64>>) -> FitReport {
        FitReport {
            charges,
            iterations: 3,
            converged: true,
            stages: vec![FitStage {
                restraint_height: 0.0005,
                iterations: 3,
                converged: true,
                rrms: 0.1,
            }],
        }
    }

    #[test]
    fn writes_one_row_per_atom() {
        let molecules = vec![
            Molecule::new(vec![8, 1, 1], 0, 1),
            Molecule::new(vec![6, 1, 1, 1, 1], 0, 1),
        ];
        let report = report_for(vec![
            vec![-0.8, 0.4, 0.4],
            vec![-0.4, 0.1, 0.1, 0.1, 0.1],
        ]);

        let mut buffer = Vec::new();
        write_charges_csv(&mut buffer, &molecules, &report).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "molecule,formula,atom,element,charge");
        assert_eq!(lines[1], "1,H2O,1,O,-0.800000");
        assert_eq!(lines[3], "1,H2O,3,H,0.400000");
        assert_eq!(lines[4], "2,CH4,1,C,-0.400000");
        assert_eq!(lines[8], "2,CH4,5,H,0.100000");
    }

    #[test]
    fn rejects_a_report_for_a_different_job() {
        let molecules = vec![Molecule::new(vec![8, 1, 1], 0, 1)];

        let report = report_for(vec![vec![-0.8, 0.4, 0.4], vec![0.0]]);
        let error = write_charges_csv(Vec::new(), &molecules, &report).unwrap_err();
        assert!(matches!(
            error,
            ReportError::MoleculeCountMismatch {
                molecules: 1,
                fitted: 2
            }
        ));

        let report = report_for(vec![vec![-0.8, 0.4]]);
        let error = write_charges_csv(Vec::new(), &molecules, &report).unwrap_err();
        assert!(matches!(
            error,
            ReportError::ChargeCountMismatch {
                molecule: 1,
                atoms: 3,
                charges: 2
            }
        ));
    }

    #[test]
    fn unknown_atomic_numbers_fall_back_to_placeholders() {
        let molecules = vec![Molecule::new(vec![255], 0, 1)];
        let report = report_for(vec![vec![0.5]]);

        let mut buffer = Vec::new();
        write_charges_csv(&mut buffer, &molecules, &report).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("1,Z255,1,Z255,0.500000"));
    }
}
