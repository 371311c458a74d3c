use super::FitError;
use crate::core::models::constraints::AtomRef;

/// Options controlling the restrained fit.
///
/// The defaults reproduce the canonical two-stage RESP protocol: a weak
/// restraint over all heavy atoms in stage one, then a stronger restraint
/// while refitting only the designated atoms (typically sp3 carbons and
/// their hydrogens) with everything else frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct RespOptions {
    /// Restraint strength applied in stage one (and in single-stage fits).
    pub restraint_height_stage1: f64,
    /// Restraint strength applied in stage two.
    pub restraint_height_stage2: f64,
    /// Hyperbola half-width; the charge scale below which the restraint
    /// behaves quadratically instead of linearly.
    pub restraint_slope: f64,
    /// Leave hydrogens unrestrained.
    pub exclude_hydrogens: bool,
    /// Add one sum constraint per molecule pinning its total charge.
    pub constrain_net_charge: bool,
    /// Run the second stage.
    pub two_stage: bool,
    /// Atoms refitted in stage two; everything else is frozen at its
    /// stage-one value. Ignored unless [`Self::two_stage`] is set.
    pub stage2_atoms: Vec<AtomRef>,
    /// Largest per-charge change between iterations that still counts as
    /// converged.
    pub convergence_tolerance: f64,
    /// Iteration cap per stage; hitting it yields a non-converged report,
    /// not an error.
    pub max_iterations: usize,
}

impl Default for RespOptions {
    fn default() -> Self {
        Self {
            restraint_height_stage1: 0.0005,
            restraint_height_stage2: 0.001,
            restraint_slope: 0.1,
            exclude_hydrogens: true,
            constrain_net_charge: true,
            two_stage: true,
            stage2_atoms: Vec::new(),
            convergence_tolerance: 1e-6,
            max_iterations: 500,
        }
    }
}

impl RespOptions {
    /// Checks numerical sanity of the options.
    pub fn validate(&self) -> Result<(), FitError> {
        let invalid = |reason: String| FitError::InvalidOptions { reason };
        for (name, height) in [
            ("restraint_height_stage1", self.restraint_height_stage1),
            ("restraint_height_stage2", self.restraint_height_stage2),
        ] {
            if !height.is_finite() || height < 0.0 {
                return Err(invalid(format!(
                    "{name} must be finite and non-negative, got {height}"
                )));
            }
        }
        if !self.restraint_slope.is_finite() || self.restraint_slope <= 0.0 {
            return Err(invalid(format!(
                "restraint_slope must be finite and positive, got {}",
                self.restraint_slope
            )));
        }
        if !self.convergence_tolerance.is_finite() || self.convergence_tolerance <= 0.0 {
            return Err(invalid(format!(
                "convergence_tolerance must be finite and positive, got {}",
                self.convergence_tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1".to_string()));
        }
        Ok(())
    }

    /// A plain unrestrained, unconstrained least-squares configuration.
    /// Mostly useful for comparing against analytic solutions.
    pub fn ordinary_least_squares() -> Self {
        Self {
            restraint_height_stage1: 0.0,
            restraint_height_stage2: 0.0,
            constrain_net_charge: false,
            two_stage: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_two_stage_protocol() {
        let options = RespOptions::default();
        assert_eq!(options.restraint_height_stage1, 0.0005);
        assert_eq!(options.restraint_height_stage2, 0.001);
        assert_eq!(options.restraint_slope, 0.1);
        assert!(options.exclude_hydrogens);
        assert!(options.constrain_net_charge);
        assert!(options.two_stage);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn rejects_bad_numerics() {
        let mut options = RespOptions::default();
        options.restraint_height_stage1 = -1.0;
        assert!(options.validate().is_err());

        let mut options = RespOptions::default();
        options.restraint_slope = 0.0;
        assert!(options.validate().is_err());

        let mut options = RespOptions::default();
        options.convergence_tolerance = f64::NAN;
        assert!(options.validate().is_err());

        let mut options = RespOptions::default();
        options.max_iterations = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn ols_preset_disables_restraint_and_charge_pinning() {
        let options = RespOptions::ordinary_least_squares();
        assert_eq!(options.restraint_height_stage1, 0.0);
        assert!(!options.constrain_net_charge);
        assert!(!options.two_stage);
        assert!(options.validate().is_ok());
    }
}
