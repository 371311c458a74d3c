use serde::{Deserialize, Serialize};

/// The kind of computation an external task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Relax the geometry to a local energy minimum.
    Optimize,
    /// Evaluate the wavefunction and electrostatic potential on a fixed geometry.
    SinglePoint,
}

impl DriverKind {
    /// Returns the stage name used in logs, script filenames, and status output.
    pub fn stage_name(&self) -> &'static str {
        match self {
            DriverKind::Optimize => "optimization",
            DriverKind::SinglePoint => "single_point",
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.stage_name())
    }
}

/// Method options for one external computation.
///
/// These options, together with the [`DriverKind`], define the options hash of
/// a task. The molecule weight and fitting parameters deliberately live
/// elsewhere: they influence the fit, not the external computation, so
/// changing them must not invalidate cached results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QmOptions {
    /// The electronic-structure method (e.g. `hf`, `b3lyp`).
    pub method: String,
    /// The basis set (e.g. `6-31g*`).
    pub basis: String,
    /// Implicit-solvent model name, or `None` for gas phase.
    pub solvent: Option<String>,
    /// SCF convergence threshold passed to the external program.
    pub scf_convergence: f64,
}

impl Default for QmOptions {
    fn default() -> Self {
        Self {
            method: "hf".to_string(),
            basis: "6-31g*".to_string(),
            solvent: None,
            scf_convergence: 1e-8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(DriverKind::Optimize.stage_name(), "optimization");
        assert_eq!(DriverKind::SinglePoint.stage_name(), "single_point");
        assert_eq!(DriverKind::SinglePoint.to_string(), "single_point");
    }

    #[test]
    fn default_options_are_gas_phase_hf() {
        let options = QmOptions::default();
        assert_eq!(options.method, "hf");
        assert_eq!(options.basis, "6-31g*");
        assert!(options.solvent.is_none());
    }

    #[test]
    fn driver_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DriverKind::SinglePoint).unwrap();
        assert_eq!(json, "\"single_point\"");
    }
}
