use crate::core::fitting::options::RespOptions;
use crate::core::qm::options::QmOptions;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },
}

/// Settings for one charge-derivation job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    /// Run a geometry optimization stage before the ESP evaluation.
    pub optimize_geometry: bool,
    /// External program invoked by the dispatch scripts.
    pub executable: String,
    /// Method options for the optimization stage.
    pub optimization: QmOptions,
    /// Method options for the ESP single-point stage.
    pub single_point: QmOptions,
    /// Charge-fitting options.
    pub resp: RespOptions,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            optimize_geometry: true,
            executable: "psi4".to_string(),
            optimization: QmOptions::default(),
            single_point: QmOptions::default(),
            resp: RespOptions::default(),
        }
    }
}

impl JobConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.trim().is_empty() {
            return Err(ConfigError::InvalidParameter {
                parameter: "executable",
                reason: "must not be empty".to_string(),
            });
        }
        validate_method(&self.optimization, "optimization")?;
        validate_method(&self.single_point, "single_point")?;
        self.resp
            .validate()
            .map_err(|source| ConfigError::InvalidParameter {
                parameter: "fit",
                reason: source.to_string(),
            })
    }
}

fn validate_method(options: &QmOptions, parameter: &'static str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidParameter {
        parameter,
        reason: reason.to_string(),
    };
    if options.method.trim().is_empty() {
        return Err(invalid("method must not be empty"));
    }
    if options.basis.trim().is_empty() {
        return Err(invalid("basis must not be empty"));
    }
    if !(options.scf_convergence.is_finite()
        && options.scf_convergence > 0.0
        && options.scf_convergence < 1.0)
    {
        return Err(invalid("scf_convergence must lie in (0, 1)"));
    }
    Ok(())
}

#[derive(Default)]
pub struct JobConfigBuilder {
    optimize_geometry: Option<bool>,
    executable: Option<String>,
    optimization: Option<QmOptions>,
    single_point: Option<QmOptions>,
    resp: Option<RespOptions>,
}

impl JobConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize_geometry(mut self, enabled: bool) -> Self {
        self.optimize_geometry = Some(enabled);
        self
    }
    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }
    pub fn optimization(mut self, options: QmOptions) -> Self {
        self.optimization = Some(options);
        self
    }
    pub fn single_point(mut self, options: QmOptions) -> Self {
        self.single_point = Some(options);
        self
    }
    pub fn resp(mut self, options: RespOptions) -> Self {
        self.resp = Some(options);
        self
    }

    /// Fills unset fields from [`JobConfig::default`] and validates.
    pub fn build(self) -> Result<JobConfig, ConfigError> {
        let defaults = JobConfig::default();
        let config = JobConfig {
            optimize_geometry: self.optimize_geometry.unwrap_or(defaults.optimize_geometry),
            executable: self.executable.unwrap_or(defaults.executable),
            optimization: self.optimization.unwrap_or(defaults.optimization),
            single_point: self.single_point.unwrap_or(defaults.single_point),
            resp: self.resp.unwrap_or(defaults.resp),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_falls_back_to_defaults() {
        let config = JobConfigBuilder::new().build().unwrap();
        assert_eq!(config, JobConfig::default());
        assert!(config.optimize_geometry);
        assert_eq!(config.executable, "psi4");
    }

    #[test]
    fn builder_overrides_stick() {
        let config = JobConfigBuilder::new()
            .optimize_geometry(false)
            .executable("orca-adapter")
            .build()
            .unwrap();
        assert!(!config.optimize_geometry);
        assert_eq!(config.executable, "orca-adapter");
    }

    #[test]
    fn empty_executable_is_rejected() {
        let err = JobConfigBuilder::new().executable("  ").build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "executable",
                ..
            }
        ));
    }

    #[test]
    fn blank_method_is_rejected() {
        let mut options = QmOptions::default();
        options.method = String::new();
        let err = JobConfigBuilder::new().optimization(options).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "optimization",
                ..
            }
        ));
    }

    #[test]
    fn invalid_fit_options_are_rejected() {
        let mut resp = RespOptions::default();
        resp.restraint_slope = 0.0;
        let err = JobConfigBuilder::new().resp(resp).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                parameter: "fit",
                ..
            }
        ));
    }
}
