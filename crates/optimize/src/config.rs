use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use spindle_core::Settings;

use crate::{
    Bounds, BoundsError, ConditionObjectives, FAILURE_FITNESS, INVALID_FITNESS, Objective,
    ThresholdChecker,
};

/// Declarative configuration for a design problem.
///
/// Every entry is optional in TOML:
///
/// ```toml
/// invalid_fitness = 9999.0
/// failure_fitness = 1e10
/// archive_failures = true
///
/// [bounds]
/// lower = [0.3, 0.002]
/// upper = [0.8, 0.008]
///
/// [[objectives]]
/// key = "torque_avg"
/// goal = "maximize"
///
/// [[constraints]]
/// key = "torque_ripple"
/// below = 0.5
///
/// [settings]
/// speed = 314.159
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemConfig {
    /// Value of every objective of an infeasible design.
    pub invalid_fitness: f64,

    /// Value of every objective when an evaluation fails.
    pub failure_fitness: f64,

    /// Whether failed evaluations are passed to the archive.
    pub archive_failures: bool,

    pub bounds: Option<BoundsConfig>,
    pub objectives: Vec<Objective>,
    pub constraints: ThresholdChecker,
    pub settings: Option<Settings>,
}

/// Lower and upper limits of the free variables, as read from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsConfig {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Errors that can occur when loading or using a problem configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] io::Error),

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid_fitness must be finite")]
    InvalidFitness,

    #[error("failure_fitness must be finite")]
    FailureFitness,

    #[error("config has no bounds")]
    MissingBounds,

    #[error("invalid bounds")]
    Bounds(#[from] BoundsError),

    #[error("expected {expected} objectives, got {found}")]
    ObjectiveCount { expected: usize, found: usize },
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            invalid_fitness: INVALID_FITNESS,
            failure_fitness: FAILURE_FITNESS,
            archive_failures: false,
            bounds: None,
            objectives: Vec::new(),
            constraints: ThresholdChecker::default(),
            settings: None,
        }
    }
}

impl ProblemConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration or a
    /// sentinel is not finite.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or for any reason
    /// [`ProblemConfig::from_toml_str`] would.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Checks that both sentinels are finite.
    ///
    /// # Errors
    ///
    /// Returns the first sentinel that is not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.invalid_fitness.is_finite() {
            return Err(ConfigError::InvalidFitness);
        }
        if !self.failure_fitness.is_finite() {
            return Err(ConfigError::FailureFitness);
        }
        Ok(())
    }

    /// Returns the configured bounds for `N` free variables.
    ///
    /// # Errors
    ///
    /// Returns an error if no bounds are configured or they are not valid
    /// bounds of dimension `N`.
    pub fn bounds<const N: usize>(&self) -> Result<Bounds<N>, ConfigError> {
        let bounds = self.bounds.as_ref().ok_or(ConfigError::MissingBounds)?;
        Ok(Bounds::from_slices(&bounds.lower, &bounds.upper)?)
    }

    /// Returns a reducer for the configured objectives, using the configured
    /// invalid sentinel.
    ///
    /// # Errors
    ///
    /// Returns an error if exactly `M` objectives are not configured.
    pub fn objectives<const M: usize>(&self) -> Result<ConditionObjectives<M>, ConfigError> {
        let objectives = <[Objective; M]>::try_from(self.objectives.clone()).map_err(|found| {
            ConfigError::ObjectiveCount {
                expected: M,
                found: found.len(),
            }
        })?;
        ConditionObjectives::new(objectives)
            .with_sentinel(self.invalid_fitness)
            .map_err(|_| ConfigError::InvalidFitness)
    }

    /// Returns a checker for the configured constraints.
    #[must_use]
    pub fn constraints(&self) -> ThresholdChecker {
        self.constraints.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{Goal, Limit};

    const MOTOR: &str = r#"
        failure_fitness = 1e12
        archive_failures = true

        [bounds]
        lower = [0.3, 0.002]
        upper = [0.8, 0.008]

        [[objectives]]
        key = "torque_avg"
        goal = "maximize"

        [[objectives]]
        key = "mass"

        [[constraints]]
        key = "torque_ripple"
        below = 0.5

        [settings]
        speed = 314.159

        [settings.parameters]
        duty_cycle = 0.6
    "#;

    #[test]
    fn parses_a_full_file() {
        let config = ProblemConfig::from_toml_str(MOTOR).unwrap();

        assert_relative_eq!(config.invalid_fitness, INVALID_FITNESS);
        assert_relative_eq!(config.failure_fitness, 1e12);
        assert!(config.archive_failures);

        let bounds = config.bounds::<2>().unwrap();
        assert_eq!(bounds.upper(), &[0.8, 0.008]);

        let reducer = config.objectives::<2>().unwrap();
        assert_eq!(reducer.targets()[0].goal, Goal::Maximize);
        assert_eq!(reducer.targets()[1].goal, Goal::Minimize);

        assert_eq!(
            config.constraints(),
            ThresholdChecker::new().with("torque_ripple", Limit::Below(0.5))
        );

        let settings = config.settings.unwrap();
        assert_relative_eq!(settings.speed().value, 314.159);
        assert!(settings.parameter("duty_cycle").is_some());
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ProblemConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProblemConfig::default());
        assert!(matches!(
            config.bounds::<1>(),
            Err(ConfigError::MissingBounds)
        ));
    }

    #[test]
    fn dimension_mismatches_are_reported() {
        let config = ProblemConfig::from_toml_str(MOTOR).unwrap();

        assert!(matches!(
            config.bounds::<3>(),
            Err(ConfigError::Bounds(BoundsError::Length {
                expected: 3,
                found: 2
            }))
        ));
        assert!(matches!(
            config.objectives::<3>(),
            Err(ConfigError::ObjectiveCount {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_sentinels() {
        assert!(matches!(
            ProblemConfig::from_toml_str("failure_fitnes = 1.0"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ProblemConfig::from_toml_str("invalid_fitness = inf"),
            Err(ConfigError::InvalidFitness)
        ));
    }
}
