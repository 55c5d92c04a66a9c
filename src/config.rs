//! Estimator configuration file.
//!
//! ```toml
//! [evaluation]
//! parallel = true
//! strict_functions = false
//!
//! [aggregation]
//! remove_decomposed = true
//! max_rewrite_steps = 10000
//!
//! [aggregation.table.control_ry]
//! rotation = 2
//! CNOT = 2
//!
//! [aggregation.table.rotation]
//! T_gates = "3*log2(1/epsilon)"
//!
//! [assignments]
//! num = 16
//! epsilon = "1/1000"
//! ```
//!
//! Every section is optional; missing keys take the engine defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::eval::{EvaluationSettings, Evaluator};
use crate::symbolics::{FunctionsMap, Literal, SymbolicBackend};
use crate::transform::{AggregationSettings, Aggregator, DecompositionTable};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EstimatorConfig {
    /// The `[evaluation]` section.
    #[serde(default)]
    pub evaluation: EvaluationSettings,

    /// The `[aggregation]` section, decomposition table included.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Parameter assignments applied by [`EstimatorConfig::evaluator`] users.
    #[serde(default)]
    pub assignments: BTreeMap<String, Literal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    #[serde(flatten)]
    pub settings: AggregationSettings,
    pub table: DecompositionTable,
}

impl EstimatorConfig {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// An evaluator using the `[evaluation]` settings.
    pub fn evaluator<'b, B: SymbolicBackend>(
        &self,
        backend: &'b B,
        functions: FunctionsMap<B::Expr>,
    ) -> Evaluator<'b, B> {
        Evaluator::new(backend)
            .with_functions(functions)
            .with_settings(self.evaluation)
    }

    /// An aggregator for the configured table and settings.
    pub fn aggregator<'b, B: SymbolicBackend>(&self, backend: &'b B) -> crate::Result<Aggregator<'b, B>> {
        Ok(Aggregator::new(backend, &self.aggregation.table)?.with_settings(self.aggregation.settings))
    }

    /// The `[assignments]` section as evaluator input.
    pub fn assignments(&self) -> impl Iterator<Item = (String, Literal)> + '_ {
        self.assignments
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Resource, Routine};
    use crate::symbolics::native::{Expr, NativeBackend};
    use crate::transform::DEFAULT_MAX_REWRITE_STEPS;

    const CONFIG: &str = r#"
        [evaluation]
        strict_functions = false

        [aggregation]
        remove_decomposed = false

        [aggregation.table.control_ry]
        rotation = 2
        CNOT = 2

        [aggregation.table.rotation]
        T_gates = "w"

        [assignments]
        num = 4
        w = 0.5
        k = "m + 1"
    "#;

    #[test]
    fn test_parse_sections() {
        let config = EstimatorConfig::parse_toml(CONFIG).unwrap();

        assert!(config.evaluation.parallel);
        assert!(!config.evaluation.strict_functions);
        assert!(!config.aggregation.settings.remove_decomposed);
        assert!(config.aggregation.settings.parallel);
        assert_eq!(config.aggregation.settings.max_rewrite_steps, DEFAULT_MAX_REWRITE_STEPS);
        assert_eq!(config.aggregation.table["control_ry"]["CNOT"], Literal::Integer(2));
        assert_eq!(config.aggregation.table["rotation"]["T_gates"], Literal::from("w"));
        assert_eq!(config.assignments["num"], Literal::Integer(4));
        assert_eq!(config.assignments["w"], Literal::Float(0.5));
        assert_eq!(config.assignments["k"], Literal::from("m + 1"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EstimatorConfig::parse_toml("").unwrap();
        assert_eq!(config.evaluation, EvaluationSettings::default());
        assert_eq!(config.aggregation.settings, AggregationSettings::default());
        assert!(config.aggregation.table.is_empty());
        assert!(config.assignments.is_empty());
    }

    #[test]
    fn test_aggregation_settings_sit_beside_table() {
        let config = EstimatorConfig::parse_toml(
            "[aggregation]\nmax_rewrite_steps = 12\nparallel = false\n\n[aggregation.table.a]\nb = 1\n",
        )
        .unwrap();
        assert_eq!(
            config.aggregation.settings,
            AggregationSettings {
                remove_decomposed: true,
                max_rewrite_steps: 12,
                parallel: false,
            }
        );
        assert_eq!(config.aggregation.table["a"]["b"], Literal::Integer(1));
    }

    #[test]
    fn test_invalid_toml() {
        let err = EstimatorConfig::parse_toml("[evaluation\nparallel = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EstimatorConfig::load(Path::new("/nonexistent/estimator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_config_drives_engines() {
        let config = EstimatorConfig::parse_toml(CONFIG).unwrap();
        let backend = NativeBackend;
        let routine: Routine<Expr> = Routine::new("root")
            .with_input_params(["num", "w"])
            .with_resource(Resource::additive("control_ry", backend.parse("num").unwrap()));

        let aggregated = config.aggregator(&backend).unwrap().aggregate(&routine).unwrap();
        let evaluated = config
            .evaluator(&backend, FunctionsMap::new())
            .evaluate(&aggregated, config.assignments())
            .unwrap()
            .into_routine();

        assert!(evaluated.input_params.is_empty());
        assert_eq!(evaluated.resources["CNOT"].value, Expr::int(8));
        assert!(backend.equals(&evaluated.resources["T_gates"].value, &backend.parse("4").unwrap()));
        assert_eq!(evaluated.resources["control_ry"].value, Expr::int(4));
    }
}
