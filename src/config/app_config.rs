use serde::Deserialize;

use super::ExperimentConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from `config/default`, `config/local` and `APP__*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_with(environment())
    }

    fn load_with(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment)
            .build()?;

        config.try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.experiment, ExperimentConfig::default());
    }

    #[test]
    fn test_deserialize_from_config_source() {
        let source = r#"
            [logging]
            level = "debug"
            format = "json"

            [experiment]
            name = "pricing"
            percentage = 50
            concurrency = true
            timeout_ms = 200
        "#;

        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.experiment.name, "pricing");
        assert_eq!(config.experiment.percentage, 50);
        assert!(config.experiment.concurrency);
        assert_eq!(config.experiment.timeout_ms, Some(200));
    }

    #[test]
    fn test_environment_overrides() {
        let variables: config::Map<String, String> = [
            ("APP__EXPERIMENT__PERCENTAGE", "75"),
            ("APP__EXPERIMENT__CONCURRENCY", "true"),
            ("APP__LOGGING__FORMAT", "json"),
            ("OTHER__EXPERIMENT__PERCENTAGE", "5"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        let config = AppConfig::load_with(environment().source(Some(variables))).unwrap();

        assert_eq!(config.experiment.percentage, 75);
        assert!(config.experiment.concurrency);
        assert_eq!(config.experiment.name, "experiment");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_without_sources_uses_defaults() {
        let config = AppConfig::load_with(environment().source(Some(config::Map::new()))).unwrap();

        assert_eq!(config.experiment, ExperimentConfig::default());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
