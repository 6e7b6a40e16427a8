use crate::config::{parse_flag, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

pub const ENV_ENVIRONMENT: &str = "SERVICE_REGISTRY_ENV";
pub const ENV_STRICT_ORDERING: &str = "SERVICE_REGISTRY_STRICT_ORDERING";
pub const ENV_TRACK_INTERFACE_USAGE: &str = "SERVICE_REGISTRY_TRACK_INTERFACE_USAGE";

/// Configuration trait for registry configuration
pub trait RegistryConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Where each field's value came from, keyed by field name
    fn config_sources(&self) -> HashMap<&'static str, ConfigSource>;
}

/// Where a [`RegistryConfig`] field's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// The preset of the named environment
    Preset(Environment),
    /// The named environment variable
    EnvVar(&'static str),
    /// A YAML document passed to [`RegistryConfig::from_yaml_str`]
    Document,
    /// A `with_*` builder call
    Programmatic,
}

impl ConfigSource {
    pub fn is_preset(&self) -> bool {
        matches!(self, ConfigSource::Preset(_))
    }

    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Preset(environment) => write!(f, "{} preset", environment),
            ConfigSource::EnvVar(var) => write!(f, "environment variable {}", var),
            ConfigSource::Document => f.write_str("YAML document"),
            ConfigSource::Programmatic => f.write_str("set programmatically"),
        }
    }
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Policy knobs for a [`ServiceOwner`](crate::ServiceOwner)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub environment: Environment,
    /// Reject overrides of a service that was already resolved on the owner.
    /// When off, the late override replaces the binding and the cached
    /// instance is dropped.
    pub strict_ordering: bool,
    /// Interface-mediated overrides consult and update the owner's used set.
    pub track_interface_usage: bool,
    sources: HashMap<&'static str, ConfigSource>,
}

/// Shape of a YAML configuration document; absent fields keep the preset
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryConfigDocument {
    environment: Option<Environment>,
    strict_ordering: Option<bool>,
    track_interface_usage: Option<bool>,
}

impl RegistryConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::development()
    }

    /// Preset for development
    pub fn development() -> Self {
        Self::preset(Environment::Development, true, true)
    }

    /// Preset for tests: fixtures may swap implementations between phases
    pub fn testing() -> Self {
        Self::preset(Environment::Testing, false, true)
    }

    /// Preset for production
    pub fn production() -> Self {
        Self::preset(Environment::Production, true, true)
    }

    /// Preset for an environment
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self::development(),
            Environment::Testing => Self::testing(),
            Environment::Production => Self::production(),
        }
    }

    fn preset(environment: Environment, strict_ordering: bool, track_interface_usage: bool) -> Self {
        let origin = ConfigSource::Preset(environment);
        let sources = HashMap::from([
            ("environment", origin),
            ("strict_ordering", origin),
            ("track_interface_usage", origin),
        ]);

        Self {
            environment,
            strict_ordering,
            track_interface_usage,
            sources,
        }
    }

    /// Set the ordering policy
    pub fn with_strict_ordering(mut self, strict: bool) -> Self {
        self.strict_ordering = strict;
        self.sources
            .insert("strict_ordering", ConfigSource::Programmatic);
        self
    }

    /// Set whether interface-mediated overrides participate in used-tracking
    pub fn with_interface_usage_tracking(mut self, track: bool) -> Self {
        self.track_interface_usage = track;
        self.sources
            .insert("track_interface_usage", ConfigSource::Programmatic);
        self
    }

    /// Load configuration from a YAML document; missing fields fall back to
    /// the preset of the document's environment
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let document: RegistryConfigDocument = serde_yaml::from_str(yaml)?;

        let mut config = match document.environment {
            Some(environment) => {
                let mut config = Self::for_environment(environment);
                config.sources.insert("environment", ConfigSource::Document);
                config
            }
            None => Self::new(),
        };

        if let Some(strict) = document.strict_ordering {
            config.strict_ordering = strict;
            config
                .sources
                .insert("strict_ordering", ConfigSource::Document);
        }

        if let Some(track) = document.track_interface_usage {
            config.track_interface_usage = track;
            config
                .sources
                .insert("track_interface_usage", ConfigSource::Document);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryConfigTrait for RegistryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var(ENV_ENVIRONMENT) {
            Ok(env_str) => {
                let mut config = Self::for_environment(env_str.parse()?);
                config.sources.insert(
                    "environment",
                    ConfigSource::EnvVar(ENV_ENVIRONMENT),
                );
                config
            }
            Err(_) => Self::new(),
        };

        if let Ok(value) = env::var(ENV_STRICT_ORDERING) {
            config.strict_ordering = parse_flag("strict_ordering", &value)?;
            config.sources.insert(
                "strict_ordering",
                ConfigSource::EnvVar(ENV_STRICT_ORDERING),
            );
        }

        if let Ok(value) = env::var(ENV_TRACK_INTERFACE_USAGE) {
            config.track_interface_usage = parse_flag("track_interface_usage", &value)?;
            config.sources.insert(
                "track_interface_usage",
                ConfigSource::EnvVar(ENV_TRACK_INTERFACE_USAGE),
            );
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.environment.is_production() && !self.strict_ordering {
            tracing::warn!(
                "strict_ordering is disabled in production; overrides registered after first use will replace live singletons"
            );
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<&'static str, ConfigSource> {
        self.sources.clone()
    }
}
