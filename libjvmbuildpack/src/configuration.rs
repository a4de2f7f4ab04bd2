//! User configuration declared as `[[metadata.configurations]]` in `buildpack.toml`.
use libcnb::Env;
use libherokubuildpack::log::log_info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A configuration environment variable a buildpack understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildpackConfiguration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub build: bool,
    #[serde(default)]
    pub launch: bool,
}

#[derive(thiserror::Error, Debug)]
#[error("unable to parse {name} value '{value}'")]
pub struct ConfigurationError {
    pub name: String,
    pub value: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

/// Resolves configuration values from the environment, falling back to declared defaults.
#[derive(Debug, Clone)]
pub struct ConfigurationResolver {
    configurations: Vec<BuildpackConfiguration>,
    env: Env,
}

impl ConfigurationResolver {
    pub fn new(configurations: &[BuildpackConfiguration], env: &Env) -> Self {
        Self {
            configurations: configurations.to_vec(),
            env: env.clone(),
        }
    }

    /// Returns the value of `name` and whether it was explicitly set.
    ///
    /// Unset variables resolve to their declared default, or an empty string.
    pub fn resolve(&self, name: &str) -> (String, bool) {
        if let Some(value) = self.env.get(name) {
            return (value.to_string_lossy().into_owned(), true);
        }

        let default = self
            .configurations
            .iter()
            .find(|configuration| configuration.name == name)
            .and_then(|configuration| configuration.default.clone())
            .unwrap_or_default();

        (default, false)
    }

    /// Returns the value of `name` only if it was explicitly set.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.resolve(name) {
            (value, true) => Some(value),
            (_, false) => None,
        }
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.env.get(name).is_some()
    }

    /// Interprets the resolved value as a boolean. `1`, `t` and `true` are true, anything else,
    /// including values that do not parse, is false.
    pub fn resolve_bool(&self, name: &str) -> bool {
        let (value, _) = self.resolve(name);
        parse_bool(&value).unwrap_or(false)
    }

    /// Parses the resolved value, using `fallback` when it is empty.
    pub fn resolve_parsed<T>(&self, name: &str, fallback: T) -> Result<T, ConfigurationError>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let (value, _) = self.resolve(name);
        let trimmed = value.trim();

        if trimmed.is_empty() {
            Ok(fallback)
        } else {
            trimmed.parse().map_err(|error| ConfigurationError {
                name: String::from(name),
                value: value.clone(),
                source: Box::new(error),
            })
        }
    }

    /// Prints the build time configuration and its effective values.
    pub fn log_configuration(&self) {
        let build_configurations = self
            .configurations
            .iter()
            .filter(|configuration| configuration.build)
            .collect::<Vec<_>>();

        if build_configurations.is_empty() {
            return;
        }

        let width = build_configurations
            .iter()
            .map(|configuration| configuration.name.len())
            .max()
            .unwrap_or_default();

        log_info("Build Configuration:");
        for configuration in build_configurations {
            let (value, set) = self.resolve(&configuration.name);
            let value = if set || !value.is_empty() {
                value
            } else {
                String::from("<unset>")
            };

            log_info(format!(
                "  {:<width$}  {:<24}  {}",
                if set {
                    format!("${}", configuration.name)
                } else {
                    configuration.name.clone()
                },
                value,
                configuration.description,
                width = width + 1
            ));
        }
    }
}

/// Returns the process environment with the platform environment layered on top.
///
/// Earlier buildpacks export variables such as `BPI_*` through their build layers, and those only
/// reach this buildpack through its process environment.
pub fn build_environment(process: &Env, platform: &Env) -> Env {
    let mut env = process.clone();
    for (key, value) in platform {
        env.insert(key.clone(), value.clone());
    }
    env
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
