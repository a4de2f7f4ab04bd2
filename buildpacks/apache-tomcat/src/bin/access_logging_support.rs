use libcnb::data::exec_d::ExecDProgramOutputKey;
use libcnb::data::exec_d_program_output_key;
use libcnb::exec_d::write_exec_d_program_output;
use libcnb::Env;
use libherokubuildpack::log::log_warning;
use std::collections::HashMap;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
use chrono as _;
#[cfg(test)]
use flate2 as _;
#[cfg(test)]
use libcnb_test as _;
use libjvmbuildpack as _;
use serde as _;
#[cfg(test)]
use tar as _;
use tempfile as _;
use thiserror as _;
use toml as _;
#[cfg(test)]
use ureq as _;
use walkdir as _;
#[cfg(test)]
use zip as _;

const ACCESS_LOGGING_ENABLED: &str = "BPL_TOMCAT_ACCESS_LOGGING_ENABLED";
const DEPRECATED_ACCESS_LOGGING: &str = "BPL_TOMCAT_ACCESS_LOGGING";
const JAVA_TOOL_OPTIONS: &str = "JAVA_TOOL_OPTIONS";
const ACCESS_LOGGING_PROPERTY: &str = "-Daccess.logging.enabled=true";

fn main() {
    write_exec_d_program_output(access_logging_output(&Env::from_current()));
}

fn access_logging_output(env: &Env) -> HashMap<ExecDProgramOutputKey, String> {
    let value = match (
        env.get(ACCESS_LOGGING_ENABLED),
        env.get(DEPRECATED_ACCESS_LOGGING),
    ) {
        (Some(value), _) => value,
        (None, Some(value)) => {
            log_warning(
                "Deprecated configuration",
                format!(
                    "{DEPRECATED_ACCESS_LOGGING} is deprecated and will be removed, use {ACCESS_LOGGING_ENABLED} instead"
                ),
            );
            value
        }
        (None, None) => return HashMap::new(),
    };

    if value.to_string_lossy().trim().eq_ignore_ascii_case("false") {
        return HashMap::new();
    }

    let java_tool_options = match env.get(JAVA_TOOL_OPTIONS) {
        Some(existing) => format!("{} {ACCESS_LOGGING_PROPERTY}", existing.to_string_lossy()),
        None => String::from(ACCESS_LOGGING_PROPERTY),
    };

    HashMap::from([(
        exec_d_program_output_key!("JAVA_TOOL_OPTIONS"),
        java_tool_options,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(variables: &[(&str, &str)]) -> Env {
        let mut env = Env::new();
        for (key, value) in variables {
            env.insert(*key, *value);
        }
        env
    }

    #[test]
    fn nothing_without_configuration() {
        assert!(access_logging_output(&env(&[])).is_empty());
    }

    #[test]
    fn enables_access_logging() {
        let output = access_logging_output(&env(&[(ACCESS_LOGGING_ENABLED, "true")]));

        assert_eq!(
            output.get("JAVA_TOOL_OPTIONS").map(String::as_str),
            Some("-Daccess.logging.enabled=true")
        );
    }

    #[test]
    fn appends_to_existing_java_tool_options() {
        let output = access_logging_output(&env(&[
            (ACCESS_LOGGING_ENABLED, ""),
            (JAVA_TOOL_OPTIONS, "-Xmx512m"),
        ]));

        assert_eq!(
            output.get("JAVA_TOOL_OPTIONS").map(String::as_str),
            Some("-Xmx512m -Daccess.logging.enabled=true")
        );
    }

    #[test]
    fn explicitly_disabled() {
        assert!(access_logging_output(&env(&[(ACCESS_LOGGING_ENABLED, "false")])).is_empty());
    }

    #[test]
    fn deprecated_variable_is_honored() {
        let output = access_logging_output(&env(&[(DEPRECATED_ACCESS_LOGGING, "enabled")]));

        assert_eq!(
            output.get("JAVA_TOOL_OPTIONS").map(String::as_str),
            Some("-Daccess.logging.enabled=true")
        );
    }

    #[test]
    fn new_variable_takes_precedence() {
        assert!(access_logging_output(&env(&[
            (ACCESS_LOGGING_ENABLED, "false"),
            (DEPRECATED_ACCESS_LOGGING, "true"),
        ]))
        .is_empty());
    }
}
