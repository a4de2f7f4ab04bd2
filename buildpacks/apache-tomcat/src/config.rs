use chrono::{SecondsFormat, Utc};
use libjvmbuildpack::configuration::{ConfigurationError, ConfigurationResolver};
use libjvmbuildpack::dependency::BuildpackDependency;
use libjvmbuildpack::stack::StackCapability;

pub(crate) const DEFAULT_CONTEXT_PATH: &str = "ROOT";
pub(crate) const DEFAULT_JSSE_OPTS: &str = "-Djdk.tls.ephemeralDHKeySize=2048";
pub(crate) const EXTERNAL_CONFIGURATION_ID: &str = "tomcat-external-configuration";
pub(crate) const EXTERNAL_CONFIGURATION_NAME: &str = "Tomcat External Configuration";

/// Build configuration, resolved once from the platform environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TomcatConfig {
    pub(crate) tomcat_version: String,
    pub(crate) context_path: String,
    pub(crate) relax_permissions: bool,
    pub(crate) env_property_source_disabled: bool,
    pub(crate) additional_jars: Option<String>,
    pub(crate) external_configuration: Option<ExternalConfiguration>,
    pub(crate) external_configuration_strip: usize,
    pub(crate) jsse_opts: String,
    pub(crate) stack_id: Option<String>,
    pub(crate) stack: StackCapability,
}

/// The user provided archive that is expanded over the Catalina base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExternalConfiguration {
    pub(crate) uri: String,
    pub(crate) version: Option<String>,
    pub(crate) sha256: Option<String>,
}

impl TomcatConfig {
    pub(crate) fn from_resolver(
        resolver: &ConfigurationResolver,
        stack_id: Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let (tomcat_version, _) = resolver.resolve("BP_TOMCAT_VERSION");
        let (jsse_opts, _) = resolver.resolve("JSSE_OPTS");

        let external_configuration =
            resolver
                .get("BP_TOMCAT_EXT_CONF_URI")
                .map(|uri| ExternalConfiguration {
                    uri,
                    version: resolver.get("BP_TOMCAT_EXT_CONF_VERSION"),
                    sha256: resolver.get("BP_TOMCAT_EXT_CONF_SHA256"),
                });

        Ok(Self {
            tomcat_version,
            context_path: context_path(resolver.get("BP_TOMCAT_CONTEXT_PATH").as_deref()),
            relax_permissions: resolver.resolve_bool("BP_TOMCAT_RELAX_PERMISSIONS"),
            env_property_source_disabled: resolver
                .resolve_bool("BP_TOMCAT_ENV_PROPERTY_SOURCE_DISABLED"),
            additional_jars: resolver.get("BPI_TOMCAT_ADDITIONAL_JARS"),
            external_configuration,
            external_configuration_strip: resolver
                .resolve_parsed("BP_TOMCAT_EXT_CONF_STRIP", 0)?,
            jsse_opts: if jsse_opts.is_empty() {
                String::from(DEFAULT_JSSE_OPTS)
            } else {
                jsse_opts
            },
            stack: StackCapability::from_stack_id(stack_id.as_deref()),
            stack_id,
        })
    }

    /// Describes the external configuration archive as a dependency, if one was requested.
    pub(crate) fn external_configuration_dependency(&self) -> Option<BuildpackDependency> {
        self.external_configuration.as_ref().map(|external| {
            external.as_dependency(self.stack_id.as_deref(), || {
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            })
        })
    }
}

impl ExternalConfiguration {
    /// Without a version or checksum the archive cannot be identified, so the current time is
    /// used as version, which makes every build refresh the layer.
    pub(crate) fn is_cacheable(&self) -> bool {
        self.version.is_some() || self.sha256.is_some()
    }

    fn as_dependency(
        &self,
        stack_id: Option<&str>,
        now: impl FnOnce() -> String,
    ) -> BuildpackDependency {
        let version = match (&self.version, self.is_cacheable()) {
            (Some(version), _) => version.clone(),
            (None, true) => String::new(),
            (None, false) => now(),
        };

        BuildpackDependency {
            id: String::from(EXTERNAL_CONFIGURATION_ID),
            name: String::from(EXTERNAL_CONFIGURATION_NAME),
            version,
            uri: self.uri.clone(),
            sha256: self.sha256.clone().filter(|sha256| !sha256.is_empty()),
            stacks: stack_id.map(String::from).into_iter().collect(),
            purl: String::new(),
            cpes: vec![],
            licenses: vec![],
        }
    }
}

/// Turns a context path such as `/alpha/bravo/` into the web application directory name
/// Tomcat expects (`alpha#bravo`).
pub(crate) fn context_path(configured: Option<&str>) -> String {
    let trimmed = configured
        .unwrap_or(DEFAULT_CONTEXT_PATH)
        .trim_start_matches('/')
        .trim_end_matches('/')
        .replace('/', "#");

    if trimmed.is_empty() {
        String::from(DEFAULT_CONTEXT_PATH)
    } else {
        trimmed
    }
}
