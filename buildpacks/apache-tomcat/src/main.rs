mod config;
mod detect;
mod errors;
mod launch;
mod layers;

use crate::config::TomcatConfig;
use crate::detect::{ApplicationPackaging, Detection, PLAN_ENTRY_JAVA_APP_SERVER};
use crate::errors::{on_error, TomcatBuildpackError};
use crate::launch::{launch, start_command};
use crate::layers::base::{contribute_base, BaseDependencies, CatalinaBase};
use crate::layers::helper::contribute_helper;
use crate::layers::home::contribute_home;
use libcnb::build::{BuildContext, BuildResult, BuildResultBuilder};
use libcnb::detect::{DetectContext, DetectResult, DetectResultBuilder};
use libcnb::generic::GenericPlatform;
use libcnb::{buildpack_main, Buildpack, Env, Platform};
use libherokubuildpack::log::{log_header, log_info, log_warning};
use libjvmbuildpack::cache::DependencyCache;
use libjvmbuildpack::configuration::{
    build_environment, BuildpackConfiguration, ConfigurationResolver,
};
use libjvmbuildpack::dependency::{BuildpackDependency, DependencyResolver};
use libjvmbuildpack::log::init_debug_logging;
use libjvmbuildpack::sbom::bom_sbom;
use libjvmbuildpack::stack::{StackCapability, STACK_ID_ENV_VAR};
use serde::Deserialize;

// Suppress warnings due to the `unused_crate_dependencies` lint not handling integration tests well.
#[cfg(test)]
use libcnb_test as _;
#[cfg(test)]
use ureq as _;

const TOMCAT_DEPENDENCY_ID: &str = "tomcat";
const ACCESS_LOGGING_DEPENDENCY_ID: &str = "tomcat-access-logging-support";
const LIFECYCLE_DEPENDENCY_ID: &str = "tomcat-lifecycle-support";
const LOGGING_DEPENDENCY_ID: &str = "tomcat-logging-support";

pub(crate) struct TomcatBuildpack;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TomcatBuildpackMetadata {
    #[serde(default)]
    configurations: Vec<BuildpackConfiguration>,
    #[serde(default)]
    dependencies: Vec<BuildpackDependency>,
}

impl Buildpack for TomcatBuildpack {
    type Platform = GenericPlatform;
    type Metadata = TomcatBuildpackMetadata;
    type Error = TomcatBuildpackError;

    fn detect(&self, context: DetectContext<Self>) -> libcnb::Result<DetectResult, Self::Error> {
        let env = build_environment(&Env::from_current(), context.platform.env());
        let resolver =
            ConfigurationResolver::new(&context.buildpack_descriptor.metadata.configurations, &env);
        let (requested_app_server, _) = resolver.resolve("BP_JAVA_APP_SERVER");

        match detect::detect(&context.app_dir, &requested_app_server)
            .map_err(TomcatBuildpackError::Detect)?
        {
            Detection::Skip(reason) => {
                log_info(format!("SKIPPED: {reason}"));
                DetectResultBuilder::fail().build()
            }
            Detection::Pass {
                provides_application_package,
            } => {
                if !provides_application_package {
                    log_info(
                        "PASSED: a WEB-INF directory was not found, this is normal when building from source",
                    );
                }

                DetectResultBuilder::pass()
                    .build_plan(
                        detect::build_plan(provides_application_package)
                            .map_err(TomcatBuildpackError::BuildPlan)?,
                    )
                    .build()
            }
        }
    }

    fn build(&self, context: BuildContext<Self>) -> libcnb::Result<BuildResult, Self::Error> {
        let requested = context
            .buildpack_plan
            .entries
            .iter()
            .any(|entry| entry.name == PLAN_ENTRY_JAVA_APP_SERVER);

        let packaging = if requested {
            detect::application_packaging(&context.app_dir)
                .map_err(TomcatBuildpackError::Detect)?
        } else {
            None
        };

        let Some(packaging) = packaging else {
            log_info("No WAR files or WEB-INF directory found, skipping Tomcat");
            return BuildResultBuilder::new().build();
        };

        if packaging == ApplicationPackaging::WarFiles {
            log_info(format!(
                "{} contains war files.",
                context.app_dir.display()
            ));
        }

        let env = build_environment(&Env::from_current(), context.platform.env());
        init_debug_logging(&env);

        log_header(format!(
            "{} {}",
            context
                .buildpack_descriptor
                .buildpack
                .name
                .as_deref()
                .unwrap_or("Apache Tomcat"),
            context.buildpack_descriptor.buildpack.version
        ));

        let metadata = &context.buildpack_descriptor.metadata;
        let resolver = ConfigurationResolver::new(&metadata.configurations, &env);
        resolver.log_configuration();

        let config = TomcatConfig::from_resolver(&resolver, std::env::var(STACK_ID_ENV_VAR).ok())
            .map_err(TomcatBuildpackError::Configuration)?;

        let dependencies = DependencyResolver::new(&metadata.dependencies, config.stack_id.clone());
        let resolve = |id: &str, version: Option<&str>| {
            dependencies
                .resolve(id, version)
                .map_err(TomcatBuildpackError::DependencyResolution)
        };
        let tomcat = resolve(TOMCAT_DEPENDENCY_ID, Some(config.tomcat_version.as_str()))?;
        let base_dependencies = BaseDependencies {
            access_logging: resolve(ACCESS_LOGGING_DEPENDENCY_ID, None)?,
            lifecycle: resolve(LIFECYCLE_DEPENDENCY_ID, None)?,
            logging: resolve(LOGGING_DEPENDENCY_ID, None)?,
            external_configuration: config.external_configuration_dependency(),
        };
        let logging_jar = base_dependencies.logging.artifact_name().to_string();

        let download_dir = tempfile::tempdir().map_err(TomcatBuildpackError::DownloadDirectory)?;
        let cache = DependencyCache::for_buildpack(&context.buildpack_dir, download_dir.path());

        let (home_dir, home_bom_entry) =
            contribute_home(&context, &tomcat, &cache, config.relax_permissions)?;

        contribute_helper(&context)?;

        if config
            .external_configuration
            .as_ref()
            .is_some_and(|external| !external.is_cacheable())
        {
            log_warning(
                "External configuration is not cacheable",
                "Neither BP_TOMCAT_EXT_CONF_VERSION nor BP_TOMCAT_EXT_CONF_SHA256 is set, no layer caching will occur",
            );
        }

        let (base_dir, base_bom_entries) = contribute_base(
            &context,
            &CatalinaBase {
                app_dir: &context.app_dir,
                buildpack_dir: &context.buildpack_dir,
                home_dir: &home_dir,
                tomcat: &tomcat,
                config: &config,
                packaging,
                dependencies: base_dependencies,
                cache: &cache,
            },
        )?;

        let start_command = start_command(
            config.stack,
            &home_dir,
            &base_dir,
            &logging_jar,
            &config.jsse_opts,
        );

        if config.stack == StackCapability::Shellless {
            log_warning(
                "Stack without shell",
                "setenv.sh and CATALINA_* environment variables are not supported on this stack",
            );
        }

        let bom_entries = [vec![home_bom_entry], base_bom_entries].concat();
        let sbom = bom_sbom(&context.app_dir, &bom_entries).map_err(TomcatBuildpackError::Sbom)?;

        BuildResultBuilder::new()
            .launch(launch(&start_command))
            .launch_sbom(sbom)
            .build()
    }

    fn on_error(&self, error: libcnb::Error<Self::Error>) {
        on_error(error);
    }
}

buildpack_main!(TomcatBuildpack);
