use crate::detect::DetectError;
use crate::layers::base::BaseError;
use crate::layers::home::HomeError;
use libherokubuildpack::log::log_error;
use libjvmbuildpack::configuration::ConfigurationError;
use libjvmbuildpack::dependency::ResolveError;
use libjvmbuildpack::sbom::SbomError;
use std::error::Error;
use std::fmt::Write;

#[derive(Debug)]
pub(crate) enum TomcatBuildpackError {
    Detect(DetectError),
    BuildPlan(toml::ser::Error),
    Configuration(ConfigurationError),
    DependencyResolution(ResolveError),
    DownloadDirectory(std::io::Error),
    Home(HomeError),
    Base(BaseError),
    Sbom(SbomError),
}

impl From<TomcatBuildpackError> for libcnb::Error<TomcatBuildpackError> {
    fn from(error: TomcatBuildpackError) -> Self {
        Self::BuildpackError(error)
    }
}

pub(crate) fn on_error(error: libcnb::Error<TomcatBuildpackError>) {
    libherokubuildpack::error::on_error(on_tomcat_buildpack_error, error);
}

fn on_tomcat_buildpack_error(error: TomcatBuildpackError) {
    match error {
        TomcatBuildpackError::Detect(DetectError::Manifest(error)) => {
            log_error("Unable to read manifest", describe(&error));
        }
        TomcatBuildpackError::Detect(DetectError::WebInf(path, error)) => log_error(
            "Unable to inspect application",
            format!("unable to stat file {}: {error}", path.display()),
        ),
        TomcatBuildpackError::BuildPlan(error) => {
            log_error("Unable to create build plan", describe(&error));
        }
        TomcatBuildpackError::Configuration(error) => {
            log_error("Invalid configuration", describe(&error));
        }
        TomcatBuildpackError::DependencyResolution(error) => {
            log_error("Unable to find dependency", describe(&error));
        }
        TomcatBuildpackError::DownloadDirectory(error) => log_error(
            "Unable to create download directory",
            describe(&error),
        ),
        TomcatBuildpackError::Home(error) => {
            log_error("Unable to contribute Apache Tomcat", describe(&error));
        }
        TomcatBuildpackError::Base(error) => {
            log_error("Unable to contribute Catalina base", describe(&error));
        }
        TomcatBuildpackError::Sbom(error) => {
            log_error("Unable to write SBOM", describe(&error));
        }
    }
}

/// Renders an error followed by each of its causes on a separate line.
fn describe(error: &dyn Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let _ = write!(message, "\nCaused by: {cause}");
        source = cause.source();
    }

    message
}
