use crate::config::TomcatConfig;
use crate::detect::ApplicationPackaging;
use crate::errors::TomcatBuildpackError;
use crate::TomcatBuildpack;
use libcnb::build::BuildContext;
use libcnb::data::layer_name;
use libcnb::layer_env::{LayerEnv, ModificationBehavior, Scope};
use libherokubuildpack::log::{log_header, log_info};
use libjvmbuildpack::archive::{self, ArchiveError};
use libjvmbuildpack::cache::{DependencyCache, DependencyCacheError};
use libjvmbuildpack::dependency::BuildpackDependency;
use libjvmbuildpack::layer::{contribute_cached_layer, LayerContribution, LayerVisibility};
use libjvmbuildpack::log::log_debug;
use libjvmbuildpack::sbom::{BomEntry, SbomError, SyftDocument};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) const BASE_LAYER_NAME: &str = "catalina-base";

const CONFIGURATION_RESOURCES: [&str; 4] =
    ["context.xml", "logging.properties", "server.xml", "web.xml"];
const COMMON_LOADER: &str = "common.loader=";
const ADDITIONAL_COMMON_JARS: &str = "${BPI_TOMCAT_ADDITIONAL_COMMON_JARS}";
const ENVIRONMENT_PROPERTY_SOURCE: &str = "-Dorg.apache.tomcat.util.digester.PROPERTY_SOURCE=org.apache.tomcat.util.digester.EnvironmentPropertySource";

#[derive(thiserror::Error, Debug)]
pub(crate) enum BaseError {
    #[error("unable to create directory {0}")]
    CreateDirectory(PathBuf, #[source] io::Error),
    #[error("unable to copy {0} to {1}")]
    Copy(PathBuf, PathBuf, #[source] io::Error),
    #[error("unable to get dependency {0}")]
    Artifact(String, #[source] DependencyCacheError),
    #[error("unable to write file {0}")]
    Write(PathBuf, #[source] io::Error),
    #[error("unable to expand external configuration")]
    ExternalConfiguration(#[source] ArchiveError),
    #[error("unable to replace in file {0}")]
    CatalinaProperties(PathBuf, #[source] io::Error),
    #[error("unable to create symlink from {0} to {1}")]
    Symlink(PathBuf, PathBuf, #[source] io::Error),
    #[error("unable to list application directory {0}")]
    ListApplication(PathBuf, #[source] io::Error),
    #[error("unable to extract {0}")]
    ExplodeWar(PathBuf, #[source] ArchiveError),
    #[error("unable to remove {0}")]
    RemoveWar(PathBuf, #[source] io::Error),
    #[error(transparent)]
    Sbom(SbomError),
}

/// The support libraries installed into the Catalina base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct BaseDependencies {
    pub(crate) access_logging: BuildpackDependency,
    pub(crate) lifecycle: BuildpackDependency,
    pub(crate) logging: BuildpackDependency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) external_configuration: Option<BuildpackDependency>,
}

impl BaseDependencies {
    /// In contribution order.
    fn all(&self) -> impl Iterator<Item = &BuildpackDependency> {
        [&self.access_logging, &self.lifecycle, &self.logging]
            .into_iter()
            .chain(self.external_configuration.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct BaseLayerMetadata {
    tomcat: BuildpackDependency,
    context_path: String,
    packaging: ApplicationPackaging,
    dependencies: BaseDependencies,
    env_property_source_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    additional_jars: Option<String>,
    external_configuration_strip: usize,
}

/// Everything needed to assemble a Catalina base for one application.
pub(crate) struct CatalinaBase<'a> {
    pub(crate) app_dir: &'a Path,
    pub(crate) buildpack_dir: &'a Path,
    pub(crate) home_dir: &'a Path,
    /// The Tomcat installed in `home_dir`, whose `catalina.properties` the base starts from.
    pub(crate) tomcat: &'a BuildpackDependency,
    pub(crate) config: &'a TomcatConfig,
    pub(crate) packaging: ApplicationPackaging,
    pub(crate) dependencies: BaseDependencies,
    pub(crate) cache: &'a DependencyCache,
}

impl CatalinaBase<'_> {
    fn metadata(&self) -> BaseLayerMetadata {
        BaseLayerMetadata {
            tomcat: self.tomcat.clone(),
            context_path: self.config.context_path.clone(),
            packaging: self.packaging,
            dependencies: self.dependencies.clone(),
            env_property_source_disabled: self.config.env_property_source_disabled,
            additional_jars: self.config.additional_jars.clone(),
            external_configuration_strip: self.config.external_configuration_strip,
        }
    }

    pub(crate) fn bom_entries(&self) -> Vec<BomEntry> {
        self.dependencies
            .all()
            .map(|dependency| dependency.as_bom_entry(BASE_LAYER_NAME, false, true))
            .collect()
    }

    pub(crate) fn populate(&self, layer_path: &Path) -> Result<LayerContribution, BaseError> {
        self.contribute_configuration(layer_path)?;
        self.contribute_support_library(layer_path, &self.dependencies.access_logging)?;
        self.contribute_support_library(layer_path, &self.dependencies.lifecycle)?;
        self.contribute_logging(layer_path)?;

        if let Some(external_configuration) = &self.dependencies.external_configuration {
            self.contribute_external_configuration(layer_path, external_configuration)?;
        }

        self.contribute_catalina_properties(layer_path)?;

        let temp = layer_path.join("temp");
        create_dir_with_mode(&temp, 0o700)?;

        self.contribute_webapps(layer_path)?;

        let sbom = SyftDocument::from_dependencies(layer_path, self.dependencies.all())
            .to_sbom()
            .map_err(BaseError::Sbom)?;

        Ok(LayerContribution {
            env: launch_env(layer_path, self.config.env_property_source_disabled),
            sboms: vec![sbom],
        })
    }

    fn contribute_configuration(&self, layer_path: &Path) -> Result<(), BaseError> {
        let conf = layer_path.join("conf");
        fs::create_dir_all(&conf)
            .map_err(|error| BaseError::CreateDirectory(conf.clone(), error))?;

        for resource in CONFIGURATION_RESOURCES {
            log_info(format!("Copying {resource} to {}", conf.display()));
            copy(
                &self.buildpack_dir.join("resources").join(resource),
                &conf.join(resource),
            )?;
        }

        Ok(())
    }

    fn contribute_support_library(
        &self,
        layer_path: &Path,
        dependency: &BuildpackDependency,
    ) -> Result<(), BaseError> {
        let artifact = self.artifact(dependency)?;
        let lib = layer_path.join("lib");

        log_info(format!("Copying to {}", lib.display()));
        fs::create_dir_all(&lib)
            .map_err(|error| BaseError::CreateDirectory(lib.clone(), error))?;
        copy(&artifact, &lib.join(dependency.artifact_name()))
    }

    fn contribute_logging(&self, layer_path: &Path) -> Result<(), BaseError> {
        let logging = &self.dependencies.logging;
        let artifact = self.artifact(logging)?;
        let bin = layer_path.join("bin");

        log_info(format!("Copying to {}", bin.display()));
        fs::create_dir_all(&bin)
            .map_err(|error| BaseError::CreateDirectory(bin.clone(), error))?;
        let jar = bin.join(logging.artifact_name());
        copy(&artifact, &jar)?;

        let setenv = bin.join("setenv.sh");
        log_info(format!("Writing {}", setenv.display()));
        if let Some(additional_jars) = &self.config.additional_jars {
            log_info(format!("found BPI_TOMCAT_ADDITIONAL_JARS {additional_jars:?}"));
        }

        fs::write(
            &setenv,
            setenv_contents(&jar, self.config.additional_jars.as_deref()),
        )
        .map_err(|error| BaseError::Write(setenv.clone(), error))?;
        set_mode(&setenv, 0o755).map_err(|error| BaseError::Write(setenv.clone(), error))
    }

    fn contribute_external_configuration(
        &self,
        layer_path: &Path,
        dependency: &BuildpackDependency,
    ) -> Result<(), BaseError> {
        let artifact = self.artifact(dependency)?;

        log_info(format!("Expanding to {}", layer_path.display()));
        archive::extract_tar_gz(
            &artifact,
            layer_path,
            self.config.external_configuration_strip,
        )
        .map_err(BaseError::ExternalConfiguration)
    }

    fn contribute_catalina_properties(&self, layer_path: &Path) -> Result<(), BaseError> {
        log_header("Tomcat catalina.properties with altered common.loader");

        let home_properties = self.home_dir.join("conf").join("catalina.properties");
        let base_properties = layer_path.join("conf").join("catalina.properties");

        if !base_properties.exists() {
            if !home_properties.is_file() {
                log_info(format!(
                    "Skipping copying of catalina.properties, unable to open {}",
                    home_properties.display()
                ));
                return Ok(());
            }

            log_info(format!(
                "Copying catalina.properties to {}",
                layer_path.join("conf").display()
            ));
            copy(&home_properties, &base_properties)?;
        }

        log_info("Altering catalina.properties common.loader");
        alter_common_loader(&base_properties)
            .map_err(|error| BaseError::CatalinaProperties(base_properties.clone(), error))
    }

    fn contribute_webapps(&self, layer_path: &Path) -> Result<(), BaseError> {
        let webapps = layer_path.join("webapps");

        match self.packaging {
            ApplicationPackaging::WarFiles => symlink(self.app_dir, &webapps),
            ApplicationPackaging::Exploded => {
                fs::create_dir_all(&webapps)
                    .map_err(|error| BaseError::CreateDirectory(webapps.clone(), error))?;

                log_header(format!(
                    "Mounting application at {}",
                    self.config.context_path
                ));
                symlink(self.app_dir, &webapps.join(&self.config.context_path))
            }
        }
    }

    fn artifact(&self, dependency: &BuildpackDependency) -> Result<PathBuf, BaseError> {
        log_header(format!(
            "{} {}",
            dependency.display_name(),
            dependency.version
        ));

        self.cache
            .artifact(dependency)
            .map_err(|error| BaseError::Artifact(dependency.id.clone(), error))
    }
}

/// Assembles the `catalina-base` layer and returns its bill of materials entries.
///
/// WAR files are exploded on every build, since the application directory is not part of the
/// cached layer.
pub(crate) fn contribute_base(
    context: &BuildContext<TomcatBuildpack>,
    base: &CatalinaBase,
) -> libcnb::Result<(PathBuf, Vec<BomEntry>), TomcatBuildpackError> {
    let layer_ref = contribute_cached_layer(
        context,
        layer_name!("catalina-base"),
        LayerVisibility::LAUNCH,
        &base.metadata(),
        |layer_path| base.populate(layer_path).map_err(TomcatBuildpackError::Base),
    )?;

    if base.packaging == ApplicationPackaging::WarFiles {
        explode_war_files(base.app_dir).map_err(TomcatBuildpackError::Base)?;
    }

    Ok((layer_ref.path(), base.bom_entries()))
}

/// Extracts every `<app>/<name>.war` into `<app>/<name>/` and removes the archive.
pub(crate) fn explode_war_files(app_dir: &Path) -> Result<(), BaseError> {
    let mut war_files = fs::read_dir(app_dir)
        .map_err(|error| BaseError::ListApplication(app_dir.to_path_buf(), error))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|extension| extension == "war")
        })
        .collect::<Vec<_>>();
    war_files.sort();

    for war_file in war_files {
        log_debug(format!("Extracting: {}", war_file.display()));

        let target = war_file.with_extension("");
        fs::create_dir_all(&target)
            .map_err(|error| BaseError::CreateDirectory(target.clone(), error))?;

        archive::extract_zip(&war_file, &target, 0)
            .map_err(|error| BaseError::ExplodeWar(war_file.clone(), error))?;

        fs::remove_file(&war_file)
            .map_err(|error| BaseError::RemoveWar(war_file.clone(), error))?;
    }

    Ok(())
}

pub(crate) fn setenv_contents(logging_jar: &Path, additional_jars: Option<&str>) -> String {
    match additional_jars {
        Some(additional_jars) => {
            format!("CLASSPATH=\"{}:{additional_jars}\"", logging_jar.display())
        }
        None => format!("CLASSPATH=\"{}\"", logging_jar.display()),
    }
}

/// Prepends the additional common jars placeholder to every `common.loader` definition.
///
/// Lines that already reference the placeholder are left alone, so a configuration provided by
/// the user that already includes it is not altered twice.
pub(crate) fn alter_common_loader(path: &Path) -> io::Result<()> {
    let contents = fs::read_to_string(path)?;

    let altered = contents
        .split('\n')
        .map(|line| {
            if line.contains(COMMON_LOADER) && !line.contains(ADDITIONAL_COMMON_JARS) {
                line.replacen(
                    COMMON_LOADER,
                    &format!("{COMMON_LOADER}{ADDITIONAL_COMMON_JARS},"),
                    1,
                )
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    fs::write(path, altered)
}

fn launch_env(layer_path: &Path, env_property_source_disabled: bool) -> LayerEnv {
    let mut catalina_opts =
        format!("-DBPI_TOMCAT_ADDITIONAL_COMMON_JARS={ADDITIONAL_COMMON_JARS}");
    if !env_property_source_disabled {
        catalina_opts.push(' ');
        catalina_opts.push_str(ENVIRONMENT_PROPERTY_SOURCE);
    }

    LayerEnv::new()
        .chainable_insert(
            Scope::Launch,
            ModificationBehavior::Default,
            "CATALINA_OPTS",
            catalina_opts,
        )
        .chainable_insert(
            Scope::Launch,
            ModificationBehavior::Default,
            "CATALINA_BASE",
            layer_path,
        )
        .chainable_insert(
            Scope::Launch,
            ModificationBehavior::Default,
            "CATALINA_TMPDIR",
            "/tmp",
        )
}

fn copy(from: &Path, to: &Path) -> Result<(), BaseError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|error| BaseError::Copy(from.to_path_buf(), to.to_path_buf(), error))
}

fn create_dir_with_mode(path: &Path, mode: u32) -> Result<(), BaseError> {
    fs::create_dir_all(path)
        .and_then(|()| set_mode(path, mode))
        .map_err(|error| BaseError::CreateDirectory(path.to_path_buf(), error))
}

fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

fn symlink(original: &Path, link: &Path) -> Result<(), BaseError> {
    std::os::unix::fs::symlink(original, link)
        .map_err(|error| BaseError::Symlink(original.to_path_buf(), link.to_path_buf(), error))
}
