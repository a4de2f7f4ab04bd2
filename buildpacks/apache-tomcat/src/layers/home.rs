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
use libjvmbuildpack::sbom::{BomEntry, SbomError, SyftDocument};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub(crate) const HOME_LAYER_NAME: &str = "tomcat";

/// Files below these directories of the Tomcat distribution get their permissions relaxed.
const RELAXED_PATHS: [(&str, &[&str]); 2] = [("bin", &["sh", "jar"]), ("lib", &["jar"])];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct HomeLayerMetadata {
    dependency: BuildpackDependency,
    relax_permissions: bool,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum HomeError {
    #[error("unable to get dependency {0}")]
    Artifact(String, #[source] DependencyCacheError),
    #[error("unable to expand Tomcat")]
    Extract(#[source] ArchiveError),
    #[error("unable to relax permissions on {0}")]
    RelaxPermissions(PathBuf, #[source] std::io::Error),
    #[error("unable to walk {0}")]
    Walk(PathBuf, #[source] walkdir::Error),
    #[error(transparent)]
    Sbom(SbomError),
}

/// Installs the Tomcat distribution into the `tomcat` layer and returns the layer path.
pub(crate) fn contribute_home(
    context: &BuildContext<TomcatBuildpack>,
    dependency: &BuildpackDependency,
    cache: &DependencyCache,
    relax_permissions: bool,
) -> libcnb::Result<(PathBuf, BomEntry), TomcatBuildpackError> {
    log_header(format!(
        "{} {}",
        dependency.display_name(),
        dependency.version
    ));

    let metadata = HomeLayerMetadata {
        dependency: dependency.clone(),
        relax_permissions,
    };

    let layer_ref = contribute_cached_layer(
        context,
        layer_name!("tomcat"),
        LayerVisibility::LAUNCH,
        &metadata,
        |layer_path| {
            populate_home(layer_path, dependency, cache, relax_permissions)
                .map_err(TomcatBuildpackError::Home)
        },
    )?;

    Ok((
        layer_ref.path(),
        dependency.as_bom_entry(HOME_LAYER_NAME, false, true),
    ))
}

pub(crate) fn populate_home(
    layer_path: &Path,
    dependency: &BuildpackDependency,
    cache: &DependencyCache,
    relax_permissions: bool,
) -> Result<LayerContribution, HomeError> {
    let artifact = cache
        .artifact(dependency)
        .map_err(|error| HomeError::Artifact(dependency.id.clone(), error))?;

    log_info(format!("Expanding to {}", layer_path.display()));
    archive::extract(&artifact, layer_path, 1).map_err(HomeError::Extract)?;

    if relax_permissions {
        relax_file_permissions(layer_path)?;
    }

    let sbom = SyftDocument::from_dependencies(layer_path, [dependency])
        .to_sbom()
        .map_err(HomeError::Sbom)?;

    Ok(LayerContribution {
        env: LayerEnv::new().chainable_insert(
            Scope::Launch,
            ModificationBehavior::Default,
            "CATALINA_HOME",
            layer_path,
        ),
        sboms: vec![sbom],
    })
}

fn relax_file_permissions(layer_path: &Path) -> Result<(), HomeError> {
    for (directory, extensions) in RELAXED_PATHS {
        let root = layer_path.join(directory);
        if !root.exists() {
            continue;
        }

        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(|error| HomeError::Walk(root.clone(), error))?;

            let matches_extension = entry.path().extension().is_some_and(|extension| {
                extensions.iter().any(|candidate| extension == *candidate)
            });

            if entry.file_type().is_file() && matches_extension {
                log_info(format!(
                    "Relaxing permissions on file: {}",
                    entry.path().display()
                ));
                set_mode(entry.path(), 0o755).map_err(|error| {
                    HomeError::RelaxPermissions(entry.path().to_path_buf(), error)
                })?;
            }
        }
    }

    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}
