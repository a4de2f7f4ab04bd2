use crate::errors::TomcatBuildpackError;
use crate::TomcatBuildpack;
use libcnb::additional_buildpack_binary_path;
use libcnb::build::BuildContext;
use libcnb::data::layer_name;
use libcnb::layer::UncachedLayerDefinition;
use libherokubuildpack::log::log_header;

/// Installs the exec.d program that configures access logging when the container starts.
pub(crate) fn contribute_helper(
    context: &BuildContext<TomcatBuildpack>,
) -> libcnb::Result<(), TomcatBuildpackError> {
    log_header("Launch Helper");

    let layer_ref = context.uncached_layer(
        layer_name!("helper"),
        UncachedLayerDefinition {
            build: false,
            launch: true,
        },
    )?;

    layer_ref.write_exec_d_programs([(
        "access-logging-support",
        additional_buildpack_binary_path!("access_logging_support"),
    )])
}
