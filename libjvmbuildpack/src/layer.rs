//! Cached layers that are only rebuilt when their metadata changes.
use libcnb::build::BuildContext;
use libcnb::data::layer::LayerName;
use libcnb::layer::{
    CachedLayerDefinition, InvalidMetadataAction, LayerRef, LayerState, RestoredLayerAction,
};
use libcnb::layer_env::LayerEnv;
use libcnb::sbom::Sbom;
use libcnb::Buildpack;
use libherokubuildpack::log::log_info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// What a populated layer exposes besides its files.
#[derive(Debug, Clone, Default)]
pub struct LayerContribution {
    pub env: LayerEnv,
    pub sboms: Vec<Sbom>,
}

/// Whether a cached layer is visible during build, launch or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerVisibility {
    pub build: bool,
    pub launch: bool,
}

impl LayerVisibility {
    pub const LAUNCH: Self = Self {
        build: false,
        launch: true,
    };
}

/// Restores the named layer if it was cached with metadata equal to `metadata`, otherwise
/// clears it and calls `populate` with the layer directory.
///
/// The environment and SBOMs returned by `populate` are written to the layer along with
/// `metadata`, so a later build with the same metadata can skip `populate` entirely.
pub fn contribute_cached_layer<B, M, F>(
    context: &BuildContext<B>,
    layer_name: LayerName,
    visibility: LayerVisibility,
    metadata: &M,
    populate: F,
) -> libcnb::Result<LayerRef<B, (), ()>, B::Error>
where
    B: Buildpack,
    M: Serialize + DeserializeOwned + PartialEq,
    F: FnOnce(&Path) -> Result<LayerContribution, B::Error>,
{
    let layer_ref = context.cached_layer(
        &layer_name,
        CachedLayerDefinition {
            build: visibility.build,
            launch: visibility.launch,
            invalid_metadata_action: &|_| InvalidMetadataAction::DeleteLayer,
            restored_layer_action: &|restored: &M, _| {
                if restored == metadata {
                    RestoredLayerAction::KeepLayer
                } else {
                    RestoredLayerAction::DeleteLayer
                }
            },
        },
    )?;

    match layer_ref.state {
        LayerState::Restored { .. } => {
            log_info(format!("Reusing cached layer {layer_name}"));
        }
        LayerState::Empty { .. } => {
            let contribution =
                populate(&layer_ref.path()).map_err(libcnb::Error::BuildpackError)?;

            layer_ref.write_env(&contribution.env)?;
            if !contribution.sboms.is_empty() {
                layer_ref.write_sboms(&contribution.sboms)?;
            }
            layer_ref.write_metadata(metadata)?;
        }
    }

    Ok(layer_ref)
}
