//! Syft JSON documents describing the artifacts a buildpack installs, and bill of materials
//! entries.
use crate::dependency::BuildpackDependency;
use libcnb::data::sbom::SbomFormat;
use libcnb::sbom::Sbom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

const SYFT_SCHEMA_VERSION: &str = "1.1.0";
const SYFT_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/anchore/syft/main/schema/json/schema-1.1.0.json";
const SYFT_DESCRIPTOR_VERSION: &str = "0.32.0";

#[derive(thiserror::Error, Debug)]
pub enum SbomError {
    #[error("unable to encode Syft JSON")]
    Encode(#[source] serde_json::Error),
}

/// A bill of materials entry for a dependency contributed to a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomEntry {
    pub name: String,
    pub build: bool,
    pub launch: bool,
    pub layer: String,
    pub dependency: BuildpackDependency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftArtifact {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "FoundBy")]
    pub found_by: String,
    pub locations: Vec<SyftLocation>,
    pub licenses: Vec<String>,
    pub language: String,
    #[serde(rename = "CPEs")]
    pub cpes: Vec<String>,
    #[serde(rename = "PURL")]
    pub purl: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftLocation {
    pub path: String,
}

impl SyftArtifact {
    pub fn from_dependency(dependency: &BuildpackDependency) -> Self {
        let licenses = dependency
            .licenses
            .iter()
            .filter_map(|license| license.kind.clone())
            .collect();

        let mut artifact = Self {
            id: String::new(),
            name: dependency.display_name().to_string(),
            version: dependency.version.clone(),
            kind: String::from("UnknownPackage"),
            found_by: String::from("libjvmbuildpack"),
            locations: vec![SyftLocation {
                path: String::from("buildpack.toml"),
            }],
            licenses,
            language: String::new(),
            cpes: dependency.cpes.clone(),
            purl: dependency.purl.clone(),
        };
        artifact.id = artifact.hash();
        artifact
    }

    fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.name, &self.version, &self.kind, &self.purl] {
            hasher.update(part.as_bytes());
            hasher.update([0]);
        }
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftDocument {
    pub artifacts: Vec<SyftArtifact>,
    pub source: SyftSource,
    pub descriptor: SyftDescriptor,
    pub schema: SyftSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftSource {
    #[serde(rename = "Type")]
    pub kind: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftDescriptor {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SyftSchema {
    pub version: String,
    #[serde(rename = "URL")]
    pub url: String,
}

impl SyftDocument {
    /// Creates a document for the artifacts installed under `source`.
    pub fn new(source: &Path, artifacts: Vec<SyftArtifact>) -> Self {
        Self {
            artifacts,
            source: SyftSource {
                kind: String::from("directory"),
                target: source.to_string_lossy().into_owned(),
            },
            descriptor: SyftDescriptor {
                name: String::from("syft"),
                version: String::from(SYFT_DESCRIPTOR_VERSION),
            },
            schema: SyftSchema {
                version: String::from(SYFT_SCHEMA_VERSION),
                url: String::from(SYFT_SCHEMA_URL),
            },
        }
    }

    pub fn from_dependencies<'a>(
        source: &Path,
        dependencies: impl IntoIterator<Item = &'a BuildpackDependency>,
    ) -> Self {
        Self::new(
            source,
            dependencies
                .into_iter()
                .map(BuildpackDependency::as_syft_artifact)
                .collect(),
        )
    }

    pub fn to_sbom(&self) -> Result<Sbom, SbomError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(SbomError::Encode)?;
        Ok(Sbom::from_bytes(SbomFormat::SyftJson, bytes))
    }
}

/// Describes a list of bill of materials entries as a single Syft document.
pub fn bom_sbom(source: &Path, entries: &[BomEntry]) -> Result<Sbom, SbomError> {
    SyftDocument::from_dependencies(source, entries.iter().map(|entry| &entry.dependency)).to_sbom()
}
