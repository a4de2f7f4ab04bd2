//! Dependency descriptors declared in `buildpack.toml` and their resolution.
//!
//! Dependencies are declared as `[[metadata.dependencies]]` tables:
//!
//! ```toml
//! [[metadata.dependencies]]
//! id = "tomcat"
//! name = "Apache Tomcat"
//! version = "10.1.28"
//! uri = "https://archive.apache.org/dist/tomcat/tomcat-10/v10.1.28/bin/apache-tomcat-10.1.28.tar.gz"
//! stacks = ["*"]
//! purl = "pkg:generic/apache-tomcat@10.1.28"
//! cpes = ["cpe:2.3:a:apache:tomcat:10.1.28:*:*:*:*:*:*:*"]
//! ```
use crate::sbom::{BomEntry, SyftArtifact};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Stack id that matches every stack.
pub const ANY_STACK: &str = "*";

/// A concrete, downloadable artifact a buildpack depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildpackDependency {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub version: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default)]
    pub stacks: Vec<String>,
    #[serde(default)]
    pub purl: String,
    #[serde(default)]
    pub cpes: Vec<String>,
    #[serde(default)]
    pub licenses: Vec<License>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct License {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl BuildpackDependency {
    /// The file name of the artifact, taken from the last path segment of its URI.
    pub fn artifact_name(&self) -> &str {
        let path = self
            .uri
            .split(['?', '#'])
            .next()
            .unwrap_or(self.uri.as_str());

        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(path)
    }

    /// Human readable name, falling back to the id for descriptors without one.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn supports_stack(&self, stack_id: &str) -> bool {
        self.stacks.is_empty()
            || self
                .stacks
                .iter()
                .any(|stack| stack == ANY_STACK || stack == stack_id)
    }

    /// Creates a bill of materials entry for this dependency.
    pub fn as_bom_entry(&self, layer: impl Into<String>, build: bool, launch: bool) -> BomEntry {
        BomEntry {
            name: self.id.clone(),
            build,
            launch,
            layer: layer.into(),
            dependency: self.clone(),
        }
    }

    pub fn as_syft_artifact(&self) -> SyftArtifact {
        SyftArtifact::from_dependency(self)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("invalid version constraint '{constraint}' for dependency {id}")]
    InvalidVersionConstraint {
        id: String,
        constraint: String,
        #[source]
        source: semver::Error,
    },
    #[error("no valid dependencies for {id}, {constraint}, and {stack} in [{candidates}]")]
    NoValidDependencies {
        id: String,
        constraint: String,
        stack: String,
        candidates: String,
    },
}

/// Picks dependency descriptors from a list by id, version constraint and stack.
#[derive(Debug, Clone)]
pub struct DependencyResolver<'a> {
    dependencies: &'a [BuildpackDependency],
    stack_id: Option<String>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(dependencies: &'a [BuildpackDependency], stack_id: Option<String>) -> Self {
        Self {
            dependencies,
            stack_id,
        }
    }

    /// Resolves the highest version of the dependency with the given id.
    ///
    /// A missing, empty or `*` constraint matches every version. A constraint that is a complete
    /// version (`10.1.28`) only matches that exact version, everything else is interpreted as a
    /// semver requirement (`10.*`, `>=9.0.0, <11.0.0`).
    pub fn resolve(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<BuildpackDependency, ResolveError> {
        let constraint = VersionConstraint::parse(version.unwrap_or_default()).map_err(
            |source| ResolveError::InvalidVersionConstraint {
                id: String::from(id),
                constraint: version.unwrap_or_default().to_string(),
                source,
            },
        )?;

        self.dependencies
            .iter()
            .filter(|dependency| dependency.id == id)
            .filter(|dependency| {
                self.stack_id
                    .as_deref()
                    .map_or(true, |stack_id| dependency.supports_stack(stack_id))
            })
            .filter_map(|dependency| {
                Version::parse(&dependency.version)
                    .ok()
                    .filter(|candidate| constraint.matches(candidate))
                    .map(|candidate| (candidate, dependency))
            })
            .max_by(|(left, _), (right, _)| left.cmp(right))
            .map(|(_, dependency)| dependency.clone())
            .ok_or_else(|| ResolveError::NoValidDependencies {
                id: String::from(id),
                constraint: constraint.to_string(),
                stack: self
                    .stack_id
                    .clone()
                    .unwrap_or_else(|| String::from(ANY_STACK)),
                candidates: self.candidates(id),
            })
    }

    fn candidates(&self, id: &str) -> String {
        self.dependencies
            .iter()
            .filter(|dependency| dependency.id == id)
            .map(|dependency| {
                format!(
                    "(ID: {}, Version: {}, Stacks: {})",
                    dependency.id,
                    dependency.version,
                    dependency.stacks.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug)]
enum VersionConstraint {
    Any,
    Exact(Version),
    Requirement(VersionReq),
}

impl VersionConstraint {
    fn parse(constraint: &str) -> Result<Self, semver::Error> {
        let constraint = constraint.trim();

        if constraint.is_empty() || constraint == "*" {
            Ok(Self::Any)
        } else if let Ok(version) = Version::parse(constraint) {
            Ok(Self::Exact(version))
        } else {
            VersionReq::parse(constraint).map(Self::Requirement)
        }
    }

    fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact == version,
            Self::Requirement(requirement) => requirement.matches(version),
        }
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(version) => write!(f, "{version}"),
            Self::Requirement(requirement) => write!(f, "{requirement}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependency(id: &str, version: &str, stacks: &[&str]) -> BuildpackDependency {
        BuildpackDependency {
            id: String::from(id),
            name: String::new(),
            version: String::from(version),
            uri: format!("https://localhost/{id}-{version}.tar.gz"),
            sha256: None,
            stacks: stacks.iter().map(ToString::to_string).collect(),
            purl: String::new(),
            cpes: vec![],
            licenses: vec![],
        }
    }

    #[test]
    fn resolves_highest_version_without_constraint() {
        let dependencies = vec![
            dependency("tomcat", "9.0.93", &["*"]),
            dependency("tomcat", "10.1.28", &["*"]),
            dependency("tomcat-logging-support", "3.4.0", &["*"]),
        ];
        let resolver = DependencyResolver::new(&dependencies, None);

        assert_eq!(resolver.resolve("tomcat", None).unwrap().version, "10.1.28");
        assert_eq!(
            resolver.resolve("tomcat", Some("")).unwrap().version,
            "10.1.28"
        );
    }

    #[test]
    fn resolves_wildcard_constraint() {
        let dependencies = vec![
            dependency("tomcat", "9.0.90", &["*"]),
            dependency("tomcat", "9.0.93", &["*"]),
            dependency("tomcat", "10.1.28", &["*"]),
        ];
        let resolver = DependencyResolver::new(&dependencies, None);

        assert_eq!(
            resolver.resolve("tomcat", Some("9.*")).unwrap().version,
            "9.0.93"
        );
    }

    #[test]
    fn exact_version_only_matches_that_version() {
        let dependencies = vec![
            dependency("tomcat", "1.1.1", &["test-stack-id"]),
            dependency("tomcat", "1.2.2", &["test-stack-id"]),
        ];
        let resolver = DependencyResolver::new(&dependencies, Some(String::from("test-stack-id")));

        assert_eq!(
            resolver.resolve("tomcat", Some("1.1.1")).unwrap().version,
            "1.1.1"
        );
    }

    #[test]
    fn filters_by_stack() {
        let dependencies = vec![
            dependency("tomcat", "10.1.28", &["other-stack"]),
            dependency("tomcat", "9.0.93", &["test-stack-id"]),
        ];
        let resolver = DependencyResolver::new(&dependencies, Some(String::from("test-stack-id")));

        assert_eq!(resolver.resolve("tomcat", None).unwrap().version, "9.0.93");
    }

    #[test]
    fn unknown_dependency_names_the_id() {
        let dependencies = vec![dependency("tomcat", "10.1.28", &["*"])];
        let resolver = DependencyResolver::new(&dependencies, None);

        let error = resolver.resolve("tomcat-lifecycle-support", None).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::NoValidDependencies { ref id, .. } if id == "tomcat-lifecycle-support"
        ));
    }

    #[test]
    fn invalid_constraint_is_an_error() {
        let dependencies = vec![dependency("tomcat", "10.1.28", &["*"])];
        let resolver = DependencyResolver::new(&dependencies, None);

        assert!(matches!(
            resolver.resolve("tomcat", Some("ten")),
            Err(ResolveError::InvalidVersionConstraint { .. })
        ));
    }

    #[test]
    fn artifact_name_is_last_uri_segment() {
        let mut dependency = dependency("tomcat-logging-support", "3.4.0", &["*"]);
        dependency.uri = String::from(
            "https://repo1.maven.org/maven2/org/cloudfoundry/tomcat-logging-support/3.4.0.RELEASE/tomcat-logging-support-3.4.0.RELEASE.jar",
        );
        assert_eq!(
            dependency.artifact_name(),
            "tomcat-logging-support-3.4.0.RELEASE.jar"
        );

        dependency.uri = String::from("https://localhost/config.tar.gz?token=abc");
        assert_eq!(dependency.artifact_name(), "config.tar.gz");
    }

    #[test]
    fn deserializes_buildpack_toml_table() {
        let dependency: BuildpackDependency = toml::from_str(
            r#"
id = "tomcat"
name = "Apache Tomcat"
version = "10.1.28"
uri = "https://localhost/apache-tomcat-10.1.28.tar.gz"
sha256 = "c31f9fd9b9458dd8dda54ce879dc7b08f8de0e638cb0936abcaa2316e7460c1e"
stacks = ["*"]
purl = "pkg:generic/apache-tomcat@10.1.28"
cpes = ["cpe:2.3:a:apache:tomcat:10.1.28:*:*:*:*:*:*:*"]

[[licenses]]
type = "Apache-2.0"
uri = "https://www.apache.org/licenses/"
"#,
        )
        .unwrap();

        assert_eq!(dependency.display_name(), "Apache Tomcat");
        assert_eq!(dependency.licenses[0].kind.as_deref(), Some("Apache-2.0"));
        assert!(dependency.supports_stack("io.buildpacks.stacks.jammy"));
    }
}
