//! Common code for JVM buildpacks implemented with libcnb.rs
//!
//! Contains the dependency handling that `buildpack.toml` based buildpacks need on top of
//! libcnb.rs: resolving dependency descriptors, caching and verifying downloaded artifacts,
//! expanding archives, describing consumed artifacts as SBOMs, reading JAR manifests and
//! resolving user configuration.

pub mod archive;
pub mod cache;
pub mod configuration;
pub mod dependency;
pub mod layer;
pub mod log;
pub mod manifest;
pub mod sbom;
pub mod stack;
