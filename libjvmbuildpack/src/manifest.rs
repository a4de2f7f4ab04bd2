//! Reading of JAR manifests (`META-INF/MANIFEST.MF`).
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MAIN_CLASS: &str = "Main-Class";

#[derive(thiserror::Error, Debug)]
#[error("unable to read manifest {0}")]
pub struct ManifestError(pub PathBuf, #[source] pub io::Error);

/// The main section attributes of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    attributes: HashMap<String, String>,
}

impl Manifest {
    /// Reads `META-INF/MANIFEST.MF` from an application directory. A missing manifest is an
    /// empty one.
    pub fn from_app_dir(app_dir: &Path) -> Result<Self, ManifestError> {
        let path = app_dir.join("META-INF").join("MANIFEST.MF");

        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ManifestError(path, error)),
        }
    }

    /// Parses manifest contents. Lines starting with a single space continue the previous
    /// value, and only the main section (up to the first blank line) is read.
    pub fn parse(contents: &str) -> Self {
        let mut attributes = HashMap::new();
        let mut current: Option<(String, String)> = None;

        for line in contents.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if let Some(continuation) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(continuation);
                }
                continue;
            }

            if let Some((key, value)) = current.take() {
                attributes.insert(key, value);
            }

            if line.is_empty() {
                break;
            }

            if let Some((key, value)) = line.split_once(':') {
                current = Some((
                    key.trim().to_string(),
                    value.strip_prefix(' ').unwrap_or(value).to_string(),
                ));
            }
        }

        if let Some((key, value)) = current {
            attributes.insert(key, value);
        }

        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn main_class(&self) -> Option<&str> {
        self.get(MAIN_CLASS).filter(|value| !value.trim().is_empty())
    }
}
