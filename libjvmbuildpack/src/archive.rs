//! Archive extraction with support for stripping leading path components.
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("unable to open archive {0}")]
    Open(PathBuf, #[source] io::Error),
    #[error("unable to read entries of archive {0}")]
    Entries(PathBuf, #[source] io::Error),
    #[error("unable to read zip archive {0}")]
    Zip(PathBuf, #[source] zip::result::ZipError),
    #[error("unable to write {0}")]
    Write(PathBuf, #[source] io::Error),
    #[error("unsupported archive type {0}")]
    UnsupportedArchive(PathBuf),
}

/// Extracts the archive into `destination`, picking the format from the file extension.
///
/// `.tar.gz`/`.tgz`, `.tar` and `.zip`/`.jar`/`.war` archives are supported.
pub fn extract(
    archive: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ArchiveError> {
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive, destination, strip_components)
    } else if name.ends_with(".tar") {
        extract_tar(archive, destination, strip_components)
    } else if name.ends_with(".zip") || name.ends_with(".jar") || name.ends_with(".war") {
        extract_zip(archive, destination, strip_components)
    } else {
        Err(ArchiveError::UnsupportedArchive(archive.to_path_buf()))
    }
}

pub fn extract_tar_gz(
    archive: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ArchiveError> {
    let file =
        File::open(archive).map_err(|error| ArchiveError::Open(archive.to_path_buf(), error))?;
    unpack_tar(GzDecoder::new(file), archive, destination, strip_components)
}

pub fn extract_tar(
    archive: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ArchiveError> {
    let file =
        File::open(archive).map_err(|error| ArchiveError::Open(archive.to_path_buf(), error))?;
    unpack_tar(file, archive, destination, strip_components)
}

fn unpack_tar(
    reader: impl Read,
    archive_path: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ArchiveError> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);

    let entries = archive
        .entries()
        .map_err(|error| ArchiveError::Entries(archive_path.to_path_buf(), error))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|error| ArchiveError::Entries(archive_path.to_path_buf(), error))?;
        let path = entry
            .path()
            .map_err(|error| ArchiveError::Entries(archive_path.to_path_buf(), error))?
            .into_owned();

        let Some(relative) = strip(&path, strip_components) else {
            continue;
        };
        let target = destination.join(relative);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| ArchiveError::Write(parent.to_path_buf(), error))?;
        }

        entry
            .unpack(&target)
            .map_err(|error| ArchiveError::Write(target.clone(), error))?;
    }

    Ok(())
}

pub fn extract_zip(
    archive: &Path,
    destination: &Path,
    strip_components: usize,
) -> Result<(), ArchiveError> {
    let file =
        File::open(archive).map_err(|error| ArchiveError::Open(archive.to_path_buf(), error))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|error| ArchiveError::Zip(archive.to_path_buf(), error))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|error| ArchiveError::Zip(archive.to_path_buf(), error))?;

        let Some(path) = entry.enclosed_name() else {
            continue;
        };
        let Some(relative) = strip(&path, strip_components) else {
            continue;
        };
        let target = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|error| ArchiveError::Write(target.clone(), error))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| ArchiveError::Write(parent.to_path_buf(), error))?;
        }

        let mut output =
            File::create(&target).map_err(|error| ArchiveError::Write(target.clone(), error))?;
        io::copy(&mut entry, &mut output)
            .map_err(|error| ArchiveError::Write(target.clone(), error))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))
                .map_err(|error| ArchiveError::Write(target.clone(), error))?;
        }
    }

    Ok(())
}

/// Removes the first `count` components, ignoring `.` and rejecting anything that escapes the
/// destination. Returns `None` for entries that vanish entirely.
fn strip(path: &Path, count: usize) -> Option<PathBuf> {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(name) => components.push(name),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    let stripped = components
        .into_iter()
        .skip(count)
        .collect::<PathBuf>();

    (!stripped.as_os_str().is_empty()).then_some(stripped)
}
