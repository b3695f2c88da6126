//! Writing a resolved manifest to disk
//!
//! The target root is always replaced wholesale, never merged: an existing
//! root is removed before anything is written. Each file lands via a sibling
//! temp file and a rename, so no file is ever half-written; the tree as a
//! whole is not transactional.

use crate::templates::manifest::{is_safe_relative, EntryContent, EntryKind, ManifestEntry};
use crate::templates::render::RenderContext;
use std::borrow::Cow;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("'{path}' already exists and is not empty\ntip: confirm the replacement or choose another directory")]
    OverwriteNotConfirmed { path: PathBuf },

    #[error("manifest path '{path}' must be relative and stay inside the project")]
    UnsafePath { path: PathBuf },

    #[error("'{path}' contains the current directory and cannot be replaced\ntip: pass --directory with a new subdirectory")]
    ContainsWorkingDir { path: PathBuf },

    #[error("failed to {action} '{path}': {source}\nnote: the project tree may be incomplete")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl MaterializeError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| MaterializeError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    pub root: PathBuf,
    pub directories: usize,
    pub files: usize,
    /// Whether a previous root was removed first
    pub replaced_existing: bool,
}

/// Number of items directly inside `root`; `None` if it does not exist
///
/// A non-directory at `root` counts as one item.
pub fn existing_items(root: &Path) -> io::Result<Option<usize>> {
    match std::fs::symlink_metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(Some(std::fs::read_dir(root)?.count())),
        Ok(_) => Ok(Some(1)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Make `root` absolute against `cwd` and fold `.` and `..` lexically
pub fn normalize_root(root: &Path, cwd: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in cwd.join(root).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// [`normalize_root`] against the process working directory
pub fn resolve_root(root: &Path) -> Result<PathBuf, MaterializeError> {
    let cwd = std::env::current_dir().map_err(MaterializeError::io("read working directory of", root))?;
    Ok(normalize_root(root, &cwd))
}

/// Refuse to replace `cwd` itself or any of its ancestors
pub fn check_replaceable(root: &Path, cwd: &Path) -> Result<(), MaterializeError> {
    let root_real = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let cwd_real = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
    if cwd_real.starts_with(&root_real) || cwd.starts_with(root) {
        return Err(MaterializeError::ContainsWorkingDir {
            path: root.to_path_buf(),
        });
    }
    Ok(())
}

/// Order in which entries are applied
///
/// All directories first, shallowest first (stable within a depth), then files
/// in manifest order. A file's parent directory entry therefore always
/// precedes it regardless of how the manifest is ordered.
pub fn staging_order(entries: &[ManifestEntry]) -> Vec<&ManifestEntry> {
    let mut staged: Vec<&ManifestEntry> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Directory)
        .collect();
    staged.sort_by_key(|e| e.depth());
    staged.extend(entries.iter().filter(|e| e.kind == EntryKind::File));
    staged
}

/// Recreate `root` from `entries`
///
/// A non-empty existing root is only replaced when `overwrite_confirmed` is
/// set; otherwise it is left untouched and an error is returned. A root that
/// holds the working directory is never replaced. An empty root is reused.
pub async fn materialize(
    root: &Path,
    entries: &[ManifestEntry],
    overwrite_confirmed: bool,
    context: &RenderContext,
) -> Result<MaterializeReport, MaterializeError> {
    for entry in entries {
        let has_name = entry.kind == EntryKind::Directory || entry.relative_path.file_name().is_some();
        if !is_safe_relative(&entry.relative_path) || !has_name {
            return Err(MaterializeError::UnsafePath {
                path: entry.relative_path.clone(),
            });
        }
    }

    let cwd = std::env::current_dir().map_err(MaterializeError::io("read working directory of", root))?;
    let root = normalize_root(root, &cwd);
    let root = root.as_path();

    let existing = existing_items(root).map_err(MaterializeError::io("inspect", root))?;
    let occupied = matches!(existing, Some(count) if count > 0);
    if occupied {
        check_replaceable(root, &cwd)?;
        if !overwrite_confirmed {
            return Err(MaterializeError::OverwriteNotConfirmed {
                path: root.to_path_buf(),
            });
        }
        remove_existing(root).await?;
    }
    fs::create_dir_all(root)
        .await
        .map_err(MaterializeError::io("create directory", root))?;

    let mut report = MaterializeReport {
        root: root.to_path_buf(),
        directories: 0,
        files: 0,
        replaced_existing: occupied,
    };

    for entry in staging_order(entries) {
        let target = root.join(&entry.relative_path);
        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target)
                    .await
                    .map_err(MaterializeError::io("create directory", &target))?;
                report.directories += 1;
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(MaterializeError::io("create directory", parent))?;
                }
                let bytes: Cow<'_, [u8]> = match &entry.content {
                    EntryContent::Literal(bytes) => Cow::Borrowed(bytes.as_slice()),
                    EntryContent::Template(text) => Cow::Owned(context.render(text).into_bytes()),
                };
                write_atomic(&target, &bytes, entry.executable).await?;
                report.files += 1;
            }
        }
    }

    Ok(report)
}

async fn remove_existing(root: &Path) -> Result<(), MaterializeError> {
    let meta = fs::symlink_metadata(root)
        .await
        .map_err(MaterializeError::io("inspect", root))?;
    let removed = if meta.is_dir() {
        fs::remove_dir_all(root).await
    } else {
        fs::remove_file(root).await
    };
    removed.map_err(MaterializeError::io("remove", root))
}

/// Write to `.<name>.partial` next to the target, then rename over it
async fn write_atomic(target: &Path, bytes: &[u8], executable: bool) -> Result<(), MaterializeError> {
    let name = target
        .file_name()
        .ok_or_else(|| MaterializeError::UnsafePath {
            path: target.to_path_buf(),
        })?
        .to_string_lossy();
    let temp_path = target.with_file_name(format!(".{}.partial", name));

    fs::write(&temp_path, bytes)
        .await
        .map_err(MaterializeError::io("write", &temp_path))?;

    if executable {
        make_executable(&temp_path).await?;
    }

    fs::rename(&temp_path, target)
        .await
        .map_err(MaterializeError::io("write", target))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), MaterializeError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(MaterializeError::io("set permissions on", path))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), MaterializeError> {
    Ok(())
}
