use std::path::{Path, PathBuf};

use tokio::fs;

use super::{RepoError, PACKAGE_MARKER};

/// Ensures the repository root exists, creating it if missing.
pub async fn ensure_root(root: &Path) -> Result<(), RepoError> {
    fs::create_dir_all(root).await?;
    Ok(())
}

/// Rejects anything but a bare top-level package name: the original's
/// `compress_test_packages` ignores a dotted (sub-package) name, and a
/// name containing a path separator would otherwise let a request escape
/// the repository root (§4.4's "only top-level package names may be
/// requested — reject others with invalid-request").
pub fn validate_name(name: &str) -> Result<(), RepoError> {
    if name.is_empty() || name.contains('.') || name.contains('/') || name.contains('\\') {
        return Err(RepoError::InvalidRequest(format!(
            "{name} is not a valid top-level package name"
        )));
    }
    Ok(())
}

pub fn package_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

pub async fn package_exists(root: &Path, name: &str) -> bool {
    let path = package_path(root, name);
    fs::metadata(path.join(PACKAGE_MARKER)).await.is_ok()
}

/// Lists every top-level directory under `root` that carries the package
/// marker file, sorted for deterministic listing.
pub async fn list_top_level(root: &Path) -> Result<Vec<String>, RepoError> {
    let mut entries = fs::read_dir(root).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let marker = entry.path().join(PACKAGE_MARKER);
        if fs::metadata(&marker).await.is_ok() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

/// Removes a top-level package directory if present; a no-op if absent.
pub async fn remove_package(root: &Path, name: &str) -> Result<(), RepoError> {
    let path = package_path(root, name);
    match fs::remove_dir_all(&path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
