//! Gzipped-tar packing and unpacking (§4.4). Packing walks each requested
//! top-level package, skipping any `__pycache__` directory; unpacking
//! validates every top-level member is a marker-bearing directory before
//! replacing whatever of the same name is already on disk.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use super::{fs as repo_fs, RepoError, PACKAGE_MARKER};

/// Builds a gzipped tar archive of the given top-level package names.
pub async fn pack(root: &Path, names: &[String]) -> Result<Vec<u8>, RepoError> {
    for name in names {
        repo_fs::validate_name(name)?;
        if !repo_fs::package_exists(root, name).await {
            return Err(RepoError::NotFound(format!("package {name} not found")));
        }
    }

    let root = root.to_path_buf();
    let names = names.to_vec();
    tokio::task::spawn_blocking(move || pack_blocking(&root, &names))
        .await
        .map_err(|e| RepoError::Io(e.to_string()))?
}

fn pack_blocking(root: &Path, names: &[String]) -> Result<Vec<u8>, RepoError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for name in names {
        let package_dir = root.join(name);
        append_dir_filtered(&mut builder, &package_dir, Path::new(name))?;
    }

    let encoder = builder.into_inner().map_err(|e| RepoError::Io(e.to_string()))?;
    encoder.finish().map_err(|e| RepoError::Io(e.to_string()))
}

fn append_dir_filtered<W: Write>(
    builder: &mut tar::Builder<W>,
    src: &Path,
    archive_relpath: &Path,
) -> Result<(), RepoError> {
    let walker = WalkDir::new(src).into_iter().filter_entry(|entry| {
        entry.file_type().is_file() || entry.file_name() != "__pycache__"
    });

    for entry in walker {
        let entry = entry.map_err(|e| RepoError::Io(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| RepoError::Io(e.to_string()))?;
        let archive_path = archive_relpath.join(rel);

        if entry.file_type().is_dir() {
            builder.append_dir(&archive_path, entry.path())?;
        } else if entry.file_type().is_file() {
            let mut file = File::open(entry.path())?;
            builder.append_file(&archive_path, &mut file)?;
        }
    }

    Ok(())
}

/// Unpacks a gzipped tar archive, validating that every top-level member
/// is a directory containing the package marker file, then replaces any
/// existing top-level entry of the same name. Returns the names extracted.
pub async fn unpack(root: &Path, bytes: Vec<u8>) -> Result<Vec<String>, RepoError> {
    repo_fs::ensure_root(root).await?;
    let root = root.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_blocking(&root, bytes))
        .await
        .map_err(|e| RepoError::Io(e.to_string()))?
}

fn unpack_blocking(root: &Path, bytes: Vec<u8>) -> Result<Vec<String>, RepoError> {
    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);

    let staging = tempfile::tempdir()?;
    archive
        .unpack(staging.path())
        .map_err(|e| RepoError::InvalidFile(format!("corrupt archive: {e}")))?;

    let mut top_level_names = Vec::new();
    for entry in std::fs::read_dir(staging.path())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            return Err(RepoError::InvalidFile(
                "top-level archive member must be a directory".into(),
            ));
        }
        if !entry.path().join(PACKAGE_MARKER).exists() {
            return Err(RepoError::InvalidFile(format!(
                "{} is missing the package marker file",
                entry.file_name().to_string_lossy()
            )));
        }
        let name = entry.file_name().to_string_lossy().to_string();
        repo_fs::validate_name(&name)
            .map_err(|_| RepoError::InvalidFile(format!("{name} is not a valid top-level package name")))?;
        top_level_names.push(name);
    }

    for name in &top_level_names {
        let dest = root.join(name);
        if dest.exists() {
            std::fs::remove_dir_all(&dest)?;
        }
        copy_dir_recursive(&staging.path().join(name), &dest)?;
    }

    Ok(top_level_names)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), RepoError> {
    std::fs::create_dir_all(dest)?;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| RepoError::Io(e.to_string()))?;
        let rel = entry.path().strip_prefix(src).expect("entry under src");
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_package(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(PACKAGE_MARKER), "").unwrap();
        for (rel, content) in files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
    }

    #[tokio::test]
    async fn pack_then_unpack_round_trips_package_contents() {
        let src_root = tempfile::tempdir().unwrap();
        write_package(src_root.path(), "pkgA", &[("m.py", "contents")]);
        std::fs::create_dir_all(src_root.path().join("pkgA/__pycache__")).unwrap();
        std::fs::write(src_root.path().join("pkgA/__pycache__/m.pyc"), "compiled").unwrap();

        let archive = pack(src_root.path(), &["pkgA".to_string()]).await.unwrap();

        let dest_root = tempfile::tempdir().unwrap();
        let names = unpack(dest_root.path(), archive).await.unwrap();
        assert_eq!(names, vec!["pkgA".to_string()]);
        assert!(dest_root.path().join("pkgA/m.py").exists());
        assert!(!dest_root.path().join("pkgA/__pycache__").exists());
    }

    #[tokio::test]
    async fn unpack_rejects_member_without_marker_file() {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.append_dir("not_a_package", ".").unwrap();
        let encoder = builder.into_inner().unwrap();
        let bytes = encoder.finish().unwrap();

        let dest_root = tempfile::tempdir().unwrap();
        let err = unpack(dest_root.path(), bytes).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidFile(_)));
    }

    #[tokio::test]
    async fn pack_rejects_unknown_package() {
        let src_root = tempfile::tempdir().unwrap();
        let err = pack(src_root.path(), &["ghost".to_string()]).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
