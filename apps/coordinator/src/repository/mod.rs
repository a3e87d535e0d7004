//! The package repository (C4, §4.4): a filesystem-backed catalog of
//! top-level test packages, manifest introspection via a sidecar
//! descriptor, and gzipped-tar archive packing/unpacking.

pub mod archive;
pub mod fs;
pub mod manifest;

pub use manifest::{ModuleEntry, RepositoryEntry, TestSetEntry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidFile(String),
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for RepoError {
    fn from(err: std::io::Error) -> Self {
        RepoError::Io(err.to_string())
    }
}

/// Name of the file whose presence marks a directory as a package.
pub const PACKAGE_MARKER: &str = "__init__.py";

/// Name of the sidecar descriptor an archive's authoring tool ships
/// alongside each top-level package, substituting for the runtime
/// introspection the original Python implementation performs (`spec.md`
/// §9's own Design Note anticipates this substitution).
pub const MANIFEST_SIDECAR: &str = "__manifest__.json";
