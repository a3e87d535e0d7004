use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use super::{RepoError, MANIFEST_SIDECAR};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<ModuleEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subpackages: Option<Vec<RepositoryEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_sets: Option<Vec<TestSetEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSetEntry {
    pub name: String,
    pub tests: Vec<String>,
}

/// Reads a package's sidecar manifest descriptor and prunes any module or
/// test set that yields no tests, enforcing the "contributes only if it
/// yields at least one test" rule of §4.4 even if the descriptor was
/// produced or edited by hand rather than by the authoring framework's
/// introspection helper.
pub async fn read(package_root: &Path, package_name: &str) -> Result<RepositoryEntry, RepoError> {
    let sidecar_path = package_root.join(MANIFEST_SIDECAR);
    let raw = fs::read_to_string(&sidecar_path)
        .await
        .map_err(|e| RepoError::NotFound(format!("manifest descriptor for {package_name}: {e}")))?;

    let mut entry: RepositoryEntry = serde_json::from_str(&raw)
        .map_err(|e| RepoError::InvalidFile(format!("malformed manifest for {package_name}: {e}")))?;
    entry.name = package_name.to_string();
    normalize(&mut entry);
    Ok(entry)
}

fn normalize(entry: &mut RepositoryEntry) {
    if let Some(modules) = entry.modules.take() {
        let kept: Vec<ModuleEntry> = modules.into_iter().filter_map(normalize_module).collect();
        entry.modules = if kept.is_empty() { None } else { Some(kept) };
    }
    if let Some(subpackages) = entry.subpackages.as_mut() {
        for sub in subpackages.iter_mut() {
            normalize(sub);
        }
    }
}

fn normalize_module(mut module: ModuleEntry) -> Option<ModuleEntry> {
    let test_sets: Vec<TestSetEntry> = module
        .test_sets
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|ts| !ts.tests.is_empty())
        .collect();

    if test_sets.is_empty() {
        None
    } else {
        module.test_sets = Some(test_sets);
        Some(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_empty_test_sets_and_modules() {
        let mut entry = RepositoryEntry {
            name: "pkgA".into(),
            modules: Some(vec![
                ModuleEntry {
                    name: "m_empty".into(),
                    test_sets: Some(vec![TestSetEntry {
                        name: "Empty".into(),
                        tests: vec![],
                    }]),
                },
                ModuleEntry {
                    name: "m_full".into(),
                    test_sets: Some(vec![TestSetEntry {
                        name: "Full".into(),
                        tests: vec!["test_one".into()],
                    }]),
                },
            ]),
            subpackages: None,
        };
        normalize(&mut entry);
        let modules = entry.modules.unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "m_full");
    }
}
