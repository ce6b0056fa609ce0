//! Path-hygiene helpers shared by the Watch Controller: reject traversal,
//! canonicalize, optionally pin inside a workspace root.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validates a project/working directory path.
pub fn validate_directory_path(path_str: &str) -> Result<PathBuf> {
    reject_parent_dir(path_str)?;

    let canonical = Path::new(path_str).canonicalize().map_err(|e| {
        Error::Configuration(format!(
            "Invalid or inaccessible directory '{}': {}",
            path_str, e
        ))
    })?;

    if !canonical.is_dir() {
        return Err(Error::Configuration(format!(
            "Not a directory: '{}'",
            canonical.display()
        )));
    }

    enforce_workspace_root(&canonical)?;
    Ok(canonical)
}

fn reject_parent_dir(path_str: &str) -> Result<()> {
    for component in Path::new(path_str).components() {
        if component == Component::ParentDir {
            return Err(Error::Configuration(format!(
                "path contains '..' component: {}",
                path_str
            )));
        }
    }
    Ok(())
}

fn enforce_workspace_root(canonical: &Path) -> Result<()> {
    if let Ok(workspace) = std::env::var("WORKSPACE_ROOT") {
        let workspace_canonical = PathBuf::from(&workspace)
            .canonicalize()
            .map_err(|e| Error::Configuration(format!("invalid WORKSPACE_ROOT '{}': {}", workspace, e)))?;

        if !canonical.starts_with(&workspace_canonical) {
            return Err(Error::Configuration(format!(
                "path outside workspace. path: '{}', workspace: '{}'",
                canonical.display(),
                workspace_canonical.display()
            )));
        }
    }
    Ok(())
}
