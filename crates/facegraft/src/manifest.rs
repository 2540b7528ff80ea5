//! Target lists stored as a JSON array of image paths.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest {} is not a JSON array of paths: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Whether `path` names a manifest rather than a single target image.
pub fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Read the ordered target list from `path`.
pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let data = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_paths_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        std::fs::write(&path, r#"["/art/p1.png", "/art/p2.png", "/art/p3.png"]"#).unwrap();

        let targets = read_manifest(&path).unwrap();
        assert_eq!(
            targets,
            vec![
                PathBuf::from("/art/p1.png"),
                PathBuf::from("/art/p2.png"),
                PathBuf::from("/art/p3.png"),
            ]
        );
    }

    #[test]
    fn test_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pages.json");
        std::fs::write(&path, r#"{"pages": []}"#).unwrap();
        assert!(matches!(read_manifest(&path), Err(ManifestError::Parse { .. })));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_manifest(&dir.path().join("absent.json")),
            Err(ManifestError::Io { .. })
        ));
    }

    #[test]
    fn test_manifest_detection() {
        assert!(is_manifest(Path::new("pages.json")));
        assert!(is_manifest(Path::new("PAGES.JSON")));
        assert!(!is_manifest(Path::new("page.png")));
        assert!(!is_manifest(Path::new("json")));
    }
}
