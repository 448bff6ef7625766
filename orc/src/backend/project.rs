//! Project detection: a best-effort filesystem sniff, not a pluggable
//! framework (§4.11 — deliberately modest; the storage backend is out of
//! the core's scope).

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub language: Option<String>,
    pub frameworks: Vec<String>,
    pub test_command: Option<String>,
    pub lint_command: Option<String>,
    pub build_command: Option<String>,
}

pub fn detect_project(root: &Path) -> ProjectInfo {
    if root.join("Cargo.toml").exists() {
        return ProjectInfo {
            language: Some("rust".to_string()),
            frameworks: Vec::new(),
            test_command: Some("cargo test".to_string()),
            lint_command: Some("cargo clippy".to_string()),
            build_command: Some("cargo build".to_string()),
        };
    }
    if root.join("package.json").exists() {
        return ProjectInfo {
            language: Some("javascript".to_string()),
            frameworks: Vec::new(),
            test_command: Some("npm test".to_string()),
            lint_command: Some("npm run lint".to_string()),
            build_command: Some("npm run build".to_string()),
        };
    }
    if root.join("go.mod").exists() {
        return ProjectInfo {
            language: Some("go".to_string()),
            frameworks: Vec::new(),
            test_command: Some("go test ./...".to_string()),
            lint_command: Some("go vet ./...".to_string()),
            build_command: Some("go build ./...".to_string()),
        };
    }
    if root.join("pyproject.toml").exists() || root.join("requirements.txt").exists() {
        return ProjectInfo {
            language: Some("python".to_string()),
            frameworks: Vec::new(),
            test_command: Some("pytest".to_string()),
            lint_command: Some("ruff check .".to_string()),
            build_command: None,
        };
    }
    ProjectInfo::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_rust_project() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname=\"x\"").unwrap();
        let info = detect_project(dir.path());
        assert_eq!(info.language.as_deref(), Some("rust"));
        assert_eq!(info.test_command.as_deref(), Some("cargo test"));
    }

    #[test]
    fn unknown_project_has_no_language() {
        let dir = tempdir().unwrap();
        let info = detect_project(dir.path());
        assert!(info.language.is_none());
    }
}
