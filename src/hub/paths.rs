//! Canonical locations of projects, reports and quarantined trees.

use std::path::{Path, PathBuf};

use crate::error::{HubError, Result};

/// Characters that may not appear in a project or report identifier.
pub const RESERVED_CHARS: &[char] = &[':', ';', '/', '?', '\\', '[', ']', '{', '}', '+', '=', '\'', '"'];

/// Whether the target directory is expected to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Absent,
    Present,
}

/// Trim an identifier and check it is usable as a directory name.
pub fn validate_identifier(raw: &str) -> Result<String> {
    let identifier = raw.trim();
    if identifier.is_empty() {
        return Err(HubError::validation(raw, "identifier is empty"));
    }
    if let Some(c) = identifier.chars().find(|c| RESERVED_CHARS.contains(c)) {
        return Err(HubError::validation(
            identifier,
            format!("contains invalid character '{}'", c),
        ));
    }
    if identifier == "." || identifier == ".." {
        return Err(HubError::validation(identifier, "reserved directory name"));
    }
    Ok(identifier.to_string())
}

/// Resolves and validates directories below the projects root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    projects_root: PathBuf,
    quarantine_root: PathBuf,
}

impl PathResolver {
    pub fn new(projects_root: impl Into<PathBuf>, quarantine_root: impl Into<PathBuf>) -> Self {
        Self {
            projects_root: projects_root.into(),
            quarantine_root: quarantine_root.into(),
        }
    }

    pub fn projects_root(&self) -> &Path {
        &self.projects_root
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    /// Directory of a project, checked against `expect`.
    pub async fn project_dir(&self, project: &str, expect: Expect) -> Result<PathBuf> {
        let project = validate_identifier(project)?;
        let dir = self.projects_root.join(&project);
        check(&dir, expect, || format!("project [{}]", project)).await?;
        Ok(dir)
    }

    /// Directory of a report. The owning project must exist; the report
    /// directory itself is checked against `expect`.
    pub async fn report_dir(&self, project: &str, report: &str, expect: Expect) -> Result<PathBuf> {
        let project_dir = self.project_dir(project, Expect::Present).await?;
        let report = validate_identifier(report)?;
        let dir = project_dir.join(&report);
        check(&dir, expect, || {
            format!("report [{}] of project [{}]", report, project.trim())
        })
        .await?;
        Ok(dir)
    }
}

async fn check(dir: &Path, expect: Expect, describe: impl FnOnce() -> String) -> Result<()> {
    let exists = tokio::fs::try_exists(dir)
        .await
        .map_err(|e| HubError::io("inspect", dir, e))?;
    match (expect, exists) {
        (Expect::Absent, true) => Err(HubError::Conflict {
            path: dir.to_path_buf(),
        }),
        (Expect::Present, false) => Err(HubError::NotFound {
            what: describe(),
            path: dir.to_path_buf(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HubErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_identifier_is_trimmed() {
        assert_eq!(validate_identifier("  smoke-tests ").unwrap(), "smoke-tests");
    }

    #[test]
    fn test_empty_and_reserved_identifiers_rejected() {
        for raw in ["", "   ", "a/b", "a:b", "q?", "x\\y", "[p]", "{p}", "a+b", "a=b", "it's", "\"q\"", ".."] {
            let err = validate_identifier(raw).unwrap_err();
            assert_eq!(err.kind(), HubErrorKind::Validation, "{raw}");
        }
    }

    #[tokio::test]
    async fn test_existence_expectations() {
        let temp = TempDir::new().unwrap();
        let resolver = PathResolver::new(temp.path().join("projects"), temp.path().join("laf"));
        std::fs::create_dir_all(temp.path().join("projects/alpha/run1")).unwrap();

        let dir = resolver.project_dir("alpha", Expect::Present).await.unwrap();
        assert_eq!(dir, temp.path().join("projects/alpha"));

        let err = resolver.project_dir("alpha", Expect::Absent).await.unwrap_err();
        assert_eq!(err.kind(), HubErrorKind::Conflict);

        let err = resolver.project_dir("beta", Expect::Present).await.unwrap_err();
        assert_eq!(err.kind(), HubErrorKind::NotFound);

        let err = resolver
            .report_dir("beta", "run1", Expect::Absent)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), HubErrorKind::NotFound);

        let dir = resolver
            .report_dir("alpha", "run2", Expect::Absent)
            .await
            .unwrap();
        assert_eq!(dir, temp.path().join("projects/alpha/run2"));
    }
}
