//! Safe path resolution (§4.2, §8): `safeJoin(project_workdir, relative_path)`.
//!
//! Grounded directly on the starting codebase's `tools/mod.rs::sandbox_check`
//! — join, canonicalize (falling back to the parent directory for
//! not-yet-existing write targets), then verify the result stays under the
//! canonicalized root — extended with explicit absolute-path rejection and
//! blocked-pattern checks (`.git/`, `.env`, `.ssh/`) that the original
//! helper didn't need because its sandbox never held a `.git` directory.

use std::path::{Path, PathBuf};

use crate::error::RouterError;

const BLOCKED_PATTERNS: &[&str] = &[".git", ".env", ".ssh"];

pub fn safe_join(working_dir: &Path, relative_path: &str) -> Result<PathBuf, RouterError> {
    if Path::new(relative_path).is_absolute() {
        return Err(RouterError::PathEscape(relative_path.to_string()));
    }

    if is_blocked(relative_path) {
        return Err(RouterError::BlockedPath(relative_path.to_string()));
    }

    let candidate = working_dir.join(relative_path);
    let resolved = candidate
        .canonicalize()
        .or_else(|_| {
            if let Some(parent) = candidate.parent() {
                let canon_parent = parent.canonicalize()?;
                Ok(canon_parent.join(candidate.file_name().unwrap_or_default()))
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "cannot resolve path",
                ))
            }
        })
        .map_err(RouterError::Io)?;

    let canon_root = working_dir.canonicalize().map_err(RouterError::Io)?;

    if resolved != canon_root && !resolved.starts_with(&canon_root) {
        return Err(RouterError::PathEscape(relative_path.to_string()));
    }
    Ok(resolved)
}

fn is_blocked(relative_path: &str) -> bool {
    let normalized = relative_path.replace('\\', "/");
    BLOCKED_PATTERNS.iter().any(|pat| {
        normalized == *pat
            || normalized.starts_with(&format!("{pat}/"))
            || normalized.contains(&format!("/{pat}/"))
            || normalized.ends_with(&format!("/{pat}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rejects_absolute_paths() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), "/etc/passwd");
        assert!(matches!(result, Err(RouterError::PathEscape(_))));
    }

    #[test]
    fn rejects_blocked_git_dir() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), ".git/config");
        assert!(matches!(result, Err(RouterError::BlockedPath(_))));
    }

    #[test]
    fn rejects_blocked_env_file() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), ".env");
        assert!(matches!(result, Err(RouterError::BlockedPath(_))));
    }

    #[test]
    fn rejects_nested_ssh_dir() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), "home/.ssh/id_rsa");
        assert!(matches!(result, Err(RouterError::BlockedPath(_))));
    }

    #[test]
    fn allows_relative_path_within_workdir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("foo.txt"), "hi").unwrap();
        let result = safe_join(dir.path(), "foo.txt").unwrap();
        assert!(result.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn dot_resolves_to_root() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), ".").unwrap();
        assert_eq!(result, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn rejects_escape_via_dotdot() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let result = safe_join(&sub, "../outside.txt");
        assert!(result.is_err());
    }

    #[test]
    fn allows_not_yet_existing_write_target() {
        let dir = tempdir().unwrap();
        let result = safe_join(dir.path(), "new_file.txt").unwrap();
        assert!(result.starts_with(dir.path().canonicalize().unwrap()));
    }
}
