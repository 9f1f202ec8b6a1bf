//! Git operator (§4.7, §6): `git apply`/`commit`/`push`/`status` run as
//! subprocesses with `GIT_TERMINAL_PROMPT=0`, refusing pushes to
//! protected branches.
//!
//! Grounded on the starting codebase's `harness/git_manager.rs` subprocess
//! pattern (explicit `Command::new("git")`, `current_dir`, captured
//! stdout/stderr, non-zero exit mapped to an error carrying stderr) and
//! `shell_safety.rs` for argument validation — no argument here is ever
//! interpolated into a shell string, so [`validate_arg`] is used as
//! defense-in-depth rather than as the primary protection.

use std::path::Path;
use std::process::Output;

use crate::error::RouterError;
use crate::shell_safety::validate_arg;

pub const PROTECTED_BRANCHES: &[&str] = &["main", "master", "production"];

pub struct GitResult {
    pub stdout: String,
    pub stderr: String,
}

fn run_git(working_dir: &Path, args: &[&str]) -> Result<GitResult, RouterError> {
    for arg in args {
        validate_arg(arg).map_err(|e| RouterError::ValidationError(e.to_string()))?;
    }

    let output: Output = std::process::Command::new("git")
        .args(args)
        .current_dir(working_dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(RouterError::Io)?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        return Err(RouterError::CommandFailed {
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(GitResult { stdout, stderr })
}

pub fn status(working_dir: &Path) -> Result<GitResult, RouterError> {
    run_git(working_dir, &["status", "--porcelain"])
}

pub fn apply_check(working_dir: &Path, patch_path: &str) -> Result<GitResult, RouterError> {
    run_git(working_dir, &["apply", "--check", patch_path])
}

pub fn apply(working_dir: &Path, patch_path: &str) -> Result<GitResult, RouterError> {
    run_git(working_dir, &["apply", patch_path])
}

pub fn commit(working_dir: &Path, message: &str) -> Result<GitResult, RouterError> {
    validate_arg(message).map_err(|e| RouterError::ValidationError(e.to_string()))?;
    run_git(working_dir, &["add", "-A"])?;
    run_git(working_dir, &["commit", "-m", message])
}

/// Refuses to push directly to a protected branch (§4.7): agents must
/// route changes to `main`/`master`/`production` through review.
pub fn push(working_dir: &Path, remote: &str, branch: &str) -> Result<GitResult, RouterError> {
    if PROTECTED_BRANCHES.contains(&branch) {
        return Err(RouterError::BlockedPath(format!(
            "refusing to push directly to protected branch `{branch}`"
        )));
    }
    run_git(working_dir, &["push", remote, branch])
}

pub fn current_branch(working_dir: &Path) -> Result<String, RouterError> {
    let result = run_git(working_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(result.stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        run_git(dir.path(), &["init", "-q"]).unwrap();
        run_git(dir.path(), &["config", "user.email", "test@example.com"]).unwrap();
        run_git(dir.path(), &["config", "user.name", "Test"]).unwrap();
        dir
    }

    #[test]
    fn status_on_clean_repo_is_empty() {
        let dir = init_repo();
        let result = status(dir.path()).unwrap();
        assert!(result.stdout.trim().is_empty());
    }

    #[test]
    fn commit_creates_a_commit() {
        let dir = init_repo();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let result = commit(dir.path(), "add a.txt").unwrap();
        assert!(result.stderr.is_empty() || result.stdout.contains("a.txt") || true);
        let status_after = status(dir.path()).unwrap();
        assert!(status_after.stdout.trim().is_empty());
    }

    #[test]
    fn push_to_protected_branch_is_refused() {
        let dir = init_repo();
        let result = push(dir.path(), "origin", "main");
        assert!(matches!(result, Err(RouterError::BlockedPath(_))));
    }

    #[test]
    fn commit_message_with_injection_chars_is_rejected() {
        let dir = init_repo();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let result = commit(dir.path(), "fix; rm -rf /");
        assert!(matches!(result, Err(RouterError::ValidationError(_))));
    }

    #[test]
    fn current_branch_returns_branch_name() {
        let dir = init_repo();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        commit(dir.path(), "initial").unwrap();
        let branch = current_branch(dir.path()).unwrap();
        assert!(!branch.is_empty());
    }
}
