//! Shell/command execution (§4.2, §6): commands are executed without
//! shell interpretation where possible; where a shell is required, an
//! allowlist is consulted.
//!
//! Grounded on the starting codebase's `tools/exec_tool.rs`
//! (allowlist check, `spawn_blocking` + `tokio::time::timeout`, combined
//! stdout/stderr on non-zero exit rather than an error) with one change:
//! the command is first attempted via direct `Command::new(program).args()`
//! (no shell) using `shlex::split`, falling back to `sh -c` only when the
//! split reveals shell metacharacters the direct path can't express.

use std::process::Output;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::RouterError;

pub const ALLOWED_COMMANDS: &[&str] = &[
    "cargo", "git", "rg", "fd", "ls", "wc", "find", "grep", "cat", "head", "tail", "sed", "awk",
    "sort", "uniq", "diff", "touch", "mkdir", "npm", "pnpm", "yarn", "go", "make", "python3",
];

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const TEST_TIMEOUT_SECS: u64 = 300;

pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

fn needs_shell(command: &str) -> bool {
    command.contains('|')
        || command.contains('>')
        || command.contains('<')
        || command.contains("&&")
        || command.contains(';')
        || command.contains('$')
}

fn program_name(command: &str) -> Option<String> {
    shlex::split(command)
        .and_then(|parts| parts.first().cloned())
        .or_else(|| command.split_whitespace().next().map(String::from))
}

pub async fn run_command(
    working_dir: &std::path::Path,
    command: &str,
) -> Result<CommandResult, RouterError> {
    let program = program_name(command)
        .ok_or_else(|| RouterError::ValidationError("empty command".to_string()))?;
    if !ALLOWED_COMMANDS.contains(&program.as_str()) {
        return Err(RouterError::CommandNotAllowed { command: program });
    }

    let timeout_secs = if command.contains("cargo test") || command.contains("test") {
        TEST_TIMEOUT_SECS
    } else {
        DEFAULT_TIMEOUT_SECS
    };

    let working_dir = working_dir.to_path_buf();
    let command_owned = command.to_string();
    let use_shell = needs_shell(&command_owned);

    let join = tokio::task::spawn_blocking(move || -> std::io::Result<Output> {
        if use_shell {
            std::process::Command::new("sh")
                .args(["-c", &command_owned])
                .current_dir(&working_dir)
                .output()
        } else {
            let parts = shlex::split(&command_owned).unwrap_or_default();
            let (prog, args) = parts.split_first().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
            })?;
            std::process::Command::new(prog)
                .args(args)
                .current_dir(&working_dir)
                .output()
        }
    });

    let output = timeout(Duration::from_secs(timeout_secs), join)
        .await
        .map_err(|_| RouterError::SubprocessTimeout {
            seconds: timeout_secs,
        })?
        .map_err(|e| RouterError::Io(std::io::Error::other(e)))?
        .map_err(RouterError::Io)?;

    Ok(CommandResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
