//! Shell Safety — Command Injection Prevention
//!
//! Sanitization and validation utilities for the project-sandbox command
//! path (§4.2, §4.7): `run_command`/`bash` execute via `Command::new(prog)
//! .args(args)` wherever possible (see `action::shell`), and `git`
//! subprocess arguments (`git.rs`) are validated here as defense-in-depth
//! even though they are never interpolated into a shell string.
//!
//! # Threat Model
//!
//! - **Direct execution:** `Command::new(cmd).args(args)` does NOT invoke a
//!   shell, so metacharacters are harmless to the OS. We still validate,
//!   since a metacharacter in an argument is almost always a sign the
//!   caller meant to chain commands rather than pass one argument.
//! - **Allowlist fallback:** when a command genuinely needs shell features
//!   (pipes, redirects), `action::shell` runs it under `sh -c` only after
//!   the program name passes `action::shell::ALLOWED_COMMANDS`; this module
//!   does not re-implement that allowlist, it validates the arguments
//!   around it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use loom_core::shell_safety::validate_arg;
//!
//! validate_arg(user_supplied_arg)?;
//! Command::new("git").arg(user_supplied_arg).output()?;
//! ```

/// Shell metacharacters that can cause command injection when interpreted
/// by a shell (bash/sh/zsh).
const SHELL_METACHARACTERS: &[char] = &[
    ';', '|', '&', '`', '$', '(', ')', '{', '}', '<', '>', '\n', '\r', '!', '#', '~', '*', '?',
    '[', ']', '\\', '"', '\'',
];

/// Subset of metacharacters that indicate chaining/injection intent
/// (vs. globbing characters that might appear in legitimate args).
const INJECTION_CHARACTERS: &[char] = &[';', '|', '&', '`', '$', '(', ')', '\n', '\r'];

/// Validation error for argument checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgValidationError {
    /// The problematic character found.
    pub character: char,
    /// Position in the input string.
    pub position: usize,
    /// The original input (truncated to 100 chars).
    pub input_preview: String,
}

impl std::fmt::Display for ArgValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dangerous character '{}' at position {} in: {}",
            self.character.escape_default(),
            self.position,
            self.input_preview
        )
    }
}

impl std::error::Error for ArgValidationError {}

/// Validate that an argument contains no injection-class metacharacters.
///
/// Use this for defense-in-depth on arguments passed to `Command::new().arg()`,
/// which doesn't invoke a shell but where we still want to catch suspicious input.
///
/// Returns Ok(()) if clean, Err with details if a dangerous character is found.
pub fn validate_arg(arg: &str) -> Result<(), ArgValidationError> {
    for (pos, ch) in arg.chars().enumerate() {
        if INJECTION_CHARACTERS.contains(&ch) {
            return Err(ArgValidationError {
                character: ch,
                position: pos,
                input_preview: if arg.len() > 100 {
                    format!("{}...", &arg[..100])
                } else {
                    arg.to_string()
                },
            });
        }
    }
    Ok(())
}

/// Validate that an argument contains no shell metacharacters at all.
///
/// Stricter than [`validate_arg`] — also rejects globbing characters, quotes,
/// and other characters that have special meaning in shells.
pub fn validate_strict(arg: &str) -> Result<(), ArgValidationError> {
    for (pos, ch) in arg.chars().enumerate() {
        if SHELL_METACHARACTERS.contains(&ch) {
            return Err(ArgValidationError {
                character: ch,
                position: pos,
                input_preview: if arg.len() > 100 {
                    format!("{}...", &arg[..100])
                } else {
                    arg.to_string()
                },
            });
        }
    }
    Ok(())
}

/// Sanitize a string for use as a filename or identifier component.
///
/// Replaces any character that is not alphanumeric, `-`, `_`, or `.` with `_`.
/// Also prevents path traversal by replacing `/` and `\`.
pub fn sanitize_identifier(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_arg_clean() {
        assert!(validate_arg("hello").is_ok());
        assert!(validate_arg("--flag=value").is_ok());
        assert!(validate_arg("/path/to/file").is_ok());
        assert!(validate_arg("file.rs").is_ok());
        assert!(validate_arg("").is_ok());
        // Globbing chars are OK for validate_arg (only injection chars blocked)
        assert!(validate_arg("*.rs").is_ok());
        assert!(validate_arg("src/**/*.rs").is_ok());
    }

    #[test]
    fn test_validate_arg_injection() {
        let err = validate_arg("; rm -rf /").unwrap_err();
        assert_eq!(err.character, ';');
        assert_eq!(err.position, 0);

        let err = validate_arg("foo | bar").unwrap_err();
        assert_eq!(err.character, '|');

        let err = validate_arg("foo & bar").unwrap_err();
        assert_eq!(err.character, '&');

        let err = validate_arg("$(evil)").unwrap_err();
        assert_eq!(err.character, '$');

        let err = validate_arg("`evil`").unwrap_err();
        assert_eq!(err.character, '`');

        let err = validate_arg("foo\nbar").unwrap_err();
        assert_eq!(err.character, '\n');
    }

    #[test]
    fn test_validate_strict_rejects_globs() {
        assert!(validate_strict("*.rs").is_err());
        assert!(validate_strict("file[0]").is_err());
        assert!(validate_strict("path?").is_err());
        assert!(validate_strict("$HOME").is_err());
        assert!(validate_strict("\"quoted\"").is_err());
    }

    #[test]
    fn test_validate_strict_clean() {
        assert!(validate_strict("hello").is_ok());
        assert!(validate_strict("--flag").is_ok());
        assert!(validate_strict("123").is_ok());
        assert!(validate_strict("/path/to/file.rs").is_ok());
        assert!(validate_strict("foo-bar_baz.txt").is_ok());
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("hello-world"), "hello-world");
        assert_eq!(sanitize_identifier("test_123.rs"), "test_123.rs");
        assert_eq!(
            sanitize_identifier("../../etc/passwd"),
            ".._.._etc_passwd"
        );
        assert_eq!(sanitize_identifier("file name"), "file_name");
        assert_eq!(sanitize_identifier("a;b|c&d"), "a_b_c_d");
    }

    #[test]
    fn test_sanitize_identifier_empty() {
        assert_eq!(sanitize_identifier(""), "");
    }

    #[test]
    fn test_arg_validation_error_display() {
        let err = validate_arg("; injection").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("dangerous character"));
        assert!(msg.contains("; injection"));
    }

    #[test]
    fn test_validate_arg_long_input_truncated() {
        let long = "a".repeat(200) + ";";
        let err = validate_arg(&long).unwrap_err();
        assert!(err.input_preview.ends_with("..."));
        assert!(err.input_preview.len() < 110);
    }
}
