//! Environment handling for configuration files.
//!
//! Variables come from the process environment, optionally seeded from a
//! `.env` file. Config text is then interpolated with:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use snafu::prelude::*;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

use crate::error::{ConfigError, EnvFileSnafu};

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # escaped dollar
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)   # 1: braced name
            (?:(:?-)([^}]*))?          # 2: operator, 3: default
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # 4: bare name
        ",
    )
    .expect("Invalid regex pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Every problem found, so all missing variables surface at once.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Load a `.env` file into the process environment.
///
/// An explicit path must exist. Without one, `.env` in the working directory
/// is loaded if present. Variables already set in the environment win.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    match path {
        Some(path) => {
            dotenvy::from_path(path).context(EnvFileSnafu { path })?;
            debug!(path = %path.display(), "Loaded env file");
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(found) => {
                debug!(path = %found.display(), "Loaded env file");
                Ok(Some(found))
            }
            Err(e) if e.not_found() => Ok(None),
            Err(source) => Err(ConfigError::EnvFile {
                path: PathBuf::from(".env"),
                source,
            }),
        },
    }
}

/// Interpolate environment variables in the given text.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| resolve(caps, &mut errors))
        .into_owned();

    InterpolationResult { text, errors }
}

fn resolve(caps: &Captures, errors: &mut Vec<String>) -> String {
    let whole = &caps[0];
    if whole == "$$" {
        return "$".to_string();
    }

    let name = caps
        .get(1)
        .or_else(|| caps.get(4))
        .map_or("", |m| m.as_str());
    let operator = caps.get(2).map(|m| m.as_str());
    let default = caps.get(3).map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            whole.to_string()
        }
        Ok(value) if value.is_empty() && operator == Some(":-") => {
            default.unwrap_or_default().to_string()
        }
        Ok(value) => value,
        Err(_) => match default {
            Some(default) => default.to_string(),
            None => {
                errors.push(format!("environment variable '{name}' is not set"));
                whole.to_string()
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        // SAFETY: each test uses its own variable names and restores them afterwards
        for (key, value) in vars {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        let result = f();

        // SAFETY: restoring original environment state
        for (key, original) in originals {
            match original {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_bare_and_braced_substitution() {
        with_env_vars(&[("CHUNKLOAD_TEST_INDIR", Some("/data/in"))], || {
            let result = interpolate("a: $CHUNKLOAD_TEST_INDIR\nb: ${CHUNKLOAD_TEST_INDIR}/x");
            assert!(result.is_ok());
            assert_eq!(result.text, "a: /data/in\nb: /data/in/x");
        });
    }

    #[test]
    fn test_all_missing_variables_reported() {
        with_env_vars(
            &[
                ("CHUNKLOAD_TEST_MISSING_A", None),
                ("CHUNKLOAD_TEST_MISSING_B", None),
            ],
            || {
                let result =
                    interpolate("a: ${CHUNKLOAD_TEST_MISSING_A}\nb: $CHUNKLOAD_TEST_MISSING_B");
                assert_eq!(result.errors.len(), 2);
                assert!(result.errors[0].contains("CHUNKLOAD_TEST_MISSING_A"));
                assert!(result.errors[1].contains("CHUNKLOAD_TEST_MISSING_B"));
            },
        );
    }

    #[test]
    fn test_defaults() {
        with_env_vars(
            &[
                ("CHUNKLOAD_TEST_UNSET", None),
                ("CHUNKLOAD_TEST_EMPTY", Some("")),
            ],
            || {
                let result = interpolate(
                    "${CHUNKLOAD_TEST_UNSET:-a} ${CHUNKLOAD_TEST_EMPTY:-b} [${CHUNKLOAD_TEST_EMPTY-c}]",
                );
                assert!(result.is_ok());
                assert_eq!(result.text, "a b []");
            },
        );
    }

    #[test]
    fn test_newline_rejected() {
        with_env_vars(&[("CHUNKLOAD_TEST_NEWLINE", Some("a\nb"))], || {
            let result = interpolate("$CHUNKLOAD_TEST_NEWLINE");
            assert!(!result.is_ok());
            assert!(result.errors[0].contains("newlines"));
        });
    }

    #[test]
    fn test_escape_sequence() {
        let result = interpolate("password: $$ecret");
        assert!(result.is_ok());
        assert_eq!(result.text, "password: $ecret");
    }

    #[test]
    fn test_explicit_env_file_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_env_file(Some(&dir.path().join("missing.env"))).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }
}
