// ============================================================================
// posepack-cli/src/error.rs
// ============================================================================
//
// CLI ERROR HANDLING: Error types and utilities for the CLI
//
// The CLI reuses posepack-core's CoreError. This module adds a result alias
// and a context extension trait for attaching CLI-level detail to errors.

// ---- Internal crate imports ----
use posepack_core::{CoreError, CoreResult};

// ---- Standard library imports ----
use std::fmt;

/// Type alias for CLI results using CoreError.
pub type CliResult<T> = CoreResult<T>;

/// Extension trait for adding context to errors in the CLI.
pub trait CliErrorContext<T> {
    /// Add context using a closure (for lazy evaluation).
    fn cli_with_context<C, F>(self, f: F) -> CliResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C;
}

impl<T, E> CliErrorContext<T> for Result<T, E>
where
    E: Into<CoreError>,
{
    fn cli_with_context<C, F>(self, f: F) -> CliResult<T>
    where
        C: fmt::Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let core_error: CoreError = e.into();
            CoreError::OperationFailed(format!("{}: {core_error}", f()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_core_errors() {
        let io: Result<(), std::io::Error> = Err(std::io::Error::other("disk gone"));
        let err = io
            .cli_with_context(|| format!("Failed to read {}", "config"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to read config: IO error: disk gone");
    }

    #[test]
    fn test_context_leaves_success_untouched() {
        let ok: Result<u8, CoreError> = Ok(3);
        assert_eq!(ok.cli_with_context(|| "unused").unwrap(), 3);
    }
}
