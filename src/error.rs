//! Error taxonomy shared by every build and launch step.
//!
//! Steps return `anyhow::Result` and wrap one of these variants when the
//! failure falls into a known class, so callers can classify it with
//! `err.downcast_ref::<StepError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StepError {
    /// A required external executable could not be resolved or spawned.
    #[error("required tool '{tool}' not found ({hint})")]
    MissingTool { tool: String, hint: String },

    /// Source discovery found nothing to work on.
    #[error("no input files found under '{}' (expected {pattern})", .root.display())]
    NoInput { root: PathBuf, pattern: String },

    /// An external tool ran but reported failure.
    #[error("'{tool}' failed with {status}:\n{diagnostics}")]
    NonZeroExit {
        tool: String,
        status: String,
        diagnostics: String,
    },

    /// A prior step should have produced this file but it is not there.
    #[error("missing artifact '{}'", .path.display())]
    MissingArtifact { path: PathBuf },

    /// The operation is not supported on this host.
    #[error("{operation} is only supported on {supported}")]
    PlatformMismatch {
        operation: String,
        supported: String,
    },
}

impl StepError {
    pub fn missing_artifact(path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact { path: path.into() }
    }
}

/// Returns the classified step error carried by `err`, if any.
pub fn classify(err: &anyhow::Error) -> Option<&StepError> {
    err.chain().find_map(|cause| cause.downcast_ref::<StepError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn classify_finds_error_under_context() {
        let err = Err::<(), _>(StepError::missing_artifact("dist/CalendarApp.jar"))
            .context("starting GUI")
            .unwrap_err();
        assert!(matches!(
            classify(&err),
            Some(StepError::MissingArtifact { .. })
        ));
    }

    #[test]
    fn classify_plain_error_is_none() {
        let err = anyhow::anyhow!("something else");
        assert!(classify(&err).is_none());
    }
}
