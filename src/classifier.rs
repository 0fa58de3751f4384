//! # Outcome Classification Module
//!
//! Questo modulo decide l'esito terminale di un job a partire dal risultato grezzo
//! del motore.
//!
//! ## Ordine delle regole (la prima che corrisponde vince):
//! 1. Processo non avviato → `EngineUnavailable`
//! 2. Stderr contiene marker di password/cifratura → `RecoverableContentError`
//!    anche con exit 0 (Ghostscript produce PDF bianchi sui file protetti)
//! 3. Stderr contiene il fallimento del downsample filter → `RecoverableContentError`,
//!    controllato PRIMA del timeout perché questo errore si presenta come hang
//! 4. Timeout → `TimedOut`
//! 5. Exit non riuscito → `UnknownFailure`
//! 6. Altrimenti servono file di input e output leggibili → `Success`
//!
//! ## Tassonomia:
//! - `EngineUnavailable`: difetto di deploy, non ritentabile
//! - `RecoverableContentError`: dipende dall'input, ritentare con altro file/preset
//! - `TimedOut`: file troppo grande/complesso per il budget
//! - `UnknownFailure`: catch-all, loggato con tutto il dettaglio diagnostico

use crate::engine::EngineResult;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, warn};

const PASSWORD_MARKERS: &[&str] = &["password", "encrypted"];
const DOWNSAMPLE_FAILURE_MARKER: &str = "failed to initialise downsample filter";

/// Why an input could not be compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentIssue {
    PasswordProtected,
    UnsupportedImageStream,
}

impl fmt::Display for ContentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PasswordProtected => f.write_str("password-protected"),
            Self::UnsupportedImageStream => f.write_str("unsupported image stream for aggressive recipe"),
        }
    }
}

/// Terminal result of one compression job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        output_path: PathBuf,
        original_size: u64,
        compressed_size: u64,
    },
    RecoverableContentError {
        reason: ContentIssue,
    },
    EngineUnavailable,
    TimedOut,
    UnknownFailure {
        detail: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::RecoverableContentError { .. } => "content_error",
            Self::EngineUnavailable => "engine_unavailable",
            Self::TimedOut => "timed_out",
            Self::UnknownFailure { .. } => "unknown_failure",
        }
    }

    /// Actionable message for the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Success { .. } => "PDF compressed successfully",
            Self::RecoverableContentError {
                reason: ContentIssue::PasswordProtected,
            } => "PDF is password-protected or encrypted. Please remove the password before compression.",
            Self::RecoverableContentError {
                reason: ContentIssue::UnsupportedImageStream,
            } => {
                "This PDF contains images that cannot be downsampled. Try the \"recommended\" quality preset, though compression may be limited."
            }
            Self::EngineUnavailable => {
                "Ghostscript is not installed. Please install Ghostscript on the server."
            }
            Self::TimedOut => {
                "PDF compression timed out. This file is too complex to process in the time limit. Try a smaller file or split the PDF."
            }
            Self::UnknownFailure { .. } => "PDF compression failed.",
        }
    }

    /// Diagnostic detail, shown only in development mode
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::UnknownFailure { detail } => Some(detail.clone()),
            Self::RecoverableContentError { reason } => Some(reason.to_string()),
            _ => None,
        }
    }
}

/// Classify a raw engine result. The rule order matters, see the module docs.
pub async fn classify(result: &EngineResult, input_path: &Path, output_path: &Path) -> Outcome {
    if result.process_start_failed {
        error!("Compression engine could not be started: {}", result.stderr.trim());
        return Outcome::EngineUnavailable;
    }

    let stderr = result.stderr.to_lowercase();

    if PASSWORD_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        warn!("Password-protected PDF detected: {}", input_path.display());
        return Outcome::RecoverableContentError {
            reason: ContentIssue::PasswordProtected,
        };
    }

    if stderr.contains(DOWNSAMPLE_FAILURE_MARKER) {
        warn!("Downsample filter failure on {}", input_path.display());
        return Outcome::RecoverableContentError {
            reason: ContentIssue::UnsupportedImageStream,
        };
    }

    if result.timed_out {
        return Outcome::TimedOut;
    }

    if !result.exit_succeeded {
        let detail = match (result.stderr.trim(), result.exit_code) {
            ("", Some(code)) => format!("engine exited with code {}", code),
            ("", None) => "engine terminated by signal".to_string(),
            (stderr, _) => stderr.to_string(),
        };
        error!("Compression failed for {}: {}", input_path.display(), detail);
        return Outcome::UnknownFailure { detail };
    }

    if !stderr.trim().is_empty() {
        warn!("Ghostscript warnings: {}", result.stderr.trim());
    }

    let original_size = match fs::metadata(input_path).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            return Outcome::UnknownFailure {
                detail: format!("input {} unreadable after compression: {}", input_path.display(), e),
            }
        }
    };

    let compressed_size = match fs::metadata(output_path).await {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        Ok(_) => {
            return Outcome::UnknownFailure {
                detail: format!("output {} is not a file", output_path.display()),
            }
        }
        Err(e) => {
            error!("Engine reported success but produced no output: {}", output_path.display());
            return Outcome::UnknownFailure {
                detail: format!("output {} missing despite success: {}", output_path.display(), e),
            };
        }
    };

    Outcome::Success {
        output_path: output_path.to_path_buf(),
        original_size,
        compressed_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ok_result(stderr: &str) -> EngineResult {
        EngineResult {
            exit_succeeded: true,
            exit_code: Some(0),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    fn missing() -> (&'static Path, &'static Path) {
        (Path::new("/nonexistent/in.pdf"), Path::new("/nonexistent/out.pdf"))
    }

    #[tokio::test]
    async fn test_start_failure_wins_over_everything() {
        let (input, output) = missing();
        let result = EngineResult {
            process_start_failed: true,
            timed_out: true,
            stderr: "password".to_string(),
            ..Default::default()
        };
        assert_eq!(classify(&result, input, output).await, Outcome::EngineUnavailable);
    }

    #[tokio::test]
    async fn test_password_detected_even_on_exit_zero() {
        let (input, output) = missing();
        let result = ok_result("GPL Ghostscript: warning, font substituted\nThis file requires a PASSWORD for access.");
        assert_eq!(
            classify(&result, input, output).await,
            Outcome::RecoverableContentError {
                reason: ContentIssue::PasswordProtected
            }
        );

        let failed = EngineResult {
            exit_succeeded: false,
            exit_code: Some(1),
            stderr: "Error: file is Encrypted".to_string(),
            ..Default::default()
        };
        assert_eq!(
            classify(&failed, input, output).await,
            Outcome::RecoverableContentError {
                reason: ContentIssue::PasswordProtected
            }
        );
    }

    #[tokio::test]
    async fn test_downsample_failure_beats_timeout() {
        let (input, output) = missing();
        let result = EngineResult {
            timed_out: true,
            stderr: "**** Error: Failed to initialise downsample filter".to_string(),
            ..Default::default()
        };
        assert_eq!(
            classify(&result, input, output).await,
            Outcome::RecoverableContentError {
                reason: ContentIssue::UnsupportedImageStream
            }
        );
    }

    #[tokio::test]
    async fn test_plain_timeout() {
        let (input, output) = missing();
        let result = EngineResult {
            timed_out: true,
            stderr: "some unrelated warning".to_string(),
            ..Default::default()
        };
        assert_eq!(classify(&result, input, output).await, Outcome::TimedOut);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_unknown_failure() {
        let (input, output) = missing();
        let result = EngineResult {
            exit_code: Some(1),
            stderr: "Unrecoverable error, exit code 1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            classify(&result, input, output).await,
            Outcome::UnknownFailure {
                detail: "Unrecoverable error, exit code 1".to_string()
            }
        );

        let silent = EngineResult {
            exit_code: Some(255),
            ..Default::default()
        };
        assert_eq!(
            classify(&silent, input, output).await,
            Outcome::UnknownFailure {
                detail: "engine exited with code 255".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_success_requires_output_artifact() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, vec![0u8; 1000]).unwrap();

        let outcome = classify(&ok_result(""), &input, &output).await;
        assert!(matches!(outcome, Outcome::UnknownFailure { .. }));
        assert!(!outcome.is_success());

        std::fs::write(&output, vec![0u8; 400]).unwrap();
        let outcome = classify(&ok_result("harmless warning"), &input, &output).await;
        assert_eq!(
            outcome,
            Outcome::Success {
                output_path: output.clone(),
                original_size: 1000,
                compressed_size: 400,
            }
        );
    }

    #[test]
    fn test_each_failure_has_distinct_message() {
        let outcomes = [
            Outcome::RecoverableContentError {
                reason: ContentIssue::PasswordProtected,
            },
            Outcome::RecoverableContentError {
                reason: ContentIssue::UnsupportedImageStream,
            },
            Outcome::EngineUnavailable,
            Outcome::TimedOut,
            Outcome::UnknownFailure {
                detail: "boom".to_string(),
            },
        ];
        let messages: std::collections::HashSet<_> = outcomes.iter().map(Outcome::user_message).collect();
        assert_eq!(messages.len(), outcomes.len());
        assert_eq!(
            ContentIssue::UnsupportedImageStream.to_string(),
            "unsupported image stream for aggressive recipe"
        );
    }
}
