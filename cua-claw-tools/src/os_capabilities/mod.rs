//! Structured OS capability layer for the desktop backend.
//!
//! Every external tool is invoked with an explicit argument vector; no
//! shell is involved.

pub mod input;
pub mod keys;
pub mod screen;

use cua_claw_runtime::CapabilityError;
use tokio::process::Command;

/// OS capability error types
#[derive(Debug, thiserror::Error)]
pub enum OsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("Backend not found: {0}")]
    BackendMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type OsResult<T> = Result<T, OsError>;

impl From<OsError> for CapabilityError {
    fn from(err: OsError) -> Self {
        match err {
            OsError::InvalidArgument(msg) => CapabilityError::InvalidArgument(msg),
            OsError::OperationFailed(msg) => CapabilityError::OperationFailed(msg),
            OsError::BackendMissing(msg) => CapabilityError::Unsupported(msg),
            OsError::Io(e) => CapabilityError::Io(e),
        }
    }
}

pub(crate) fn validate_text(text: &str) -> OsResult<()> {
    if text.contains('\0') {
        return Err(OsError::InvalidArgument(
            "text contains null byte".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_coordinate(value: i32, label: &str) -> OsResult<()> {
    if value < 0 {
        return Err(OsError::InvalidArgument(format!(
            "{label} must be >= 0, got {value}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_url(url: &str) -> OsResult<()> {
    if url.trim().is_empty() {
        return Err(OsError::InvalidArgument("url cannot be empty".to_string()));
    }
    if url.contains(char::is_whitespace) {
        return Err(OsError::InvalidArgument(
            "url cannot contain whitespace".to_string(),
        ));
    }
    let lower = url.to_lowercase();
    if !["http://", "https://", "file://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return Err(OsError::InvalidArgument(
            "url must start with http://, https://, or file://".to_string(),
        ));
    }
    Ok(())
}

pub(crate) async fn command_exists(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub(crate) async fn run_checked(command: &str, args: &[&str]) -> OsResult<()> {
    tracing::trace!(command, ?args, "Running backend command");
    let output = Command::new(command).args(args).output().await?;
    if output.status.success() {
        return Ok(());
    }
    Err(OsError::OperationFailed(format!(
        "{command}: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

pub(crate) async fn run_output(command: &str, args: &[&str]) -> OsResult<Vec<u8>> {
    let output = Command::new(command).args(args).output().await?;
    if output.status.success() {
        return Ok(output.stdout);
    }
    Err(OsError::OperationFailed(format!(
        "{command}: {}",
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_schemes() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("file:///tmp/page.html").is_ok());
        assert!(validate_url("").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("https://example.com/a b").is_err());
    }

    #[test]
    fn test_negative_coordinates_rejected() {
        assert!(validate_coordinate(0, "x").is_ok());
        assert!(matches!(
            validate_coordinate(-1, "y"),
            Err(OsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_os_error_maps_to_capability_error() {
        let err: CapabilityError = OsError::BackendMissing("grim".to_string()).into();
        assert!(matches!(err, CapabilityError::Unsupported(_)));

        let err: CapabilityError = OsError::InvalidArgument("bad".to_string()).into();
        assert!(matches!(err, CapabilityError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_run_checked_reports_missing_binary() {
        let result = run_checked("cua-claw-definitely-missing-binary", &[]).await;
        assert!(matches!(result, Err(OsError::Io(_))));
    }
}
