//! Screen capture and window metadata from Hyprland.

use super::{command_exists, run_checked, run_output, OsError, OsResult};
use serde_json::Value;

/// Capture the whole screen and return the PNG bytes.
///
/// The frame is written to a temporary file that is removed on return.
pub async fn capture_png() -> OsResult<Vec<u8>> {
    let target = tempfile::Builder::new()
        .prefix("cua-claw-frame-")
        .suffix(".png")
        .tempfile()?;
    let path = target.path().to_string_lossy().to_string();

    if command_exists("grim").await {
        run_checked("grim", &[&path]).await?;
    } else if command_exists("hyprshot").await {
        let dir = target
            .path()
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "/tmp".to_string());
        let name = target
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        run_checked(
            "hyprshot",
            &["-m", "output", "--silent", "-o", &dir, "-f", &name],
        )
        .await?;
    } else {
        return Err(OsError::BackendMissing(
            "no screenshot backend found (install 'grim' or 'hyprshot')".to_string(),
        ));
    }

    let bytes = tokio::fs::read(target.path()).await?;
    if bytes.is_empty() {
        return Err(OsError::OperationFailed(
            "screenshot backend wrote an empty file".to_string(),
        ));
    }
    Ok(bytes)
}

async fn hyprctl_json(query: &str) -> OsResult<Value> {
    let stdout = run_output("hyprctl", &[query, "-j"]).await?;
    serde_json::from_slice(&stdout).map_err(|e| OsError::OperationFailed(e.to_string()))
}

/// Return current active window metadata from Hyprland.
pub async fn active_window() -> OsResult<Value> {
    hyprctl_json("activewindow").await
}

/// Size of the focused monitor, in logical pixels.
pub async fn focused_monitor_size() -> OsResult<(u32, u32)> {
    let monitors = hyprctl_json("monitors").await?;
    focused_monitor(&monitors)
        .ok_or_else(|| OsError::OperationFailed("no focused monitor reported".to_string()))
}

/// Pick the focused entry from `hyprctl monitors -j` output.
pub fn focused_monitor(monitors: &Value) -> Option<(u32, u32)> {
    let list = monitors.as_array()?;
    let monitor = list
        .iter()
        .find(|m| m.get("focused").and_then(Value::as_bool) == Some(true))
        .or_else(|| list.first())?;

    let width = monitor.get("width")?.as_u64()?;
    let height = monitor.get("height")?.as_u64()?;
    let scale = monitor.get("scale").and_then(Value::as_f64).unwrap_or(1.0);
    let scale = if scale > 0.0 { scale } else { 1.0 };

    let logical = |px: u64| (px as f64 / scale).round() as u32;
    Some((logical(width), logical(height)))
}

/// Describe a window as `class: title` for the location field.
pub fn window_descriptor(window: &Value) -> String {
    let field = |name: &str| {
        window
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    match (field("class"), field("title")) {
        (Some(class), Some(title)) => format!("{class}: {title}"),
        (Some(class), None) => class.to_string(),
        (None, Some(title)) => title.to_string(),
        (None, None) => "desktop".to_string(),
    }
}
