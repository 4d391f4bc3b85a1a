//! Pointer and keyboard input through wtype, ydotool and wlrctl.

use super::keys::wtype_args;
use super::{
    command_exists, run_checked, validate_coordinate, validate_text, OsError, OsResult,
};
use cua_claw_runtime::{MouseButton, Point};
use tokio::time::{sleep, Duration};

/// Lets the compositor settle a cursor move before a button event.
const POINTER_SETTLE: Duration = Duration::from_millis(30);

/// Pixels per wheel notch when translating scroll deltas.
const PIXELS_PER_NOTCH: i32 = 100;

/// Type text into the currently focused window.
pub async fn type_text(text: &str) -> OsResult<()> {
    validate_text(text)?;
    if text.is_empty() {
        return Ok(());
    }
    if command_exists("wtype").await {
        return run_checked("wtype", &["--", text]).await;
    }
    if command_exists("ydotool").await {
        return run_checked("ydotool", &["type", "--", text]).await;
    }
    Err(OsError::BackendMissing(
        "no text input backend found (install 'wtype' or 'ydotool')".to_string(),
    ))
}

/// Press a key chord, e.g. `["CTRL", "L"]`.
pub async fn key_chord(keys: &[String]) -> OsResult<()> {
    let args = wtype_args(keys)?;
    if !command_exists("wtype").await {
        return Err(OsError::BackendMissing(
            "wtype not found for key presses".to_string(),
        ));
    }
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    run_checked("wtype", &arg_refs).await
}

/// ydotool button code: low nibble selects the button.
fn ydotool_button(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0x00,
        MouseButton::Right => 0x01,
        MouseButton::Wheel => 0x02,
        MouseButton::Back => 0x03,
        MouseButton::Forward => 0x04,
    }
}

fn wlrctl_button(button: MouseButton) -> Option<&'static str> {
    match button {
        MouseButton::Left => Some("left"),
        MouseButton::Right => Some("right"),
        MouseButton::Wheel => Some("middle"),
        MouseButton::Back | MouseButton::Forward => None,
    }
}

/// Click a button at the current cursor position.
pub async fn mouse_click(button: MouseButton) -> OsResult<()> {
    if command_exists("ydotool").await {
        let code = format!("0x{:02X}", 0xC0 | ydotool_button(button));
        return run_checked("ydotool", &["click", &code]).await;
    }
    if command_exists("wlrctl").await {
        let name = wlrctl_button(button).ok_or_else(|| {
            OsError::InvalidArgument(format!("wlrctl cannot click {button:?}"))
        })?;
        return run_checked("wlrctl", &["pointer", "click", name]).await;
    }
    Err(OsError::BackendMissing(
        "no click backend found (install 'ydotool' or 'wlrctl')".to_string(),
    ))
}

/// Move cursor to absolute coordinate.
pub async fn mouse_move_absolute(x: i32, y: i32) -> OsResult<()> {
    validate_coordinate(x, "x")?;
    validate_coordinate(y, "y")?;

    let xs = x.to_string();
    let ys = y.to_string();

    if command_exists("ydotool").await {
        return run_checked("ydotool", &["mousemove", "--absolute", "-x", &xs, "-y", &ys]).await;
    }
    if command_exists("wlrctl").await {
        return run_checked("wlrctl", &["pointer", "move", &xs, &ys]).await;
    }
    Err(OsError::BackendMissing(
        "no mouse move backend found (install 'ydotool' or 'wlrctl')".to_string(),
    ))
}

/// Click at absolute coordinate.
pub async fn click_at(x: i32, y: i32, button: MouseButton) -> OsResult<()> {
    mouse_move_absolute(x, y).await?;
    sleep(POINTER_SETTLE).await;
    mouse_click(button).await
}

pub async fn double_click_at(x: i32, y: i32) -> OsResult<()> {
    mouse_move_absolute(x, y).await?;
    sleep(POINTER_SETTLE).await;
    if command_exists("ydotool").await {
        return run_checked("ydotool", &["click", "--repeat", "2", "--next-delay", "60", "0xC0"])
            .await;
    }
    mouse_click(MouseButton::Left).await?;
    sleep(Duration::from_millis(60)).await;
    mouse_click(MouseButton::Left).await
}

/// Convert a pixel delta to wheel notches, keeping any non-zero delta.
pub fn wheel_notches(pixels: i32) -> i32 {
    if pixels == 0 {
        return 0;
    }
    let notches = pixels / PIXELS_PER_NOTCH;
    if notches == 0 {
        pixels.signum()
    } else {
        notches
    }
}

/// Scroll at a position; positive deltas scroll right and down.
pub async fn scroll_at(x: i32, y: i32, scroll_x: i32, scroll_y: i32) -> OsResult<()> {
    mouse_move_absolute(x, y).await?;
    sleep(POINTER_SETTLE).await;

    let dx = wheel_notches(scroll_x);
    let dy = wheel_notches(scroll_y);
    if dx == 0 && dy == 0 {
        return Ok(());
    }

    if command_exists("ydotool").await {
        // ydotool wheel axes grow upward.
        let xs = dx.to_string();
        let ys = (-dy).to_string();
        return run_checked("ydotool", &["mousemove", "--wheel", "-x", &xs, "-y", &ys]).await;
    }
    if command_exists("wlrctl").await {
        let ys = dy.to_string();
        let xs = dx.to_string();
        return run_checked("wlrctl", &["pointer", "scroll", &ys, &xs]).await;
    }
    Err(OsError::BackendMissing(
        "no scroll backend found (install 'ydotool' or 'wlrctl')".to_string(),
    ))
}

/// Press the left button at the first point, trace the path, release at the last.
pub async fn drag_path(path: &[Point]) -> OsResult<()> {
    let (first, rest) = path
        .split_first()
        .ok_or_else(|| OsError::InvalidArgument("drag path is empty".to_string()))?;
    if rest.is_empty() {
        return Err(OsError::InvalidArgument(
            "drag path needs at least two points".to_string(),
        ));
    }
    if !command_exists("ydotool").await {
        return Err(OsError::BackendMissing(
            "ydotool not found for drag".to_string(),
        ));
    }

    mouse_move_absolute(first.x, first.y).await?;
    sleep(POINTER_SETTLE).await;
    run_checked("ydotool", &["click", "0x40"]).await?;

    let mut result = Ok(());
    for point in rest {
        result = mouse_move_absolute(point.x, point.y).await;
        if result.is_err() {
            break;
        }
        sleep(POINTER_SETTLE).await;
    }
    // Release even when a move failed so the button is not left held.
    run_checked("ydotool", &["click", "0x80"]).await?;
    result
}
