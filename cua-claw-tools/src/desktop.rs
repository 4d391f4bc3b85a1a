//! Local Wayland desktop backend.

use crate::os_capabilities::{input, screen, validate_url};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cua_claw_runtime::{CapabilityError, Computer, Environment, MouseButton, Point};
use tracing::{debug, warn};

pub const DEFAULT_DIMENSIONS: (u32, u32) = (1920, 1080);

/// Drives the focused Hyprland session with wtype, ydotool and grim.
///
/// Navigation opens URLs through `xdg-open` and maps back/forward to the
/// usual browser shortcuts on the focused window.
#[derive(Debug, Clone)]
pub struct DesktopComputer {
    width: u32,
    height: u32,
}

impl DesktopComputer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size the backend from the focused monitor, falling back to 1920x1080.
    pub async fn detect() -> Self {
        match screen::focused_monitor_size().await {
            Ok((width, height)) => {
                debug!(width, height, "Detected focused monitor");
                Self::new(width, height)
            }
            Err(e) => {
                warn!(error = %e, "Monitor detection failed, using default dimensions");
                Self::new(DEFAULT_DIMENSIONS.0, DEFAULT_DIMENSIONS.1)
            }
        }
    }

    fn check_bounds(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        let inside = |value: i32, limit: u32| u32::try_from(value).is_ok_and(|v| v < limit);
        if inside(x, self.width) && inside(y, self.height) {
            return Ok(());
        }
        Err(CapabilityError::InvalidArgument(format!(
            "({x}, {y}) is outside the {}x{} display",
            self.width, self.height
        )))
    }
}

impl Default for DesktopComputer {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS.0, DEFAULT_DIMENSIONS.1)
    }
}

#[async_trait]
impl Computer for DesktopComputer {
    fn environment(&self) -> Environment {
        Environment::Linux
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<(), CapabilityError> {
        self.check_bounds(x, y)?;
        Ok(input::click_at(x, y, button).await?)
    }

    async fn double_click(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.check_bounds(x, y)?;
        Ok(input::double_click_at(x, y).await?)
    }

    async fn scroll(
        &self,
        x: i32,
        y: i32,
        scroll_x: i32,
        scroll_y: i32,
    ) -> Result<(), CapabilityError> {
        self.check_bounds(x, y)?;
        Ok(input::scroll_at(x, y, scroll_x, scroll_y).await?)
    }

    async fn type_text(&self, text: &str) -> Result<(), CapabilityError> {
        Ok(input::type_text(text).await?)
    }

    async fn keypress(&self, keys: &[String]) -> Result<(), CapabilityError> {
        Ok(input::key_chord(keys).await?)
    }

    async fn move_pointer(&self, x: i32, y: i32) -> Result<(), CapabilityError> {
        self.check_bounds(x, y)?;
        Ok(input::mouse_move_absolute(x, y).await?)
    }

    async fn drag(&self, path: &[Point]) -> Result<(), CapabilityError> {
        for point in path {
            self.check_bounds(point.x, point.y)?;
        }
        Ok(input::drag_path(path).await?)
    }

    async fn goto(&self, url: &str) -> Result<(), CapabilityError> {
        validate_url(url)?;
        tokio::process::Command::new("xdg-open").arg(url).spawn()?;
        Ok(())
    }

    async fn back(&self) -> Result<(), CapabilityError> {
        self.keypress(&["ALT".to_string(), "LEFT".to_string()]).await
    }

    async fn forward(&self) -> Result<(), CapabilityError> {
        self.keypress(&["ALT".to_string(), "RIGHT".to_string()]).await
    }

    async fn capture_frame(&self) -> Result<String, CapabilityError> {
        let png = screen::capture_png().await?;
        Ok(STANDARD.encode(png))
    }

    async fn current_location(&self) -> Result<String, CapabilityError> {
        let window = screen::active_window().await?;
        Ok(screen::window_descriptor(&window))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_linux_environment() {
        let computer = DesktopComputer::new(1280, 800);
        assert_eq!(computer.environment(), Environment::Linux);
        assert_eq!(computer.dimensions(), (1280, 800));
    }

    #[tokio::test]
    async fn test_out_of_bounds_click_rejected() {
        let computer = DesktopComputer::new(800, 600);
        let result = computer.click(800, 10, MouseButton::Left).await;
        assert!(matches!(result, Err(CapabilityError::InvalidArgument(_))));

        let result = computer
            .drag(&[Point { x: 10, y: 10 }, Point { x: 10, y: -1 }])
            .await;
        assert!(matches!(result, Err(CapabilityError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_goto_rejects_unsupported_scheme() {
        let computer = DesktopComputer::default();
        let result = computer.goto("javascript:alert(1)").await;
        assert!(matches!(result, Err(CapabilityError::InvalidArgument(_))));
    }
}
