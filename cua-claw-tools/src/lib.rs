//! Automation backends for the CUA-Claw runtime.
//!
//! [`DesktopComputer`] drives a local Hyprland session through external
//! Wayland tools; [`DryRunComputer`] records actions without performing them.

pub mod desktop;
pub mod dry_run;
pub mod os_capabilities;

pub use desktop::DesktopComputer;
pub use dry_run::DryRunComputer;
pub use os_capabilities::{OsError, OsResult};
