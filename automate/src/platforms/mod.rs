use crate::errors::AutomationError;
use crate::types::{MouseButton, Point};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod desktop;
pub mod dry_run;
pub mod keys;

pub use desktop::DesktopDriver;
pub use dry_run::{DriverCall, DryRunDriver};

/// The capability surface the executor drives: pointer, keyboard, screen.
///
/// Every action may fail with [`AutomationError::FailSafe`] when the operator
/// aborts by moving the pointer into a screen corner.
#[async_trait::async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Move the pointer to `to` over `duration`
    async fn move_to(&self, to: Point, duration: Duration) -> Result<(), AutomationError>;

    /// Click `clicks` times at `at`
    async fn click(&self, at: Point, clicks: u32, button: MouseButton)
        -> Result<(), AutomationError>;

    /// Press `button` at the current position and release it at `to`
    async fn drag_to(
        &self,
        to: Point,
        duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError>;

    /// Scroll vertically; positive is up
    async fn scroll(&self, amount: i32) -> Result<(), AutomationError>;

    /// Type `text`, pausing `interval` between characters
    async fn write(&self, text: &str, interval: Duration) -> Result<(), AutomationError>;

    /// Press and release a named key
    async fn press(&self, key: &str) -> Result<(), AutomationError>;

    /// Press keys in order, then release them in reverse order
    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError>;

    async fn sleep(&self, duration: Duration) -> Result<(), AutomationError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Find `image_path` on screen. Returns the centre of the best match whose
    /// score reaches `confidence`, or `None`.
    async fn locate_center_on_screen(
        &self,
        image_path: &str,
        confidence: f64,
    ) -> Result<Option<Point>, AutomationError>;

    async fn click_at(&self, at: Point) -> Result<(), AutomationError> {
        self.click(at, 1, MouseButton::Left).await
    }

    /// Capture the primary screen into `filename`
    async fn screenshot(&self, filename: &str) -> Result<(), AutomationError>;

    /// Current pointer position
    fn position(&self) -> Result<Point, AutomationError>;
}

/// Which driver a front end should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverKind {
    /// Real pointer, keyboard and screen
    #[default]
    Desktop,
    /// Record calls without touching the desktop
    DryRun,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Desktop => f.write_str("desktop"),
            DriverKind::DryRun => f.write_str("dry-run"),
        }
    }
}

impl FromStr for DriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "desktop" => Ok(DriverKind::Desktop),
            "dry-run" | "dryrun" | "dry_run" => Ok(DriverKind::DryRun),
            other => Err(format!("unknown driver '{other}'")),
        }
    }
}

pub fn create_driver(
    kind: DriverKind,
    fail_safe: bool,
) -> Result<Arc<dyn AutomationDriver>, AutomationError> {
    match kind {
        DriverKind::Desktop => Ok(Arc::new(DesktopDriver::new(fail_safe)?)),
        DriverKind::DryRun => Ok(Arc::new(DryRunDriver::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_kind_names() {
        assert_eq!("dry-run".parse::<DriverKind>().unwrap(), DriverKind::DryRun);
        assert_eq!("Desktop".parse::<DriverKind>().unwrap(), DriverKind::Desktop);
        assert!("robot".parse::<DriverKind>().is_err());
        assert_eq!(DriverKind::DryRun.to_string(), "dry-run");
        assert_eq!(DriverKind::default(), DriverKind::Desktop);
    }

    #[test]
    fn test_create_dry_run_driver() {
        let driver = create_driver(DriverKind::DryRun, true).unwrap();
        assert_eq!(driver.name(), "dry-run");
    }
}
