//! A driver that records what it was asked to do instead of doing it.

use super::AutomationDriver;
use crate::errors::AutomationError;
use crate::types::{MouseButton, Point};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::info;

/// One recorded driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    MoveTo {
        to: Point,
        duration: Duration,
    },
    Click {
        at: Point,
        clicks: u32,
        button: MouseButton,
    },
    DragTo {
        to: Point,
        duration: Duration,
        button: MouseButton,
    },
    Scroll {
        amount: i32,
    },
    Write {
        text: String,
        interval: Duration,
    },
    Press {
        key: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Sleep {
        duration: Duration,
    },
    Locate {
        image_path: String,
        confidence: f64,
    },
    ClickAt {
        at: Point,
    },
    Screenshot {
        filename: String,
    },
}

#[derive(Debug, Default)]
pub struct DryRunDriver {
    calls: Mutex<Vec<DriverCall>>,
    pointer: Mutex<Point>,
    image_hits: HashMap<String, Point>,
    fail_safe_after: Option<usize>,
    real_sleep: bool,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `image_path` as found, centred on `at`.
    pub fn with_image(mut self, image_path: impl Into<String>, at: Point) -> Self {
        self.image_hits.insert(image_path.into(), at);
        self
    }

    /// Start the simulated pointer at `at`.
    pub fn with_pointer(self, at: Point) -> Self {
        *lock(&self.pointer) = at;
        self
    }

    /// Raise the fail-safe on the call after the first `calls` have succeeded.
    pub fn fail_safe_after(mut self, calls: usize) -> Self {
        self.fail_safe_after = Some(calls);
        self
    }

    /// Actually wait on `sleep` instead of returning immediately.
    pub fn with_real_sleep(mut self, real_sleep: bool) -> Self {
        self.real_sleep = real_sleep;
        self
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: DriverCall) -> Result<(), AutomationError> {
        let mut calls = lock(&self.calls);
        if self.fail_safe_after.is_some_and(|limit| calls.len() >= limit) {
            return Err(AutomationError::FailSafe);
        }
        info!(?call, "dry-run");
        calls.push(call);
        Ok(())
    }

    fn move_pointer(&self, to: Point) {
        *lock(&self.pointer) = to;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl AutomationDriver for DryRunDriver {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn move_to(&self, to: Point, duration: Duration) -> Result<(), AutomationError> {
        self.record(DriverCall::MoveTo { to, duration })?;
        self.move_pointer(to);
        Ok(())
    }

    async fn click(
        &self,
        at: Point,
        clicks: u32,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.record(DriverCall::Click { at, clicks, button })?;
        self.move_pointer(at);
        Ok(())
    }

    async fn drag_to(
        &self,
        to: Point,
        duration: Duration,
        button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.record(DriverCall::DragTo {
            to,
            duration,
            button,
        })?;
        self.move_pointer(to);
        Ok(())
    }

    async fn scroll(&self, amount: i32) -> Result<(), AutomationError> {
        self.record(DriverCall::Scroll { amount })
    }

    async fn write(&self, text: &str, interval: Duration) -> Result<(), AutomationError> {
        self.record(DriverCall::Write {
            text: text.to_string(),
            interval,
        })
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        self.record(DriverCall::Press {
            key: key.to_string(),
        })
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError> {
        self.record(DriverCall::Hotkey {
            keys: keys.to_vec(),
        })
    }

    async fn sleep(&self, duration: Duration) -> Result<(), AutomationError> {
        self.record(DriverCall::Sleep { duration })?;
        if self.real_sleep {
            tokio::time::sleep(duration).await;
        }
        Ok(())
    }

    async fn locate_center_on_screen(
        &self,
        image_path: &str,
        confidence: f64,
    ) -> Result<Option<Point>, AutomationError> {
        self.record(DriverCall::Locate {
            image_path: image_path.to_string(),
            confidence,
        })?;
        Ok(self.image_hits.get(image_path).copied())
    }

    async fn click_at(&self, at: Point) -> Result<(), AutomationError> {
        self.record(DriverCall::ClickAt { at })?;
        self.move_pointer(at);
        Ok(())
    }

    async fn screenshot(&self, filename: &str) -> Result<(), AutomationError> {
        self.record(DriverCall::Screenshot {
            filename: filename.to_string(),
        })
    }

    fn position(&self) -> Result<Point, AutomationError> {
        Ok(*lock(&self.pointer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let driver = DryRunDriver::new();
        driver.press("enter").await.unwrap();
        driver.scroll(-3).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Press {
                    key: "enter".to_string()
                },
                DriverCall::Scroll { amount: -3 },
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_safe_after_limit() {
        let driver = DryRunDriver::new().fail_safe_after(1);
        driver.press("a").await.unwrap();
        let err = driver.press("b").await.unwrap_err();
        assert!(matches!(err, AutomationError::FailSafe));
        assert_eq!(driver.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pointer_follows_moves() {
        let driver = DryRunDriver::new().with_pointer(Point::new(5, 5));
        assert_eq!(driver.position().unwrap(), Point::new(5, 5));
        driver
            .move_to(Point::new(40, 60), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(driver.position().unwrap(), Point::new(40, 60));
    }

    #[tokio::test]
    async fn test_image_hits() {
        let driver = DryRunDriver::new().with_image("ok.png", Point::new(7, 8));
        assert_eq!(
            driver.locate_center_on_screen("ok.png", 0.9).await.unwrap(),
            Some(Point::new(7, 8))
        );
        assert_eq!(
            driver.locate_center_on_screen("missing.png", 0.9).await.unwrap(),
            None
        );
    }
}
