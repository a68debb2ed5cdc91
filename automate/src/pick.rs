//! Coordinate capture: wait for the operator to hover over a target, then read
//! the pointer position.

use crate::action::RecordId;
use crate::config::AutomateConfig;
use crate::errors::AutomationError;
use crate::platforms::AutomationDriver;
use crate::types::Point;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum PickEvent {
    Captured { id: RecordId, point: Point },
    Failed { id: RecordId, message: String },
}

#[derive(Clone)]
pub struct CoordinatePicker {
    driver: Arc<dyn AutomationDriver>,
    settle: Duration,
    delay: Duration,
}

impl CoordinatePicker {
    pub fn new(driver: Arc<dyn AutomationDriver>, config: &AutomateConfig) -> Self {
        Self {
            driver,
            settle: config.pick_settle,
            delay: config.pick_delay,
        }
    }

    /// Total time between starting a pick and reading the pointer.
    pub fn countdown(&self) -> Duration {
        self.settle + self.delay
    }

    pub async fn capture(&self) -> Result<Point, AutomationError> {
        tokio::time::sleep(self.settle).await;
        info!("Hover over the target, capturing in {:?}", self.delay);
        tokio::time::sleep(self.delay).await;
        let point = self.driver.position()?;
        debug!(%point, "Captured pointer position");
        Ok(point)
    }

    /// Capture on a background task and report the result for record `id`.
    pub fn spawn(&self, id: RecordId, events: UnboundedSender<PickEvent>) -> JoinHandle<()> {
        let picker = self.clone();
        tokio::spawn(async move {
            let event = match picker.capture().await {
                Ok(point) => PickEvent::Captured { id, point },
                Err(err) => PickEvent::Failed {
                    id,
                    message: err.to_string(),
                },
            };
            if events.send(event).is_err() {
                debug!("Pick finished after the receiver was dropped");
            }
        })
    }
}
