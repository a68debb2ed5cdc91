//! Runs a workflow in-process against an [`AutomationDriver`].
//!
//! The document is lowered to a [`Program`] first, so literal errors surface
//! before any input is simulated. Loops are walked with an explicit frame
//! stack rather than recursion.

use crate::compiler::{image_not_found_message, LOOP_ITERATION_MESSAGE, START_BANNER};
use crate::config::AutomateConfig;
use crate::console::{Level, DEFAULT_CAPACITY};
use crate::errors::ExecutionError;
use crate::platforms::AutomationDriver;
use crate::program::{Op, Program, Step};
use crate::types::MouseButton;
use crate::workflow::Workflow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub const COMPLETED_MESSAGE: &str = "Execution Complete.";
pub const FAIL_SAFE_MESSAGE: &str = "FAILSAFE TRIGGERED (Mouse Corner)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// The operator aborted by pushing the pointer into a screen corner.
    FailSafe,
    Failed(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => f.write_str("completed"),
            RunOutcome::FailSafe => f.write_str("fail-safe"),
            RunOutcome::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Operations handed to the driver, counting every loop pass.
    pub ops_executed: usize,
    pub elapsed: Duration,
    /// Lines the run logged, in order. Only the most recent
    /// [`DEFAULT_CAPACITY`] are kept.
    pub log: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Messages from a background run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Log { level: Level, message: String },
    Finished(RunReport),
}

#[derive(Clone)]
pub struct Executor {
    driver: Arc<dyn AutomationDriver>,
    startup_delay: Duration,
}

impl Executor {
    pub fn new(driver: Arc<dyn AutomationDriver>) -> Self {
        Self::with_config(driver, &AutomateConfig::default())
    }

    pub fn with_config(driver: Arc<dyn AutomationDriver>, config: &AutomateConfig) -> Self {
        Self {
            driver,
            startup_delay: config.startup_delay,
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn startup_delay(&self) -> Duration {
        self.startup_delay
    }

    /// Run `workflow` to completion. Never returns an error: failures are
    /// reported through [`RunReport::outcome`].
    pub async fn run(&self, workflow: &Workflow) -> RunReport {
        self.run_reporting(workflow, None).await
    }

    /// Run a snapshot of the document on a background task, streaming log
    /// lines and a final [`RunEvent::Finished`] to `events`.
    pub fn spawn(&self, workflow: Workflow, events: UnboundedSender<RunEvent>) -> JoinHandle<()> {
        let executor = self.clone();
        tokio::spawn(async move {
            let report = executor.run_reporting(&workflow, Some(&events)).await;
            if events.send(RunEvent::Finished(report)).is_err() {
                debug!("Run finished after the receiver was dropped");
            }
        })
    }

    #[instrument(skip_all, fields(driver = self.driver.name(), steps = workflow.len()))]
    async fn run_reporting(
        &self,
        workflow: &Workflow,
        events: Option<&UnboundedSender<RunEvent>>,
    ) -> RunReport {
        let started = Instant::now();
        if !self.startup_delay.is_zero() {
            tokio::time::sleep(self.startup_delay).await;
        }

        let mut run = Run {
            driver: self.driver.as_ref(),
            events,
            log: VecDeque::new(),
            ops_executed: 0,
        };

        let result = match Program::lower(workflow) {
            Ok(program) => {
                run.emit(Level::Info, START_BANNER);
                run.execute(&program).await
            }
            Err(err) => Err(err),
        };

        let outcome = match result {
            Ok(()) => {
                run.emit(Level::Info, COMPLETED_MESSAGE);
                RunOutcome::Completed
            }
            Err(err) if err.is_fail_safe() => {
                run.emit(Level::Error, FAIL_SAFE_MESSAGE);
                RunOutcome::FailSafe
            }
            Err(err) => {
                run.emit(Level::Error, format!("Execution Error: {err}"));
                RunOutcome::Failed(err.to_string())
            }
        };

        let report = RunReport {
            outcome,
            ops_executed: run.ops_executed,
            elapsed: started.elapsed(),
            log: run.log.into(),
        };
        info!(outcome = %report.outcome, ops = report.ops_executed, elapsed = ?report.elapsed, "Run finished");
        report
    }
}

/// State of one run in progress.
struct Run<'a> {
    driver: &'a dyn AutomationDriver,
    events: Option<&'a UnboundedSender<RunEvent>>,
    log: VecDeque<String>,
    ops_executed: usize,
}

/// A body being walked: where we are and how many passes remain after this one.
struct Frame<'p> {
    body: &'p [Step],
    next: usize,
    remaining: u64,
}

impl Run<'_> {
    fn emit(&mut self, level: Level, message: impl Into<String>) {
        let message = message.into();
        debug!(?level, "{}", message);
        if let Some(events) = self.events {
            // a dropped receiver must not stop the run
            let _ = events.send(RunEvent::Log {
                level,
                message: message.clone(),
            });
        }
        if self.log.len() == DEFAULT_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(message);
    }

    async fn execute(&mut self, program: &Program) -> Result<(), ExecutionError> {
        let mut frames = vec![Frame {
            body: program.steps(),
            next: 0,
            remaining: 0,
        }];

        while let Some(frame) = frames.last_mut() {
            if frame.next == frame.body.len() {
                if frame.remaining > 0 {
                    frame.remaining -= 1;
                    frame.next = 0;
                    self.emit(Level::Info, LOOP_ITERATION_MESSAGE);
                    // a body of comments never awaits the driver
                    tokio::task::yield_now().await;
                } else {
                    frames.pop();
                }
                continue;
            }

            let body = frame.body;
            let step = &body[frame.next];
            frame.next += 1;

            match &step.op {
                Op::Loop { iterations, body } => {
                    if *iterations > 0 {
                        self.emit(Level::Info, LOOP_ITERATION_MESSAGE);
                        frames.push(Frame {
                            body,
                            next: 0,
                            remaining: iterations - 1,
                        });
                    }
                }
                op => {
                    self.perform(step.index, op).await?;
                    self.ops_executed += 1;
                }
            }
        }
        Ok(())
    }

    async fn perform(&mut self, index: usize, op: &Op) -> Result<(), ExecutionError> {
        debug!(step = index + 1, ?op, "Executing");
        let driver = self.driver;
        match op {
            Op::MoveTo { to, duration } => driver.move_to(*to, *duration).await?,
            Op::Click { at, clicks, button } => driver.click(*at, *clicks, *button).await?,
            Op::DragTo { to, duration } => {
                driver.drag_to(*to, *duration, MouseButton::Left).await?
            }
            Op::Scroll { amount } => driver.scroll(*amount).await?,
            Op::Write { text, interval } => driver.write(text, *interval).await?,
            Op::Press { key } => driver.press(key).await?,
            Op::Hotkey { keys } => driver.hotkey(keys).await?,
            Op::Wait { duration } => driver.sleep(*duration).await?,
            Op::FindAndClick {
                image_path,
                confidence,
            } => match driver.locate_center_on_screen(image_path, *confidence).await? {
                Some(center) => driver.click_at(center).await?,
                None => {
                    warn!(image_path, "Image not found on screen");
                    self.emit(Level::Warn, image_not_found_message(image_path));
                }
            },
            Op::Screenshot { filename } => driver.screenshot(filename).await?,
            Op::Comment { note } => debug!(note, "Comment"),
            Op::Loop { .. } => unreachable!("loops are expanded by execute"),
        }
        Ok(())
    }
}
