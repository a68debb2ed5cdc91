//! The operator control context.
//!
//! A `Session` is the only writer of its workflow. Runs and coordinate picks
//! happen on background tasks that report back over channels; their results
//! reach the document and the console only when [`Session::pump_events`] is
//! called.

use crate::action::{ActionRecord, RecordId};
use crate::codec;
use crate::compiler::{CompiledScript, ScriptCompiler};
use crate::config::{format_duration, AutomateConfig};
use crate::console::Console;
use crate::errors::WorkflowError;
use crate::executor::{Executor, RunEvent, RunReport};
use crate::pick::{CoordinatePicker, PickEvent};
use crate::platforms::AutomationDriver;
use crate::workflow::{Direction, Workflow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

pub const ALREADY_RUNNING_MESSAGE: &str = "Execution already in progress";

pub struct Session {
    workflow: Workflow,
    console: Console,
    config: AutomateConfig,
    driver: Arc<dyn AutomationDriver>,
    run_tx: UnboundedSender<RunEvent>,
    run_rx: UnboundedReceiver<RunEvent>,
    pick_tx: UnboundedSender<PickEvent>,
    pick_rx: UnboundedReceiver<PickEvent>,
    run_task: Option<JoinHandle<()>>,
    pick_tasks: Vec<JoinHandle<()>>,
    last_report: Option<RunReport>,
}

impl Session {
    pub fn new(driver: Arc<dyn AutomationDriver>, config: AutomateConfig) -> Self {
        let (run_tx, run_rx) = mpsc::unbounded_channel();
        let (pick_tx, pick_rx) = mpsc::unbounded_channel();
        Self {
            workflow: Workflow::new(),
            console: Console::default(),
            config,
            driver,
            run_tx,
            run_rx,
            pick_tx,
            pick_rx,
            run_task: None,
            pick_tasks: Vec::new(),
            last_report: None,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn config(&self) -> &AutomateConfig {
        &self.config
    }

    /// Report of the most recent run whose result has been pumped.
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn add_block(
        &mut self,
        kind: &str,
        values: Option<&HashMap<String, String>>,
    ) -> Result<RecordId, WorkflowError> {
        let record = ActionRecord::create(kind, values)?;
        let name = record.kind().name();
        let id = self.workflow.append(record);
        self.console.log(format!("Added {name}"));
        Ok(id)
    }

    pub fn remove_block(&mut self, id: RecordId) -> Result<ActionRecord, WorkflowError> {
        let record = self.workflow.remove(id)?;
        self.console.log(format!("Removed {}", record.kind().name()));
        Ok(record)
    }

    pub fn move_block(&mut self, id: RecordId, direction: Direction) -> Result<(), WorkflowError> {
        self.workflow.swap_adjacent(id, direction)
    }

    /// Change one field of a block.
    pub fn set_field(&mut self, id: RecordId, field: &str, value: &str) -> Result<(), WorkflowError> {
        self.workflow
            .get_mut(id)
            .ok_or(WorkflowError::RecordNotFound(id))?
            .set(field, value)
    }

    pub fn clear_all(&mut self) {
        self.workflow.clear();
        self.console.log("Workspace cleared");
    }

    pub fn save_project(&mut self, path: &Path) -> Result<(), WorkflowError> {
        match codec::save(&self.workflow, path) {
            Ok(()) => {
                self.console.log(format!("Project saved: {}", path.display()));
                Ok(())
            }
            Err(err) => {
                self.console.error(format!("Save failed: {err}"));
                Err(err)
            }
        }
    }

    /// Replace the document with the one stored at `path`. On failure the
    /// current document is kept.
    pub fn load_project(&mut self, path: &Path) -> Result<(), WorkflowError> {
        match codec::load(path) {
            Ok(workflow) => {
                self.workflow = workflow;
                self.console.log(format!(
                    "Project loaded: {} ({} blocks)",
                    path.display(),
                    self.workflow.len()
                ));
                Ok(())
            }
            Err(err) => {
                self.console.error(format!("Load failed: {err}"));
                Err(err)
            }
        }
    }

    pub fn compile(&self) -> CompiledScript {
        ScriptCompiler::new(self.config.script_delay).compile(&self.workflow)
    }

    pub fn generate_script(&mut self, path: &Path) -> Result<(), WorkflowError> {
        match codec::export_script(&self.workflow, path, &self.config) {
            Ok(()) => {
                self.console.log(format!("Script generated: {}", path.display()));
                Ok(())
            }
            Err(err) => {
                self.console.error(format!("Script export failed: {err}"));
                Err(err)
            }
        }
    }

    /// Start a background run of the current document. Returns `false`, and
    /// does nothing, when the document is empty or a run is still in progress.
    pub fn run_now(&mut self) -> bool {
        if self.workflow.is_empty() {
            debug!("Nothing to run");
            return false;
        }
        if self.is_running() {
            self.console.warn(ALREADY_RUNNING_MESSAGE);
            return false;
        }
        self.console.log(format!(
            "Prepare for execution... ({} delay)",
            format_duration(self.config.startup_delay)
        ));
        let executor = Executor::with_config(Arc::clone(&self.driver), &self.config);
        self.run_task = Some(executor.spawn(self.workflow.clone(), self.run_tx.clone()));
        true
    }

    pub fn is_running(&self) -> bool {
        self.run_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Start capturing the pointer position for block `id`. The block must
    /// declare `x` and `y`.
    pub fn pick_coordinates(&mut self, id: RecordId) -> Result<(), WorkflowError> {
        let record = self
            .workflow
            .get(id)
            .ok_or(WorkflowError::RecordNotFound(id))?;
        if !record.kind().schema().has_coordinates() {
            return Err(WorkflowError::UnknownField {
                kind: record.kind().to_string(),
                field: "x".to_string(),
            });
        }

        let picker = CoordinatePicker::new(Arc::clone(&self.driver), &self.config);
        self.console.log(format!(
            "Hover over the target, capturing in {}",
            format_duration(picker.countdown())
        ));
        self.pick_tasks.retain(|task| !task.is_finished());
        self.pick_tasks.push(picker.spawn(id, self.pick_tx.clone()));
        Ok(())
    }

    /// Apply everything the background tasks have reported so far. Returns
    /// the number of events handled.
    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(event) = self.run_rx.try_recv() {
            handled += 1;
            match event {
                RunEvent::Log { level, message } => self.console.push(level, message),
                RunEvent::Finished(report) => self.last_report = Some(report),
            }
        }

        while let Ok(event) = self.pick_rx.try_recv() {
            handled += 1;
            match event {
                PickEvent::Captured { id, point } => {
                    match self.workflow.set_coordinates(id, point) {
                        Ok(()) => self.console.log(format!("Coordinates captured: {point}")),
                        Err(_) => self
                            .console
                            .warn(format!("Block removed before coordinates {point} arrived")),
                    }
                }
                PickEvent::Failed { message, .. } => {
                    self.console.error(format!("Coordinate capture failed: {message}"))
                }
            }
        }

        handled
    }

    /// Wait for every background task, then pump their events.
    pub async fn wait_idle(&mut self) -> Option<&RunReport> {
        if let Some(task) = self.run_task.take() {
            if let Err(err) = task.await {
                self.console.error(format!("Run task failed: {err}"));
            }
        }
        for task in std::mem::take(&mut self.pick_tasks) {
            if let Err(err) = task.await {
                self.console.error(format!("Pick task failed: {err}"));
            }
        }
        self.pump_events();
        self.last_report.as_ref()
    }
}
