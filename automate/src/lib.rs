//! Block-based desktop automation
//!
//! A workflow is an ordered list of typed action records (move, click, type,
//! wait, loop, find-and-click an image, ...). It can be saved as a project
//! file, compiled into a standalone pyautogui script, or run in-process
//! against an [`AutomationDriver`].

pub mod action;
pub mod codec;
pub mod compiler;
pub mod config;
pub mod console;
pub mod errors;
pub mod executor;
pub mod pick;
pub mod platforms;
pub mod program;
pub mod schema;
pub mod session;
pub mod types;
pub mod vision;
pub mod workflow;

pub use action::{ActionRecord, RecordId};
pub use compiler::{compile, CompiledScript, ScriptCompiler};
pub use config::AutomateConfig;
pub use console::Console;
pub use errors::{AutomationError, ConfigError, ExecutionError, WorkflowError};
pub use executor::{Executor, RunEvent, RunOutcome, RunReport};
pub use platforms::{create_driver, AutomationDriver, DriverKind};
pub use program::Program;
pub use schema::{ActionKind, ActionSchema, Category, FieldDecl, FieldKind};
pub use session::Session;
pub use types::{MouseButton, Point};
pub use workflow::{Direction, Workflow};
