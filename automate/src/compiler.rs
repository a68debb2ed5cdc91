//! Script compiler
//!
//! Turns a workflow into a standalone pyautogui script. Nesting is tracked
//! with a single depth counter because loops are the only block construct.
//! The compiler never fails: field values are embedded as typed, so a
//! non-numeric value in a numeric field yields a script that fails when it
//! is loaded, not here.

use crate::action::ActionRecord;
use crate::schema::ActionKind;
use crate::workflow::Workflow;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the function that wraps every compiled step.
pub const ENTRY_FUNCTION: &str = "run_automation";

/// Depth of the first statement inside the entry function.
pub const BASE_DEPTH: usize = 1;

const INDENT: &str = "    ";

pub const START_BANNER: &str = "--- Starting Automation ---";
pub const LOOP_ITERATION_MESSAGE: &str = "Loop iteration...";
pub const LOOP_END_MARKER: &str = "# End Loop";

/// One emitted line and the nesting depth it is rendered at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub depth: usize,
    pub text: String,
}

impl ScriptLine {
    pub fn render(&self) -> String {
        if self.text.is_empty() {
            String::new()
        } else {
            format!("{}{}", INDENT.repeat(self.depth), self.text)
        }
    }
}

/// Compiler output: the script lines plus what happened to the loop nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    pub lines: Vec<ScriptLine>,
    /// Highest value the depth counter reached while compiling steps.
    pub max_depth: usize,
    /// Depth after the last step, before open loops are closed.
    pub final_depth: usize,
    /// `Loop End`s that had no open loop and were clamped at the base depth.
    pub clamped_loop_ends: usize,
    /// `Loop Start`s still open at the end of the document, closed implicitly.
    pub unclosed_loops: usize,
}

impl CompiledScript {
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(ScriptLine::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_balanced(&self) -> bool {
        self.clamped_loop_ends == 0 && self.unclosed_loops == 0
    }
}

impl fmt::Display for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    /// Delay the standalone script waits before running, so the operator can
    /// switch windows.
    startup_delay: Duration,
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(2),
        }
    }
}

impl ScriptCompiler {
    pub fn new(startup_delay: Duration) -> Self {
        Self { startup_delay }
    }

    pub fn compile(&self, workflow: &Workflow) -> CompiledScript {
        let mut out = Emitter::default();

        out.line(0, "import pyautogui");
        out.line(0, "import time");
        out.line(0, "import os");
        out.line(0, "");
        out.line(0, "pyautogui.FAILSAFE = True");
        out.line(0, "");
        out.line(0, format!("def {ENTRY_FUNCTION}():"));
        out.line(BASE_DEPTH, format!("print({})", quoted(START_BANNER)));

        let mut depth = BASE_DEPTH;
        let mut max_depth = BASE_DEPTH;
        let mut clamped_loop_ends = 0;

        for (index, record) in workflow.iter().enumerate() {
            match record.kind() {
                ActionKind::LoopStart => {
                    out.line(
                        depth,
                        format!("for _ in range({}):", bare(record, "iterations")),
                    );
                    depth += 1;
                    out.line(depth, format!("print({})", quoted(LOOP_ITERATION_MESSAGE)));
                }
                ActionKind::LoopEnd => {
                    if depth > BASE_DEPTH {
                        depth -= 1;
                    } else {
                        clamped_loop_ends += 1;
                        warn!(step = index + 1, "Loop End without an open loop, clamping depth");
                    }
                    out.line(depth, LOOP_END_MARKER);
                }
                _ => emit_step(&mut out, depth, record),
            }
            max_depth = max_depth.max(depth);
        }

        let final_depth = depth;
        let unclosed_loops = depth - BASE_DEPTH;
        if unclosed_loops > 0 {
            warn!(unclosed_loops, "Closing loops left open at end of workflow");
        }
        while depth > BASE_DEPTH {
            depth -= 1;
            out.line(depth, LOOP_END_MARKER);
        }

        out.line(0, "");
        out.line(0, "if __name__ == '__main__':");
        out.line(1, "# Give user time to switch windows");
        out.line(1, format!("time.sleep({})", seconds_literal(self.startup_delay)));
        out.line(1, format!("{ENTRY_FUNCTION}()"));

        debug!(
            steps = workflow.len(),
            lines = out.lines.len(),
            max_depth,
            "Compiled workflow to script"
        );

        CompiledScript {
            lines: out.lines,
            max_depth,
            final_depth,
            clamped_loop_ends,
            unclosed_loops,
        }
    }
}

/// Compile with the default settings and render to text.
pub fn compile(workflow: &Workflow) -> String {
    ScriptCompiler::default().compile(workflow).render()
}

#[derive(Default)]
struct Emitter {
    lines: Vec<ScriptLine>,
}

impl Emitter {
    fn line(&mut self, depth: usize, text: impl Into<String>) {
        self.lines.push(ScriptLine {
            depth,
            text: text.into(),
        });
    }
}

fn emit_step(out: &mut Emitter, depth: usize, record: &ActionRecord) {
    let v = |field: &str| bare(record, field);
    let q = |field: &str| quoted(record.value(field));

    match record.kind() {
        ActionKind::MoveTo => out.line(
            depth,
            format!(
                "pyautogui.moveTo({}, {}, duration={})",
                v("x"),
                v("y"),
                v("duration")
            ),
        ),
        ActionKind::Click => out.line(
            depth,
            format!(
                "pyautogui.click(x={}, y={}, clicks={}, button={})",
                v("x"),
                v("y"),
                v("clicks"),
                q("button")
            ),
        ),
        ActionKind::DragTo => out.line(
            depth,
            format!(
                "pyautogui.dragTo({}, {}, duration={}, button='left')",
                v("x"),
                v("y"),
                v("duration")
            ),
        ),
        ActionKind::Scroll => out.line(depth, format!("pyautogui.scroll({})", v("amount"))),
        ActionKind::WriteText => out.line(
            depth,
            format!(
                "pyautogui.write({}, interval={})",
                q("text"),
                v("interval")
            ),
        ),
        ActionKind::PressKey => out.line(depth, format!("pyautogui.press({})", q("key"))),
        ActionKind::Hotkey => {
            let keys = split_keys(record.value("keys"))
                .iter()
                .map(|k| quoted(k))
                .collect::<Vec<_>>()
                .join(", ");
            out.line(depth, format!("pyautogui.hotkey({keys})"));
        }
        ActionKind::Wait => out.line(depth, format!("time.sleep({})", v("seconds"))),
        ActionKind::FindAndClickImage => {
            let path = record.value("image_path");
            out.line(
                depth,
                format!(
                    "loc = pyautogui.locateCenterOnScreen({}, confidence={})",
                    quoted(path),
                    v("confidence")
                ),
            );
            out.line(depth, "if loc:");
            out.line(depth + 1, "pyautogui.click(loc)");
            out.line(depth, "else:");
            out.line(
                depth + 1,
                format!("print({})", quoted(&image_not_found_message(path))),
            );
        }
        ActionKind::Screenshot => {
            out.line(depth, format!("pyautogui.screenshot({})", q("filename")))
        }
        ActionKind::Comment => {
            let note = record.value("note").replace(['\r', '\n'], " ");
            out.line(depth, format!("# {note}"));
        }
        ActionKind::LoopStart | ActionKind::LoopEnd => {
            unreachable!("loop markers are handled by the compiler loop")
        }
    }
}

/// Split a comma-separated hotkey field into individual key names.
pub fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Console message logged when an image is not on screen.
pub fn image_not_found_message(path: &str) -> String {
    format!("Image not found: {}", file_name(path))
}

/// Final path component, accepting both `/` and `\` separators.
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn bare(record: &ActionRecord, field: &str) -> String {
    record.value(field).trim().to_string()
}

/// A single-quoted Python string literal.
fn quoted(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => literal.push_str("\\\\"),
            '\'' => literal.push_str("\\'"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            _ => literal.push(ch),
        }
    }
    literal.push('\'');
    literal
}

fn seconds_literal(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", duration.as_secs())
    } else {
        format!("{secs}")
    }
}
