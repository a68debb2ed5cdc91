//! Typed execution plan built from a workflow document.
//!
//! Lowering parses every field once, up front, so a bad literal is reported
//! before the driver is touched. Loops become nested bodies.

use crate::action::ActionRecord;
use crate::compiler::split_keys;
use crate::errors::ExecutionError;
use crate::schema::ActionKind;
use crate::types::{MouseButton, Point};
use crate::workflow::Workflow;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// One executable operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
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
    Wait {
        duration: Duration,
    },
    Loop {
        iterations: u64,
        body: Vec<Step>,
    },
    FindAndClick {
        image_path: String,
        confidence: f64,
    },
    Screenshot {
        filename: String,
    },
    Comment {
        note: String,
    },
}

/// An operation tagged with the index of the record that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: usize,
    pub op: Op,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    steps: Vec<Step>,
    clamped_loop_ends: usize,
    unclosed_loops: usize,
}

struct OpenLoop {
    index: usize,
    iterations: u64,
    body: Vec<Step>,
}

impl Program {
    /// Lower `workflow` into a program.
    ///
    /// Excess `Loop End`s are ignored and loops still open at the end of the
    /// document are closed there, both with a warning.
    pub fn lower(workflow: &Workflow) -> Result<Program, ExecutionError> {
        let mut root = Vec::new();
        let mut open: Vec<OpenLoop> = Vec::new();
        let mut clamped_loop_ends = 0;

        for (index, record) in workflow.iter().enumerate() {
            let fields = Fields { index, record };
            match record.kind() {
                ActionKind::LoopStart => open.push(OpenLoop {
                    index,
                    iterations: fields.integer("iterations")?.max(0) as u64,
                    body: Vec::new(),
                }),
                ActionKind::LoopEnd => match open.pop() {
                    Some(closed) => attach(&mut open, &mut root, closed.into_step()),
                    None => {
                        clamped_loop_ends += 1;
                        warn!(step = index + 1, "Ignoring Loop End without an open loop");
                    }
                },
                _ => {
                    let step = Step {
                        index,
                        op: fields.op()?,
                    };
                    attach(&mut open, &mut root, step);
                }
            }
        }

        let unclosed_loops = open.len();
        if unclosed_loops > 0 {
            warn!(unclosed_loops, "Closing loops left open at end of workflow");
        }
        while let Some(closed) = open.pop() {
            attach(&mut open, &mut root, closed.into_step());
        }

        let program = Program {
            steps: root,
            clamped_loop_ends,
            unclosed_loops,
        };
        debug!(ops = program.op_count(), "Lowered workflow");
        Ok(program)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of operations, counting loop bodies once.
    pub fn op_count(&self) -> usize {
        fn count(steps: &[Step]) -> usize {
            steps
                .iter()
                .map(|step| match &step.op {
                    Op::Loop { body, .. } => 1 + count(body),
                    _ => 1,
                })
                .sum()
        }
        count(&self.steps)
    }

    pub fn clamped_loop_ends(&self) -> usize {
        self.clamped_loop_ends
    }

    pub fn unclosed_loops(&self) -> usize {
        self.unclosed_loops
    }
}

impl OpenLoop {
    fn into_step(self) -> Step {
        Step {
            index: self.index,
            op: Op::Loop {
                iterations: self.iterations,
                body: self.body,
            },
        }
    }
}

fn attach(open: &mut [OpenLoop], root: &mut Vec<Step>, step: Step) {
    match open.last_mut() {
        Some(parent) => parent.body.push(step),
        None => root.push(step),
    }
}

/// Typed access to one record's fields.
struct Fields<'a> {
    index: usize,
    record: &'a ActionRecord,
}

impl Fields<'_> {
    fn op(&self) -> Result<Op, ExecutionError> {
        let op = match self.record.kind() {
            ActionKind::MoveTo => Op::MoveTo {
                to: self.point()?,
                duration: self.seconds("duration")?,
            },
            ActionKind::Click => Op::Click {
                at: self.point()?,
                clicks: self.integer("clicks")?.clamp(0, i64::from(u32::MAX)) as u32,
                button: self.button("button")?,
            },
            ActionKind::DragTo => Op::DragTo {
                to: self.point()?,
                duration: self.seconds("duration")?,
            },
            ActionKind::Scroll => Op::Scroll {
                amount: self.parse("amount", "32-bit integer")?,
            },
            ActionKind::WriteText => Op::Write {
                text: self.text("text"),
                interval: self.seconds("interval")?,
            },
            ActionKind::PressKey => Op::Press {
                key: self.text("key"),
            },
            ActionKind::Hotkey => Op::Hotkey {
                keys: split_keys(self.record.value("keys")),
            },
            ActionKind::Wait => Op::Wait {
                duration: self.seconds("seconds")?,
            },
            ActionKind::FindAndClickImage => Op::FindAndClick {
                image_path: self.text("image_path"),
                confidence: self.float("confidence")?,
            },
            ActionKind::Screenshot => Op::Screenshot {
                filename: self.text("filename"),
            },
            ActionKind::Comment => Op::Comment {
                note: self.text("note"),
            },
            ActionKind::LoopStart | ActionKind::LoopEnd => {
                unreachable!("loop markers are lowered by Program::lower")
            }
        };
        Ok(op)
    }

    fn text(&self, field: &str) -> String {
        self.record.value(field).to_string()
    }

    fn parse<T: FromStr>(&self, field: &str, expected: &'static str) -> Result<T, ExecutionError> {
        let raw = self.record.value(field);
        raw.trim().parse().map_err(|_| self.invalid(field, expected))
    }

    fn integer(&self, field: &str) -> Result<i64, ExecutionError> {
        self.parse(field, "integer")
    }

    fn float(&self, field: &str) -> Result<f64, ExecutionError> {
        let value: f64 = self.parse(field, "number")?;
        if !value.is_finite() {
            return Err(self.invalid(field, "finite number"));
        }
        Ok(value)
    }

    fn seconds(&self, field: &str) -> Result<Duration, ExecutionError> {
        let secs = self.float(field)?.max(0.0);
        Duration::try_from_secs_f64(secs).map_err(|_| self.invalid(field, "duration in seconds"))
    }

    fn point(&self) -> Result<Point, ExecutionError> {
        Ok(Point::new(
            self.parse("x", "integer coordinate")?,
            self.parse("y", "integer coordinate")?,
        ))
    }

    fn button(&self, field: &str) -> Result<MouseButton, ExecutionError> {
        self.parse(field, "mouse button (left, right or middle)")
    }

    fn invalid(&self, field: &str, expected: &'static str) -> ExecutionError {
        ExecutionError::InvalidLiteral {
            step: self.index + 1,
            kind: self.record.kind().name().to_string(),
            field: field.to_string(),
            value: self.record.value(field).to_string(),
            expected,
        }
    }
}
