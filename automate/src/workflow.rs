//! The workflow document: an ordered list of action records.
//!
//! Order is execution order. Records can only be reordered by swapping with a
//! neighbour, which keeps the operations small enough for a block editor.
//! Loop balance is not checked here; the compiler and the program lowering
//! decide what an unbalanced document means.

use crate::action::{ActionRecord, RecordId};
use crate::errors::WorkflowError;
use crate::types::Point;
use std::str::FromStr;
use tracing::debug;

/// Direction for [`Workflow::swap_adjacent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("expected 'up' or 'down', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workflow {
    records: Vec<ActionRecord>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ActionRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, record: ActionRecord) -> RecordId {
        let id = record.id();
        self.records.push(record);
        id
    }

    /// Remove the record with `id`. The document is untouched when it is absent.
    pub fn remove(&mut self, id: RecordId) -> Result<ActionRecord, WorkflowError> {
        let index = self.position(id).ok_or(WorkflowError::RecordNotFound(id))?;
        Ok(self.records.remove(index))
    }

    /// Exchange the record with its predecessor or successor.
    ///
    /// Moving the first record up or the last record down does nothing.
    pub fn swap_adjacent(&mut self, id: RecordId, direction: Direction) -> Result<(), WorkflowError> {
        let index = self.position(id).ok_or(WorkflowError::RecordNotFound(id))?;
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|&i| i < self.records.len()),
        };
        match target {
            Some(target) => self.records.swap(index, target),
            None => debug!(%id, ?direction, "Record already at boundary"),
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Write picked coordinates into a record's `x`/`y` fields. Records that
    /// declare no coordinates are left as they are.
    pub fn set_coordinates(&mut self, id: RecordId, point: Point) -> Result<(), WorkflowError> {
        let record = self.get_mut(id).ok_or(WorkflowError::RecordNotFound(id))?;
        if !record.kind().schema().has_coordinates() {
            debug!(%id, kind = %record.kind(), "Record has no coordinates to update");
            return Ok(());
        }
        record.set("x", point.x.to_string())?;
        record.set("y", point.y.to_string())?;
        Ok(())
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn get(&self, id: RecordId) -> Option<&ActionRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut ActionRecord> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a Workflow {
    type Item = &'a ActionRecord;
    type IntoIter = std::slice::Iter<'a, ActionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ActionRecord> for Workflow {
    fn from_iter<I: IntoIterator<Item = ActionRecord>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}
