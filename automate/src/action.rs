use crate::errors::WorkflowError;
use crate::schema::{ActionKind, FieldDecl};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Process-local identity of a record inside a workflow. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A concrete instance of an action kind with every declared field filled in.
///
/// Values are kept as the operator typed them. Whether they are valid for
/// the declared field kind is only decided when the record is lowered for
/// execution.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    id: RecordId,
    kind: ActionKind,
    values: BTreeMap<String, String>,
}

impl ActionRecord {
    /// A record with every field at its declared default.
    pub fn new(kind: ActionKind) -> Self {
        Self::with_values(kind, std::iter::empty::<(String, String)>())
    }

    /// A record whose fields take the given values where provided and the
    /// declared default otherwise. Names the kind does not declare are dropped.
    pub fn with_values<K, V>(kind: ActionKind, initial: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut provided: HashMap<String, String> = initial
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let values = kind
            .fields()
            .iter()
            .map(|decl| {
                let value = provided
                    .remove(decl.name)
                    .unwrap_or_else(|| decl.default.to_string());
                (decl.name.to_string(), value)
            })
            .collect();

        if !provided.is_empty() {
            let mut dropped: Vec<_> = provided.into_keys().collect();
            dropped.sort();
            debug!(kind = %kind, ?dropped, "Ignoring undeclared fields");
        }

        Self {
            id: RecordId::new(),
            kind,
            values,
        }
    }

    /// Resolve `kind` through the schema registry and build a record from it.
    pub fn create(
        kind: &str,
        initial: Option<&HashMap<String, String>>,
    ) -> Result<Self, WorkflowError> {
        let kind: ActionKind = kind.parse()?;
        Ok(match initial {
            Some(values) => Self::with_values(kind, values.clone()),
            None => Self::new(kind),
        })
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Value of a declared field. Every declared field is always present, so
    /// this only returns "" for names the kind does not declare.
    pub fn value(&self, field: &str) -> &str {
        self.get(field).unwrap_or_default()
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<(), WorkflowError> {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(WorkflowError::UnknownField {
                kind: self.kind.to_string(),
                field: field.to_string(),
            }),
        }
    }

    /// Field declarations paired with their current values, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldDecl, &str)> + '_ {
        self.kind
            .fields()
            .iter()
            .map(move |decl| (decl, self.value(decl.name)))
    }
}

/// Structural equality: same kind, same field values. Identity is ignored.
impl PartialEq for ActionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.values == other.values
    }
}

impl Eq for ActionRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_rejects_undeclared_field() {
        let mut record = ActionRecord::new(ActionKind::Wait);
        record.set("seconds", "2.5").unwrap();
        assert_eq!(record.value("seconds"), "2.5");

        let err = record.set("minutes", "1").unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownField { ref field, .. } if field == "minutes"));
        assert_eq!(record.values().len(), 1);
    }

    #[test]
    fn test_equality_ignores_identity() {
        let a = ActionRecord::new(ActionKind::Click);
        let b = ActionRecord::new(ActionKind::Click);
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fields_follow_schema_order() {
        let record = ActionRecord::with_values(ActionKind::Click, [("button", "right")]);
        let pairs: Vec<_> = record.fields().map(|(d, v)| (d.name, v)).collect();
        assert_eq!(
            pairs,
            vec![("x", "0"), ("y", "0"), ("clicks", "1"), ("button", "right")]
        );
    }
}
