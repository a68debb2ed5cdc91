//! Project files and script export.
//!
//! A project is a list of `{"type": <kind name>, "data": {field: value}}`
//! entries in execution order. JSON is the native format; YAML is accepted
//! for files ending in `.yaml` or `.yml`. Loading either yields a whole
//! document or an error, never a partial one.

use crate::action::ActionRecord;
use crate::compiler::ScriptCompiler;
use crate::config::AutomateConfig;
use crate::errors::WorkflowError;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectFormat {
    #[default]
    Json,
    Yaml,
}

impl ProjectFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml") | Some("yml") => ProjectFormat::Yaml,
            _ => ProjectFormat::Json,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedAction {
    #[serde(rename = "type")]
    kind: String,
    data: BTreeMap<String, FieldValue>,
}

/// A field value as found on disk. Hand-edited files may carry bare numbers
/// or booleans; they are read back as their text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl FieldValue {
    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{f:.1}"),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Bool(b) => (if b { "True" } else { "False" }).to_string(),
        }
    }
}

fn persisted(workflow: &Workflow) -> Vec<PersistedAction> {
    workflow
        .iter()
        .map(|record| PersistedAction {
            kind: record.kind().name().to_string(),
            data: record
                .values()
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::Text(v.clone())))
                .collect(),
        })
        .collect()
}

fn rebuild(entries: Vec<PersistedAction>) -> Result<Workflow, WorkflowError> {
    let mut workflow = Workflow::new();
    for entry in entries {
        let data: HashMap<String, String> = entry
            .data
            .into_iter()
            .map(|(k, v)| (k, v.into_text()))
            .collect();
        workflow.append(ActionRecord::create(&entry.kind, Some(&data))?);
    }
    Ok(workflow)
}

/// JSON text of `workflow`, indented with four spaces.
pub fn serialize(workflow: &Workflow) -> Result<String, WorkflowError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    persisted(workflow).serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| WorkflowError::Format(e.to_string()))
}

/// Rebuild a workflow from JSON text.
pub fn deserialize(text: &str) -> Result<Workflow, WorkflowError> {
    rebuild(serde_json::from_str(text)?)
}

pub fn serialize_as(workflow: &Workflow, format: ProjectFormat) -> Result<String, WorkflowError> {
    match format {
        ProjectFormat::Json => serialize(workflow),
        ProjectFormat::Yaml => Ok(serde_yaml::to_string(&persisted(workflow))?),
    }
}

pub fn deserialize_as(text: &str, format: ProjectFormat) -> Result<Workflow, WorkflowError> {
    match format {
        ProjectFormat::Json => deserialize(text),
        ProjectFormat::Yaml => rebuild(serde_yaml::from_str(text)?),
    }
}

/// Write `workflow` to `path`, in the format its extension names.
#[instrument(skip(workflow), fields(steps = workflow.len()))]
pub fn save(workflow: &Workflow, path: &Path) -> Result<(), WorkflowError> {
    let text = serialize_as(workflow, ProjectFormat::from_path(path))?;
    fs::write(path, text)?;
    info!("Saved project to {}", path.display());
    Ok(())
}

#[instrument]
pub fn load(path: &Path) -> Result<Workflow, WorkflowError> {
    let text = fs::read_to_string(path)?;
    let workflow = deserialize_as(&text, ProjectFormat::from_path(path))?;
    debug!(steps = workflow.len(), "Loaded project");
    Ok(workflow)
}

/// Compile `workflow` and write the script to `path`.
pub fn export_script(
    workflow: &Workflow,
    path: &Path,
    config: &AutomateConfig,
) -> Result<(), WorkflowError> {
    let script = ScriptCompiler::new(config.script_delay).compile(workflow);
    fs::write(path, script.render())?;
    info!(
        lines = script.lines.len(),
        "Exported script to {}",
        path.display()
    );
    Ok(())
}
