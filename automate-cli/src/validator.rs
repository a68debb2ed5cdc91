use automate::platforms::keys::key_from_name;
use automate::{compiler, ActionKind, Program, ScriptCompiler, Workflow};
use colored::*;
use std::path::Path;

/// Checks a workflow for problems that would only show up when it runs
pub struct WorkflowValidator;

impl WorkflowValidator {
    pub fn validate(workflow: &Workflow) -> ValidationResult {
        let mut result = ValidationResult {
            steps: workflow.len(),
            ..ValidationResult::default()
        };

        if workflow.is_empty() {
            result
                .warnings
                .push("Workflow has no blocks - nothing will run".to_string());
            return result;
        }

        // Loop structure
        let script = ScriptCompiler::default().compile(workflow);
        result.max_depth = script.max_depth;
        if script.clamped_loop_ends > 0 {
            result.warnings.push(format!(
                "{} 'Loop End' block(s) without a matching 'Loop Start' are ignored",
                script.clamped_loop_ends
            ));
        }
        if script.unclosed_loops > 0 {
            result.warnings.push(format!(
                "{} 'Loop Start' block(s) are never closed - they run to the end of the workflow",
                script.unclosed_loops
            ));
        }

        // Field literals
        match Program::lower(workflow) {
            Ok(_) => result.literals_valid = true,
            Err(err) => result.errors.push(err.to_string()),
        }

        for (index, record) in workflow.iter().enumerate() {
            let step = index + 1;
            match record.kind() {
                ActionKind::FindAndClickImage => {
                    let path = record.value("image_path");
                    if path.trim().is_empty() {
                        result
                            .errors
                            .push(format!("Step {step}: 'Find & Click Image' has no image_path"));
                    } else if !Path::new(path).exists() {
                        result
                            .warnings
                            .push(format!("Step {step}: image '{path}' does not exist here"));
                    }
                    if let Ok(confidence) = record.value("confidence").trim().parse::<f64>() {
                        if !(0.0..=1.0).contains(&confidence) {
                            result.warnings.push(format!(
                                "Step {step}: confidence {confidence} is outside 0.0-1.0"
                            ));
                        }
                    }
                }
                ActionKind::PressKey => {
                    Self::check_key(&mut result, step, record.value("key"));
                }
                ActionKind::Hotkey => {
                    let keys = compiler::split_keys(record.value("keys"));
                    if keys.is_empty() {
                        result
                            .errors
                            .push(format!("Step {step}: 'Hotkey' has no keys"));
                    }
                    for key in keys {
                        Self::check_key(&mut result, step, &key);
                    }
                }
                _ => {}
            }
        }

        result
    }

    fn check_key(result: &mut ValidationResult, step: usize, key: &str) {
        if key_from_name(key).is_none() {
            result
                .warnings
                .push(format!("Step {step}: unknown key name '{key}'"));
        }
    }

    /// Display validation results in a user-friendly format
    pub fn display_results(result: &ValidationResult) {
        println!();
        println!("{}", "═".repeat(60));
        println!("{}", "WORKFLOW VALIDATION REPORT".bold());
        println!("{}", "═".repeat(60));

        let status = if result.errors.is_empty() {
            if result.warnings.is_empty() {
                "✅ VALID".green().bold()
            } else {
                "⚠️  VALID WITH WARNINGS".yellow().bold()
            }
        } else {
            "❌ INVALID".red().bold()
        };

        println!("\nStatus: {status}");
        println!("{}", "─".repeat(60));
        println!("  Steps: {}", result.steps);
        println!("  Deepest nesting: {}", result.max_depth.saturating_sub(1));
        Self::print_check("Field values", result.literals_valid);

        if !result.errors.is_empty() {
            println!("\n{}", "Errors:".red().bold());
            for error in &result.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if !result.warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for warning in &result.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        println!("\n{}", "═".repeat(60));
        println!();
    }

    fn print_check(label: &str, passed: bool) {
        let icon = if passed { "✓".green() } else { "✗".red() };
        let status = if passed {
            "Valid".green()
        } else {
            "Invalid".red()
        };
        println!("  {icon} {label}: {status}");
    }
}

/// Result of workflow validation
#[derive(Default, Debug)]
pub struct ValidationResult {
    pub steps: usize,
    pub max_depth: usize,
    pub literals_valid: bool,

    // Issues found
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Check if the workflow is valid (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automate::ActionRecord;

    fn record(kind: ActionKind, values: &[(&str, &str)]) -> ActionRecord {
        ActionRecord::with_values(kind, values.iter().copied())
    }

    #[test]
    fn test_clean_workflow() {
        let workflow: Workflow = vec![
            record(ActionKind::LoopStart, &[("iterations", "2")]),
            record(ActionKind::Hotkey, &[("keys", "ctrl, v")]),
            ActionRecord::new(ActionKind::LoopEnd),
        ]
        .into_iter()
        .collect();

        let result = WorkflowValidator::validate(&workflow);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.max_depth, 2);
    }

    #[test]
    fn test_bad_literal_and_missing_image_are_errors() {
        let workflow: Workflow = vec![
            record(ActionKind::Wait, &[("seconds", "soon")]),
            ActionRecord::new(ActionKind::FindAndClickImage),
        ]
        .into_iter()
        .collect();

        let result = WorkflowValidator::validate(&workflow);
        assert!(!result.is_valid());
        assert!(!result.literals_valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_structure_and_key_warnings() {
        let workflow: Workflow = vec![
            ActionRecord::new(ActionKind::LoopEnd),
            record(ActionKind::PressKey, &[("key", "hyperspace")]),
            ActionRecord::new(ActionKind::LoopStart),
        ]
        .into_iter()
        .collect();

        let result = WorkflowValidator::validate(&workflow);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn test_empty_workflow_warns() {
        let result = WorkflowValidator::validate(&Workflow::new());
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }
}
