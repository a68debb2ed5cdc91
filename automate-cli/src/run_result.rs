use automate::{RunOutcome, RunReport};
use serde::Serialize;

/// How a run ended, from the operator's point of view
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Success,
    FailSafe,
    Failure,
}

/// Summary printed after `automate run`
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub success: bool,
    pub state: RunState,
    /// Human-readable message about the result
    pub message: String,
    /// Error details (if failed)
    pub error: Option<String>,
    pub driver: String,
    pub duration_ms: u64,
    /// Operations handed to the driver, counting loop passes
    pub executed_steps: usize,
    pub log: Vec<String>,
}

impl RunSummary {
    pub fn from_report(report: &RunReport, driver: &str) -> Self {
        let (state, message, error) = match &report.outcome {
            RunOutcome::Completed => (
                RunState::Success,
                "Workflow completed successfully".to_string(),
                None,
            ),
            RunOutcome::FailSafe => (
                RunState::FailSafe,
                "Aborted: pointer moved into a screen corner".to_string(),
                None,
            ),
            RunOutcome::Failed(error) => (
                RunState::Failure,
                "Workflow execution encountered errors".to_string(),
                Some(error.clone()),
            ),
        };

        Self {
            success: state == RunState::Success,
            state,
            message,
            error,
            driver: driver.to_string(),
            duration_ms: report.elapsed.as_millis() as u64,
            executed_steps: report.ops_executed,
            log: report.log.clone(),
        }
    }

    /// Process exit code for this result
    pub fn exit_code(&self) -> i32 {
        match self.state {
            RunState::Success => 0,
            RunState::Failure => 1,
            RunState::FailSafe => 2,
        }
    }

    /// Display the result in a user-friendly format
    pub fn display(&self) {
        use colored::*;

        println!();
        println!("{}", "═".repeat(60));

        match self.state {
            RunState::Success => {
                println!("{} {}", "✅ SUCCESS:".green().bold(), self.message);
            }
            RunState::FailSafe => {
                println!("{} {}", "🛑 FAIL-SAFE:".yellow().bold(), self.message);
            }
            RunState::Failure => {
                println!("{} {}", "❌ FAILURE:".red().bold(), self.message);
            }
        }

        println!("{}", "─".repeat(60));
        println!("📊 Execution Details:");
        println!("   • Driver: {}", self.driver);
        println!("   • Steps Executed: {}", self.executed_steps);
        let seconds = self.duration_ms as f64 / 1000.0;
        println!("   • Duration: {seconds:.2}s");

        if let Some(error) = &self.error {
            println!("{}", "─".repeat(60));
            println!("{} {}", "⚠️  Error:".yellow(), error);
        }

        println!("{}", "═".repeat(60));
        println!();
    }
}
