use automate::executor::{COMPLETED_MESSAGE, FAIL_SAFE_MESSAGE};
use automate::platforms::{DriverCall, DryRunDriver};
use automate::{
    ActionKind, ActionRecord, Executor, MouseButton, Point, RunEvent, RunOutcome, Workflow,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

fn setup_logging() {
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .try_init();
}

fn record(kind: ActionKind, values: &[(&str, &str)]) -> ActionRecord {
    ActionRecord::with_values(kind, values.iter().copied())
}

fn workflow(records: Vec<ActionRecord>) -> Workflow {
    records.into_iter().collect()
}

fn executor(driver: &Arc<DryRunDriver>) -> Executor {
    Executor::new(driver.clone()).with_startup_delay(Duration::ZERO)
}

#[tokio::test]
async fn test_runs_steps_in_order() {
    setup_logging();
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![
        record(ActionKind::MoveTo, &[("x", "10"), ("y", "20"), ("duration", "0.25")]),
        record(
            ActionKind::Click,
            &[("x", "1"), ("y", "2"), ("clicks", "2"), ("button", "right")],
        ),
        record(ActionKind::Hotkey, &[("keys", "ctrl, c")]),
        record(ActionKind::Wait, &[("seconds", "1.5")]),
        ActionRecord::new(ActionKind::Comment),
    ]);

    let report = executor(&driver).run(&doc).await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.ops_executed, 5);
    assert_eq!(report.log.last().map(String::as_str), Some(COMPLETED_MESSAGE));
    assert_eq!(
        driver.calls(),
        vec![
            DriverCall::MoveTo {
                to: Point::new(10, 20),
                duration: Duration::from_millis(250),
            },
            DriverCall::Click {
                at: Point::new(1, 2),
                clicks: 2,
                button: MouseButton::Right,
            },
            DriverCall::Hotkey {
                keys: vec!["ctrl".to_string(), "c".to_string()],
            },
            DriverCall::Sleep {
                duration: Duration::from_millis(1500),
            },
        ]
    );
}

#[tokio::test]
async fn test_loop_repeats_its_body() {
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![
        record(ActionKind::LoopStart, &[("iterations", "3")]),
        record(ActionKind::PressKey, &[("key", "down")]),
        record(ActionKind::LoopStart, &[("iterations", "2")]),
        record(ActionKind::PressKey, &[("key", "tab")]),
        ActionRecord::new(ActionKind::LoopEnd),
        ActionRecord::new(ActionKind::LoopEnd),
        record(ActionKind::PressKey, &[("key", "enter")]),
    ]);

    let report = executor(&driver).run(&doc).await;
    assert!(report.is_success());

    let keys: Vec<String> = driver
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DriverCall::Press { key } => Some(key),
            _ => None,
        })
        .collect();
    let pass = ["down", "tab", "tab"];
    let mut expected: Vec<&str> = pass.iter().cycle().take(9).copied().collect();
    expected.push("enter");
    assert_eq!(keys, expected);

    let iterations = report
        .log
        .iter()
        .filter(|line| *line == "Loop iteration...")
        .count();
    assert_eq!(iterations, 3 + 3 * 2);
}

#[tokio::test]
async fn test_zero_and_negative_iterations_skip_the_body() {
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![
        record(ActionKind::LoopStart, &[("iterations", "0")]),
        ActionRecord::new(ActionKind::PressKey),
        ActionRecord::new(ActionKind::LoopEnd),
        record(ActionKind::LoopStart, &[("iterations", "-2")]),
        ActionRecord::new(ActionKind::PressKey),
        ActionRecord::new(ActionKind::LoopEnd),
    ]);

    let report = executor(&driver).run(&doc).await;
    assert!(report.is_success());
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn test_unclosed_loop_still_runs_its_body() {
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![
        record(ActionKind::LoopStart, &[("iterations", "2")]),
        record(ActionKind::Scroll, &[("amount", "3")]),
    ]);

    let report = executor(&driver).run(&doc).await;
    assert!(report.is_success());
    assert_eq!(
        driver.calls(),
        vec![DriverCall::Scroll { amount: 3 }, DriverCall::Scroll { amount: 3 }]
    );
}

#[tokio::test]
async fn test_invalid_literal_fails_before_any_driver_call() {
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![
        ActionRecord::new(ActionKind::PressKey),
        record(ActionKind::Click, &[("x", "ten")]),
    ]);

    let report = executor(&driver).run(&doc).await;
    match &report.outcome {
        RunOutcome::Failed(message) => assert!(message.contains("'ten'"), "{message}"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(driver.calls().is_empty());
    assert!(report
        .log
        .last()
        .is_some_and(|line| line.starts_with("Execution Error: ")));
}

#[tokio::test]
async fn test_fail_safe_is_distinguished() {
    let driver = Arc::new(DryRunDriver::new().fail_safe_after(1));
    let doc = workflow(vec![
        ActionRecord::new(ActionKind::PressKey),
        ActionRecord::new(ActionKind::PressKey),
        ActionRecord::new(ActionKind::PressKey),
    ]);

    let report = executor(&driver).run(&doc).await;
    assert_eq!(report.outcome, RunOutcome::FailSafe);
    assert_eq!(report.ops_executed, 1);
    assert_eq!(report.log.last().map(String::as_str), Some(FAIL_SAFE_MESSAGE));
    assert_eq!(driver.calls().len(), 1);
}

#[tokio::test]
async fn test_find_and_click_image() {
    let driver = Arc::new(DryRunDriver::new().with_image("found.png", Point::new(300, 200)));
    let doc = workflow(vec![
        record(ActionKind::FindAndClickImage, &[("image_path", "found.png")]),
        record(
            ActionKind::FindAndClickImage,
            &[("image_path", "/tmp/shots/missing.png"), ("confidence", "0.7")],
        ),
    ]);

    let report = executor(&driver).run(&doc).await;
    assert!(report.is_success());
    assert_eq!(
        driver.calls(),
        vec![
            DriverCall::Locate {
                image_path: "found.png".to_string(),
                confidence: 0.9,
            },
            DriverCall::ClickAt {
                at: Point::new(300, 200),
            },
            DriverCall::Locate {
                image_path: "/tmp/shots/missing.png".to_string(),
                confidence: 0.7,
            },
        ]
    );
    assert!(report
        .log
        .iter()
        .any(|line| line == "Image not found: missing.png"));
}

#[tokio::test]
async fn test_spawn_streams_events_and_uses_a_snapshot() {
    let driver = Arc::new(DryRunDriver::new());
    let mut doc = workflow(vec![ActionRecord::new(ActionKind::Screenshot)]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let task = executor(&driver).spawn(doc.clone(), tx);
    doc.append(ActionRecord::new(ActionKind::PressKey));
    task.await.unwrap();

    let mut lines = Vec::new();
    let mut finished = None;
    while let Ok(event) = rx.try_recv() {
        match event {
            RunEvent::Log { message, .. } => lines.push(message),
            RunEvent::Finished(report) => finished = Some(report),
        }
    }

    let report = finished.expect("run should report completion");
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(lines, report.log);
    assert_eq!(
        driver.calls(),
        vec![DriverCall::Screenshot {
            filename: "snap.png".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_startup_delay_is_applied() {
    let driver = Arc::new(DryRunDriver::new());
    let doc = workflow(vec![ActionRecord::new(ActionKind::Comment)]);

    let report = Executor::new(driver.clone())
        .with_startup_delay(Duration::from_millis(50))
        .run(&doc)
        .await;
    assert!(report.elapsed >= Duration::from_millis(50));
}
