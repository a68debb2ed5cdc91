use automate::compiler::{compile, ScriptCompiler, LOOP_END_MARKER};
use automate::{ActionKind, ActionRecord, Workflow};
use std::time::Duration;

fn record(kind: ActionKind, values: &[(&str, &str)]) -> ActionRecord {
    ActionRecord::with_values(kind, values.iter().copied())
}

fn loop_start(iterations: &str) -> ActionRecord {
    record(ActionKind::LoopStart, &[("iterations", iterations)])
}

fn loop_end() -> ActionRecord {
    ActionRecord::new(ActionKind::LoopEnd)
}

fn workflow(records: Vec<ActionRecord>) -> Workflow {
    records.into_iter().collect()
}

#[test]
fn test_wait_loop_click_scenario() {
    let doc = workflow(vec![
        record(ActionKind::Wait, &[("seconds", "1.0")]),
        loop_start("3"),
        record(
            ActionKind::Click,
            &[("x", "10"), ("y", "20"), ("clicks", "1"), ("button", "left")],
        ),
        loop_end(),
    ]);

    let expected = "\
import pyautogui
import time
import os

pyautogui.FAILSAFE = True

def run_automation():
    print('--- Starting Automation ---')
    time.sleep(1.0)
    for _ in range(3):
        print('Loop iteration...')
        pyautogui.click(x=10, y=20, clicks=1, button='left')
    # End Loop

if __name__ == '__main__':
    # Give user time to switch windows
    time.sleep(2)
    run_automation()";

    assert_eq!(compile(&doc), expected);

    let script = ScriptCompiler::default().compile(&doc);
    let header = script
        .lines
        .iter()
        .find(|l| l.text == "for _ in range(3):")
        .unwrap();
    let clicks: Vec<_> = script
        .lines
        .iter()
        .filter(|l| l.text.starts_with("pyautogui.click("))
        .collect();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].depth, header.depth + 1);
    assert_eq!(script.final_depth, 1);
    assert!(script.is_balanced());
}

#[test]
fn test_compilation_is_idempotent() {
    let doc = workflow(vec![
        loop_start("2"),
        record(ActionKind::WriteText, &[("text", "it's done")]),
        loop_end(),
        ActionRecord::new(ActionKind::FindAndClickImage),
    ]);
    assert_eq!(compile(&doc), compile(&doc));
}

#[test]
fn test_max_depth_is_nesting_plus_one() {
    let doc = workflow(vec![
        loop_start("2"),
        ActionRecord::new(ActionKind::PressKey),
        loop_start("3"),
        ActionRecord::new(ActionKind::PressKey),
        loop_end(),
        loop_end(),
        loop_start("4"),
        loop_end(),
        ActionRecord::new(ActionKind::Comment),
    ]);

    let script = ScriptCompiler::default().compile(&doc);
    assert_eq!(script.max_depth, 3);
    assert_eq!(script.final_depth, 1);
    assert_eq!(script.lines.iter().map(|l| l.depth).max(), Some(3));
    assert_eq!(script.clamped_loop_ends, 0);
    assert_eq!(script.unclosed_loops, 0);

    let comment = script.lines.iter().find(|l| l.text.starts_with("# Describe")).unwrap();
    assert_eq!(comment.depth, 1);
}

#[test]
fn test_excess_loop_end_is_clamped_at_base_depth() {
    let doc = workflow(vec![
        loop_end(),
        ActionRecord::new(ActionKind::PressKey),
        loop_start("2"),
        loop_end(),
        loop_end(),
    ]);

    let script = ScriptCompiler::default().compile(&doc);
    assert_eq!(script.clamped_loop_ends, 2);
    assert_eq!(script.final_depth, 1);
    for line in script.lines.iter().filter(|l| l.text == LOOP_END_MARKER) {
        assert_eq!(line.depth, 1);
    }
    let press = script
        .lines
        .iter()
        .find(|l| l.text.starts_with("pyautogui.press("))
        .unwrap();
    assert_eq!(press.depth, 1);
}

#[test]
fn test_unclosed_loops_are_closed_at_end() {
    let doc = workflow(vec![
        loop_start("2"),
        loop_start("2"),
        ActionRecord::new(ActionKind::PressKey),
    ]);

    let script = ScriptCompiler::default().compile(&doc);
    assert_eq!(script.unclosed_loops, 2);
    assert_eq!(script.final_depth, 3);
    assert!(!script.is_balanced());

    let markers: Vec<usize> = script
        .lines
        .iter()
        .filter(|l| l.text == LOOP_END_MARKER)
        .map(|l| l.depth)
        .collect();
    assert_eq!(markers, vec![2, 1]);

    let text = script.render();
    assert!(text.ends_with("    run_automation()"));
}

#[test]
fn test_per_kind_lines() {
    let doc = workflow(vec![
        record(ActionKind::MoveTo, &[("x", " 5 "), ("y", "6")]),
        ActionRecord::new(ActionKind::DragTo),
        ActionRecord::new(ActionKind::Scroll),
        record(ActionKind::Hotkey, &[("keys", "ctrl, shift ,,esc")]),
        record(
            ActionKind::FindAndClickImage,
            &[("image_path", r"C:\shots\ok.png"), ("confidence", "0.8")],
        ),
        ActionRecord::new(ActionKind::Screenshot),
        record(ActionKind::Comment, &[("note", "two\nlines")]),
    ]);

    let text = compile(&doc);
    for expected in [
        "    pyautogui.moveTo(5, 6, duration=0.5)",
        "    pyautogui.dragTo(0, 0, duration=1.0, button='left')",
        "    pyautogui.scroll(-500)",
        "    pyautogui.hotkey('ctrl', 'shift', 'esc')",
        r"    loc = pyautogui.locateCenterOnScreen('C:\\shots\\ok.png', confidence=0.8)",
        "    if loc:",
        "        pyautogui.click(loc)",
        "    else:",
        "        print('Image not found: ok.png')",
        "    pyautogui.screenshot('snap.png')",
        "    # two lines",
    ] {
        assert!(
            text.lines().any(|line| line == expected),
            "missing line {expected:?} in\n{text}"
        );
    }
}

#[test]
fn test_non_numeric_values_are_embedded_as_typed() {
    let doc = workflow(vec![record(ActionKind::Scroll, &[("amount", "lots")])]);
    assert!(compile(&doc).contains("    pyautogui.scroll(lots)"));
}

#[test]
fn test_script_delay_is_configurable() {
    let script = ScriptCompiler::new(Duration::from_millis(500)).compile(&Workflow::new());
    assert!(script.render().contains("    time.sleep(0.5)\n"));
}
