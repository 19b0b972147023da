//! Program interpreter

use std::sync::Arc;
use std::time::Duration;

use preview_agent::deploy::interpreter::{ExecutionPolicy, Interpreter};
use preview_agent::deploy::program::{log, Invocation, Program};
use preview_agent::deploy::progress::ProgressLog;

use crate::support::{Events, FakeRunner};

fn step(name: &str) -> Program {
    Invocation::new("step", [name]).into()
}

#[tokio::test]
async fn test_sequence_runs_in_order() {
    let events = Events::default();
    let interpreter = Interpreter::new(Arc::new(FakeRunner::new(events.clone())), ExecutionPolicy::Sequential);
    let progress = ProgressLog::new();

    let program = Program::sequence([
        log("Starting.."),
        step("one"),
        Program::sequence([step("two"), log("Halfway.."), step("three")]),
    ]);
    interpreter.execute(&program, &progress).await.unwrap();

    assert_eq!(events.all(), vec!["run: step one", "run: step two", "run: step three"]);
    assert_eq!(progress.lines(), vec!["Starting..", "Halfway.."]);
}

#[tokio::test]
async fn test_sequence_fails_fast() {
    let events = Events::default();
    let runner = FakeRunner::new(events.clone());
    runner.fail_on("two");
    let interpreter = Interpreter::new(Arc::new(runner), ExecutionPolicy::Sequential);
    let progress = ProgressLog::new();

    let program = Program::sequence([step("one"), step("two"), log("Unreached.."), step("three")]);
    let err = interpreter.execute(&program, &progress).await.unwrap_err();

    assert_eq!(err.exit_code(), Some(1));
    assert_eq!(events.all(), vec!["run: step one", "run: step two"]);
    assert!(!progress.lines().contains(&"Unreached..".to_string()));
}

#[tokio::test]
async fn test_empty_sequence_succeeds() {
    let events = Events::default();
    let interpreter = Interpreter::new(Arc::new(FakeRunner::new(events.clone())), ExecutionPolicy::default());

    interpreter
        .execute(&Program::sequence([]), &ProgressLog::new())
        .await
        .unwrap();

    assert!(events.all().is_empty());
    assert_eq!(interpreter.policy(), ExecutionPolicy::Sequential);
}

#[tokio::test]
async fn test_concurrent_policy_starts_all_children() {
    let events = Events::default();
    let runner = FakeRunner::new(events.clone()).with_delay(Duration::from_millis(50));
    let interpreter = Interpreter::new(Arc::new(runner), ExecutionPolicy::Concurrent);

    let program = Program::sequence([step("one"), step("two"), step("three")]);
    interpreter.execute(&program, &ProgressLog::new()).await.unwrap();

    let mut ran = events.all();
    ran.sort();
    assert_eq!(ran, vec!["run: step one", "run: step three", "run: step two"]);
}

#[tokio::test]
async fn test_concurrent_policy_reports_failure() {
    let events = Events::default();
    let runner = FakeRunner::new(events.clone());
    runner.fail_on("two");
    let interpreter = Interpreter::new(Arc::new(runner), ExecutionPolicy::Concurrent);

    let program = Program::sequence([step("one"), step("two")]);
    assert!(interpreter.execute(&program, &ProgressLog::new()).await.is_err());
}
