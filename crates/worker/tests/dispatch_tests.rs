//! Integration tests for the execution bridge.
//!
//! Exercises the dispatcher's outcome contract with a recording stub
//! analyzer: valid jobs succeed, malformed payloads are rejected without
//! invoking the analyzer, and every analyzer fault is contained.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use kgraph_core::analyzer::FlowAnalyzer;
use kgraph_worker::dispatcher::Dispatcher;

/// What the stub analyzer does when invoked.
#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Records every invocation, then behaves as configured.
struct StubAnalyzer {
    behavior: Behavior,
    calls: Mutex<Vec<(i64, String, String)>>,
}

impl StubAnalyzer {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(i64, String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowAnalyzer for StubAnalyzer {
    async fn understand(
        &self,
        project_id: i64,
        directory: &str,
        user_id: &str,
    ) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((project_id, directory.to_string(), user_id.to_string()));

        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(anyhow::anyhow!("analysis deadline exceeded")),
            Behavior::Panic => panic!("analyzer crashed"),
        }
    }
}

fn valid_payload() -> serde_json::Value {
    json!({
        "project_id": 42,
        "directory": "/repo/src",
        "user_id": "u-1",
    })
}

// ---------------------------------------------------------------------------
// Outcome contract
// ---------------------------------------------------------------------------

#[test]
fn valid_job_with_successful_analysis_completes() {
    let analyzer = StubAnalyzer::new(Behavior::Succeed);
    let dispatcher = Dispatcher::new(analyzer.clone());

    assert!(dispatcher.dispatch(&valid_payload()));
    assert_eq!(
        analyzer.calls(),
        vec![(42, "/repo/src".to_string(), "u-1".to_string())]
    );
}

#[test]
fn non_integer_project_id_is_rejected_before_analysis() {
    let analyzer = StubAnalyzer::new(Behavior::Succeed);
    let dispatcher = Dispatcher::new(analyzer.clone());

    let outcome = dispatcher.dispatch(&json!({
        "project_id": "abc",
        "directory": "/repo/src",
        "user_id": "u-1",
    }));

    assert!(!outcome);
    assert!(
        analyzer.calls().is_empty(),
        "analyzer must not run for an invalid payload"
    );
}

#[test]
fn empty_directory_is_rejected() {
    let analyzer = StubAnalyzer::new(Behavior::Succeed);
    let dispatcher = Dispatcher::new(analyzer.clone());

    let outcome = dispatcher.dispatch(&json!({
        "project_id": 7,
        "directory": "",
        "user_id": "u-2",
    }));

    assert!(!outcome);
    assert!(analyzer.calls().is_empty());
}

#[test]
fn missing_user_id_is_rejected() {
    let analyzer = StubAnalyzer::new(Behavior::Succeed);
    let dispatcher = Dispatcher::new(analyzer.clone());

    let outcome = dispatcher.dispatch(&json!({
        "project_id": 7,
        "directory": "/repo",
    }));

    assert!(!outcome);
    assert!(analyzer.calls().is_empty());
}

#[test]
fn analyzer_fault_is_contained() {
    let analyzer = StubAnalyzer::new(Behavior::Fail);
    let dispatcher = Dispatcher::new(analyzer.clone());

    let outcome = dispatcher.dispatch(&json!({
        "project_id": 7,
        "directory": "/repo",
        "user_id": "u-2",
    }));

    assert!(!outcome);
    assert_eq!(analyzer.calls().len(), 1, "analyzer runs exactly once");
}

#[test]
fn analyzer_panic_is_contained() {
    let analyzer = StubAnalyzer::new(Behavior::Panic);
    let dispatcher = Dispatcher::new(analyzer);

    assert!(!dispatcher.dispatch(&valid_payload()));
}

// ---------------------------------------------------------------------------
// Sequential jobs on one executor
// ---------------------------------------------------------------------------

#[test]
fn sequential_jobs_do_not_leak_state() {
    let failing = StubAnalyzer::new(Behavior::Fail);
    let first = Dispatcher::new(failing);
    assert!(!first.dispatch(&json!({
        "project_id": 1,
        "directory": "/a",
        "user_id": "u",
    })));

    let succeeding = StubAnalyzer::new(Behavior::Succeed);
    let second = Dispatcher::new(succeeding.clone());
    assert!(second.dispatch(&json!({
        "project_id": 2,
        "directory": "/b",
        "user_id": "u",
    })));
    assert_eq!(succeeding.calls().len(), 1);
}

#[test]
fn dispatch_recovers_after_analyzer_panic() {
    // The panicked run leaves its context mid-flight; the next job on the
    // same thread must get a fresh, idle context.
    let panicking = StubAnalyzer::new(Behavior::Panic);
    let dispatcher = Dispatcher::new(panicking);
    assert!(!dispatcher.dispatch(&valid_payload()));

    let succeeding = StubAnalyzer::new(Behavior::Succeed);
    let dispatcher = Dispatcher::new(succeeding.clone());
    assert!(dispatcher.dispatch(&valid_payload()));
    assert_eq!(succeeding.calls().len(), 1);
}
