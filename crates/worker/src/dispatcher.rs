//! Execution bridge between the queue and the asynchronous analyzer.
//!
//! The broker hands each job to a synchronous executor thread, but the
//! analysis capability is an async call. [`Dispatcher`] bridges the two:
//! it validates the raw payload, acquires an execution context able to
//! drive async work from the blocking call site, runs the analyzer to
//! completion exactly once, and collapses every failure mode into the
//! boolean outcome the broker reports.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use kgraph_broker::TaskHandler;
use kgraph_core::analyzer::FlowAnalyzer;
use kgraph_core::request::FlowInferenceRequest;

/// Faults captured at the bridge boundary.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    /// Building the execution context failed.
    #[error("failed to set up execution context: {0}")]
    Context(#[from] std::io::Error),

    /// The analysis run itself failed.
    #[error("flow analysis failed: {0}")]
    Analysis(#[source] anyhow::Error),
}

/// Drives one asynchronous computation at a time on a single executor
/// thread.
///
/// Wraps a current-thread runtime plus an in-flight marker. The marker is
/// cleared only when a run terminates normally; if the run unwinds, the
/// context stays marked in-flight and the next acquisition replaces it
/// rather than reuse a scheduler in an unknown state.
struct ExecutionContext {
    runtime: tokio::runtime::Runtime,
    in_flight: Cell<bool>,
}

impl ExecutionContext {
    fn new() -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        #[cfg(test)]
        tests::CONTEXTS_CREATED.with(|count| count.set(count.get() + 1));

        Ok(Self {
            runtime,
            in_flight: Cell::new(false),
        })
    }

    fn is_idle(&self) -> bool {
        !self.in_flight.get()
    }

    /// Drive a future to completion, blocking the calling thread.
    fn run<F: std::future::Future>(&self, future: F) -> F::Output {
        self.in_flight.set(true);
        let output = self.runtime.block_on(future);
        self.in_flight.set(false);
        output
    }
}

thread_local! {
    /// The executor thread's execution context, if one has been created.
    static CONTEXT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's idle execution context.
///
/// Reuses the existing context when it is idle, replaces it when it is
/// still marked in-flight, and creates one when the thread has none yet.
fn with_idle_context<T>(f: impl FnOnce(&ExecutionContext) -> T) -> std::io::Result<T> {
    CONTEXT.with(|slot| {
        let reusable = matches!(&*slot.borrow(), Some(ctx) if ctx.is_idle());
        if reusable {
            tracing::debug!("Reusing idle execution context");
        } else {
            if slot.borrow().is_some() {
                tracing::debug!("Execution context is busy, creating a new one");
            } else {
                tracing::debug!("No execution context on this thread, creating one");
            }
            *slot.borrow_mut() = Some(ExecutionContext::new()?);
        }

        let slot = slot.borrow();
        let ctx = slot.as_ref().expect("execution context installed above");
        Ok(f(ctx))
    })
}

/// The task dispatcher: one [`dispatch`](Dispatcher::dispatch) call per
/// queued job, returning the binary outcome the broker reports.
pub struct Dispatcher {
    analyzer: Arc<dyn FlowAnalyzer>,
}

impl Dispatcher {
    pub fn new(analyzer: Arc<dyn FlowAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Validate and execute one flow-inference job.
    ///
    /// Nothing escapes this call: validation failures, context setup
    /// failures, analyzer errors, and panics are all logged and collapsed
    /// to `false`. Returns `true` only when the analyzer ran to
    /// completion.
    pub fn dispatch(&self, payload: &serde_json::Value) -> bool {
        let request = match FlowInferenceRequest::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting job with invalid payload");
                return false;
            }
        };

        tracing::debug!(
            project_id = request.project_id,
            directory = %request.directory,
            user_id = %request.user_id,
            "Flow inference started",
        );

        match panic::catch_unwind(AssertUnwindSafe(|| self.execute(&request))) {
            Ok(Ok(())) => {
                tracing::debug!(project_id = request.project_id, "Flow inference completed");
                true
            }
            Ok(Err(e)) => {
                tracing::error!(
                    project_id = request.project_id,
                    directory = %request.directory,
                    user_id = %request.user_id,
                    error = %e,
                    "Flow inference failed",
                );
                false
            }
            Err(unwind) => {
                tracing::error!(
                    project_id = request.project_id,
                    directory = %request.directory,
                    user_id = %request.user_id,
                    panic = %panic_message(&unwind),
                    "Flow inference panicked",
                );
                false
            }
        }
    }

    /// Acquire the thread's execution context and drive the analyzer.
    fn execute(&self, request: &FlowInferenceRequest) -> Result<(), DispatchError> {
        with_idle_context(|ctx| {
            ctx.run(self.analyzer.understand(
                request.project_id,
                &request.directory,
                &request.user_id,
            ))
        })?
        .map_err(DispatchError::Analysis)
    }
}

impl TaskHandler for Dispatcher {
    fn handle(&self, payload: &serde_json::Value) -> bool {
        self.dispatch(payload)
    }
}

/// Best-effort text from a panic payload.
fn panic_message(unwind: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = unwind.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = unwind.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
