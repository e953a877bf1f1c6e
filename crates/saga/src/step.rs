//! Generic saga step runner.

use futures_util::future::BoxFuture;

use crate::SagaError;

/// A saga action: an async closure over state captured at build time.
pub type StepFn = Box<dyn Fn() -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync>;

/// A single step in a saga: a forward action and an optional
/// compensating action invoked if a later step fails.
pub struct SagaStep {
    name: &'static str,
    execute: StepFn,
    compensate: Option<StepFn>,
}

impl SagaStep {
    /// Creates a step with a forward action and no compensation.
    pub fn new<F>(name: &'static str, execute: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync + 'static,
    {
        Self {
            name,
            execute: Box::new(execute),
            compensate: None,
        }
    }

    /// Attaches a compensating action to the step.
    pub fn with_compensation<F>(mut self, compensate: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<(), SagaError>> + Send + Sync + 'static,
    {
        self.compensate = Some(Box::new(compensate));
        self
    }

    /// Returns the step name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Orchestrates an ordered sequence of steps with compensating actions
/// on failure.
///
/// Steps run strictly in order. When step *k* fails, the compensations
/// of steps *k−1 … 0* run in reverse; a compensation that itself fails
/// is logged and the walk continues. The original failure is returned
/// wrapped with the saga and step identity.
///
/// Dropping the future returned by [`Saga::execute`] cancels the
/// in-flight step without running any compensation: cancellation is
/// indeterminate, and operators reconcile from the persisted state and
/// the gateway's own ledger.
pub struct Saga {
    name: &'static str,
    steps: Vec<SagaStep>,
}

impl Saga {
    /// Creates a new saga with the given name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Appends a step to the saga.
    pub fn add_step(&mut self, step: SagaStep) {
        self.steps.push(step);
    }

    /// Returns the saga name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs all steps in order, compensating executed steps in reverse
    /// order on failure.
    pub async fn execute(&self) -> Result<(), SagaError> {
        metrics::counter!("saga_executions_total").increment(1);
        let started = std::time::Instant::now();
        tracing::info!(saga = self.name, "saga started");

        let mut executed: Vec<&SagaStep> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            tracing::info!(saga = self.name, step = step.name, "executing saga step");

            if let Err(err) = (step.execute)().await {
                tracing::error!(
                    saga = self.name,
                    step = step.name,
                    error = %err,
                    "saga step failed, starting compensation"
                );

                for done in executed.iter().rev() {
                    let Some(compensate) = &done.compensate else {
                        continue;
                    };
                    tracing::info!(saga = self.name, step = done.name, "compensating saga step");
                    if let Err(comp_err) = compensate().await {
                        tracing::error!(
                            saga = self.name,
                            step = done.name,
                            error = %comp_err,
                            "compensation failed"
                        );
                    }
                }

                metrics::counter!("saga_failed").increment(1);
                metrics::histogram!("saga_duration_seconds")
                    .record(started.elapsed().as_secs_f64());

                return Err(SagaError::StepFailed {
                    saga: self.name,
                    step: step.name,
                    source: Box::new(err),
                });
            }

            executed.push(step);
        }

        metrics::counter!("saga_completed").increment(1);
        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::info!(saga = self.name, "saga completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn recording_step(name: &'static str, trace: &Trace, fail: bool) -> SagaStep {
        let exec_trace = Arc::clone(trace);
        let comp_trace = Arc::clone(trace);

        SagaStep::new(name, move || {
            let trace = Arc::clone(&exec_trace);
            Box::pin(async move {
                trace.lock().unwrap().push(format!("exec:{name}"));
                if fail {
                    return Err(SagaError::Internal("step failure".to_string()));
                }
                Ok(())
            })
        })
        .with_compensation(move || {
            let trace = Arc::clone(&comp_trace);
            Box::pin(async move {
                trace.lock().unwrap().push(format!("comp:{name}"));
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn executes_steps_in_order() {
        let trace: Trace = Arc::default();
        let mut saga = Saga::new("test");
        saga.add_step(recording_step("a", &trace, false));
        saga.add_step(recording_step("b", &trace, false));
        saga.add_step(recording_step("c", &trace, false));

        saga.execute().await.unwrap();

        assert_eq!(*trace.lock().unwrap(), ["exec:a", "exec:b", "exec:c"]);
    }

    #[tokio::test]
    async fn compensates_executed_steps_in_reverse_order() {
        let trace: Trace = Arc::default();
        let mut saga = Saga::new("test");
        saga.add_step(recording_step("a", &trace, false));
        saga.add_step(recording_step("b", &trace, false));
        saga.add_step(recording_step("c", &trace, true));
        saga.add_step(recording_step("d", &trace, false));

        let err = saga.execute().await.unwrap_err();

        assert!(matches!(
            err,
            SagaError::StepFailed {
                saga: "test",
                step: "c",
                ..
            }
        ));
        assert_eq!(
            *trace.lock().unwrap(),
            ["exec:a", "exec:b", "exec:c", "comp:b", "comp:a"]
        );
    }

    #[tokio::test]
    async fn first_step_failure_compensates_nothing() {
        let trace: Trace = Arc::default();
        let mut saga = Saga::new("test");
        saga.add_step(recording_step("a", &trace, true));
        saga.add_step(recording_step("b", &trace, false));

        let err = saga.execute().await.unwrap_err();

        assert!(matches!(err, SagaError::StepFailed { step: "a", .. }));
        assert_eq!(*trace.lock().unwrap(), ["exec:a"]);
    }

    #[tokio::test]
    async fn steps_without_compensation_are_skipped_in_reverse_walk() {
        let trace: Trace = Arc::default();
        let log = Arc::clone(&trace);

        let mut saga = Saga::new("test");
        saga.add_step(SagaStep::new("fire_and_forget", move || {
            let trace = Arc::clone(&log);
            Box::pin(async move {
                trace.lock().unwrap().push("exec:fire_and_forget".to_string());
                Ok(())
            })
        }));
        saga.add_step(recording_step("b", &trace, true));

        saga.execute().await.unwrap_err();

        assert_eq!(*trace.lock().unwrap(), ["exec:fire_and_forget", "exec:b"]);
    }

    #[tokio::test]
    async fn compensation_failure_does_not_abort_reverse_walk() {
        let trace: Trace = Arc::default();

        let failing_comp_trace = Arc::clone(&trace);
        let failing_comp_exec = Arc::clone(&trace);
        let failing_comp = SagaStep::new("b", move || {
            let trace = Arc::clone(&failing_comp_exec);
            Box::pin(async move {
                trace.lock().unwrap().push("exec:b".to_string());
                Ok(())
            })
        })
        .with_compensation(move || {
            let trace = Arc::clone(&failing_comp_trace);
            Box::pin(async move {
                trace.lock().unwrap().push("comp:b".to_string());
                Err(SagaError::Internal("compensation failure".to_string()))
            })
        });

        let mut saga = Saga::new("test");
        saga.add_step(recording_step("a", &trace, false));
        saga.add_step(failing_comp);
        saga.add_step(recording_step("c", &trace, true));

        let err = saga.execute().await.unwrap_err();

        // The original step error survives, and the walk reached "a"
        // despite "b"'s compensation failing.
        assert!(matches!(err, SagaError::StepFailed { step: "c", .. }));
        assert_eq!(
            *trace.lock().unwrap(),
            ["exec:a", "exec:b", "exec:c", "comp:b", "comp:a"]
        );
    }

    #[tokio::test]
    async fn wrapped_error_preserves_root_cause() {
        let mut saga = Saga::new("outer");
        saga.add_step(SagaStep::new("inner", || {
            Box::pin(async { Err(SagaError::Internal("boom".to_string())) })
        }));

        let err = saga.execute().await.unwrap_err();
        assert!(matches!(err.root_cause(), SagaError::Internal(msg) if msg == "boom"));
        assert_eq!(
            err.to_string(),
            "saga 'outer' failed at step 'inner': internal saga error: boom"
        );
    }
}
