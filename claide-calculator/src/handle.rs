// ABOUTME: Owns one calculator engine instance and the options it was created with.
// ABOUTME: Forwards expressions to the engine and turns its output into printed text.

use std::time::Instant;

use fend_core::Context;

use crate::error::CalcError;
use crate::interrupt::Deadline;
use crate::options::CalculatorOptions;

/// One engine instance. Variables assigned by earlier evaluations live in
/// `context` unless the handle is isolated.
pub struct CalculatorHandle {
    context: Context,
    options: CalculatorOptions,
}

impl CalculatorHandle {
    pub fn new(options: CalculatorOptions) -> Self {
        Self {
            context: Context::new(),
            options,
        }
    }

    pub fn options(&self) -> CalculatorOptions {
        self.options
    }

    /// Evaluate an expression and return the engine's canonical printed result.
    pub fn evaluate(&mut self, expression: &str) -> Result<String, CalcError> {
        self.check_length(expression)?;
        let deadline = Deadline::after(self.options.timeout);
        if self.options.isolated {
            let mut scratch = self.context.clone();
            evaluate_in(&mut scratch, expression, &deadline, &self.options)
        } else {
            evaluate_in(&mut self.context, expression, &deadline, &self.options)
        }
    }

    /// Evaluate on a copy of the engine state. Nothing changes on the handle
    /// until the result is passed to `commit`.
    pub fn stage(&self, expression: &str) -> Staged {
        let mut context = self.context.clone();
        let result = self.check_length(expression).and_then(|()| {
            let deadline = Deadline::after(self.options.timeout);
            evaluate_in(&mut context, expression, &deadline, &self.options)
        });
        let context = (result.is_ok() && !self.options.isolated).then_some(context);
        Staged { result, context }
    }

    /// Keep the engine state produced by a staged evaluation.
    pub fn commit(&mut self, staged: Staged) {
        if let Some(context) = staged.context {
            self.context = context;
        }
    }

    /// Drop all engine state, keeping the options.
    pub fn reset(&mut self) {
        self.context = Context::new();
    }

    /// Copy of the engine state for evaluations that must not touch the handle.
    pub(crate) fn scratch_context(&self) -> Context {
        self.context.clone()
    }

    pub(crate) fn check_length(&self, expression: &str) -> Result<(), CalcError> {
        match self.options.max_expression_len {
            Some(max) if expression.len() > max => Err(CalcError::ExpressionTooLong {
                len: expression.len(),
                max,
            }),
            _ => Ok(()),
        }
    }
}

/// Outcome of `CalculatorHandle::stage`, holding the engine state to commit.
pub struct Staged {
    pub result: Result<String, CalcError>,
    context: Option<Context>,
}

impl Default for CalculatorHandle {
    fn default() -> Self {
        Self::new(CalculatorOptions::default())
    }
}

/// Run one expression against `context`, mapping engine failures to `CalcError`.
pub(crate) fn evaluate_in(
    context: &mut Context,
    expression: &str,
    deadline: &Deadline,
    options: &CalculatorOptions,
) -> Result<String, CalcError> {
    if deadline.expired() {
        return Err(CalcError::Timeout(options.timeout_ms()));
    }
    let started = Instant::now();
    let outcome = fend_core::evaluate_with_interrupt(expression, context, deadline);
    tracing::trace!(
        len = expression.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        ok = outcome.is_ok(),
        "evaluated expression"
    );
    match outcome {
        Ok(result) => Ok(result.get_main_result().to_string()),
        Err(_) if deadline.expired() => Err(CalcError::Timeout(options.timeout_ms())),
        Err(message) => Err(CalcError::Evaluation(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_simple_arithmetic() {
        let mut handle = CalculatorHandle::default();
        assert_eq!(handle.evaluate("2+2").unwrap(), "4");
    }

    #[test]
    fn division_by_zero_is_an_engine_error() {
        let mut handle = CalculatorHandle::default();
        let err = handle.evaluate("1/0").unwrap_err();
        assert!(matches!(err, CalcError::Evaluation(_)), "got {:?}", err);
    }

    #[test]
    fn repeated_evaluation_is_stable() {
        let mut handle = CalculatorHandle::default();
        let first = handle.evaluate("7 * 6").unwrap();
        let second = handle.evaluate("7 * 6").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "42");
    }

    #[test]
    fn assignments_persist_by_default() {
        let mut handle = CalculatorHandle::default();
        handle.evaluate("foo = 5").unwrap();
        assert_eq!(handle.evaluate("foo * 2").unwrap(), "10");
    }

    #[test]
    fn isolated_handle_forgets_assignments() {
        let mut handle = CalculatorHandle::new(CalculatorOptions::default().isolated(true));
        handle.evaluate("foo = 5").unwrap();
        assert!(handle.evaluate("foo * 2").is_err());
    }

    #[test]
    fn reset_clears_assignments() {
        let mut handle = CalculatorHandle::default();
        handle.evaluate("foo = 5").unwrap();
        handle.reset();
        assert!(handle.evaluate("foo * 2").is_err());
    }

    #[test]
    fn length_limit_is_enforced_before_evaluation() {
        let mut handle = CalculatorHandle::new(CalculatorOptions::default().with_max_expression_len(3));
        assert_eq!(handle.evaluate("1+1").unwrap(), "2");
        assert_eq!(
            handle.evaluate("1 + 1").unwrap_err(),
            CalcError::ExpressionTooLong { len: 5, max: 3 }
        );
    }

    #[test]
    fn staged_evaluation_applies_only_on_commit() {
        let mut handle = CalculatorHandle::default();
        handle.evaluate("counter = 1").unwrap();

        let dropped = handle.stage("counter = counter + 1");
        assert_eq!(dropped.result, Ok("2".to_string()));
        assert_eq!(handle.evaluate("counter").unwrap(), "1");

        let kept = handle.stage("counter = counter + 1");
        assert_eq!(kept.result, Ok("2".to_string()));
        handle.commit(kept);
        assert_eq!(handle.evaluate("counter").unwrap(), "2");
    }

    #[test]
    fn isolated_commit_keeps_state_unchanged() {
        let mut handle = CalculatorHandle::new(CalculatorOptions::default().isolated(true));
        let staged = handle.stage("foo = 1");
        handle.commit(staged);
        assert!(handle.evaluate("foo").is_err());
    }

    #[test]
    fn slow_evaluation_is_interrupted() {
        let mut handle = CalculatorHandle::new(
            CalculatorOptions::default().with_timeout(std::time::Duration::from_millis(50)),
        );
        let started = Instant::now();
        assert_eq!(handle.evaluate("3^(2^22)"), Err(CalcError::Timeout(50)));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        // The handle stays usable after an interrupted evaluation.
        assert_eq!(handle.evaluate("2+2").unwrap(), "4");
    }

    #[test]
    fn expired_deadline_reports_timeout() {
        let mut context = Context::new();
        let options = CalculatorOptions::default().with_timeout(std::time::Duration::ZERO);
        let deadline = Deadline::after(options.timeout);
        let err = evaluate_in(&mut context, "2^1000", &deadline, &options).unwrap_err();
        assert_eq!(err, CalcError::Timeout(0));
    }
}
