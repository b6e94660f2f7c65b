// ABOUTME: Safe Rust wrapper owning one registered calculator handle.
// ABOUTME: Destroys the handle when dropped.

use crate::error::CalcError;
use crate::handle::CalculatorHandle;
use crate::options::CalculatorOptions;
use crate::registry::{global_registry, ClaideCalculatorId};
use crate::sample::{self, ClaideCurvePoint, ClaideSamplePoint, SampleRequest};

/// A calculator engine registered in the process-wide registry.
pub struct Calculator {
    id: ClaideCalculatorId,
}

impl Calculator {
    pub fn new() -> Self {
        Self::with_options(CalculatorOptions::default())
    }

    pub fn with_options(options: CalculatorOptions) -> Self {
        Self {
            id: global_registry().insert(CalculatorHandle::new(options)),
        }
    }

    /// ID usable with the C API while this value is alive.
    pub fn id(&self) -> ClaideCalculatorId {
        self.id
    }

    pub fn evaluate(&self, expression: &str) -> Result<String, CalcError> {
        global_registry().with_handle(self.id, |h| h.evaluate(expression))?
    }

    pub fn reset(&self) -> Result<(), CalcError> {
        global_registry().with_handle(self.id, CalculatorHandle::reset)
    }

    /// Sample `expression` with `variable` bound to `steps` points in `[start, end]`.
    pub fn sample(
        &self,
        expression: &str,
        variable: &str,
        start: f64,
        end: f64,
        steps: u32,
    ) -> Result<Vec<ClaideSamplePoint>, CalcError> {
        let request = SampleRequest {
            expression,
            variable,
            start,
            end,
            steps,
        };
        global_registry().with_handle(self.id, |h| sample::sample(h, &request))?
    }

    /// Sample the parametric curve `(x_expression, y_expression)` with
    /// `variable` running over `steps` points in `[start, end]`.
    pub fn sample_parametric(
        &self,
        x_expression: &str,
        y_expression: &str,
        variable: &str,
        start: f64,
        end: f64,
        steps: u32,
    ) -> Result<Vec<ClaideCurvePoint>, CalcError> {
        let request = SampleRequest {
            expression: x_expression,
            variable,
            start,
            end,
            steps,
        };
        global_registry().with_handle(self.id, |h| sample::sample_parametric(h, &request, y_expression))?
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Calculator {
    fn drop(&mut self) {
        if let Err(err) = global_registry().remove(self.id) {
            tracing::warn!(id = self.id, %err, "failed to destroy calculator");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_and_cleans_up() {
        let id = {
            let calc = Calculator::new();
            assert_eq!(calc.evaluate("2+2").unwrap(), "4");
            assert!(global_registry().contains(calc.id()));
            calc.id()
        };
        assert!(!global_registry().contains(id));
    }

    #[test]
    fn engine_errors_surface_as_evaluation_errors() {
        let calc = Calculator::new();
        assert!(matches!(calc.evaluate("1/0"), Err(CalcError::Evaluation(_))));
    }

    #[test]
    fn reset_goes_through_the_registry() {
        let calc = Calculator::new();
        calc.evaluate("foo = 2").unwrap();
        calc.reset().unwrap();
        assert!(calc.evaluate("foo").is_err());
    }

    #[test]
    fn samples_through_the_registry() {
        let calc = Calculator::new();
        let points = calc.sample("x + 1", "x", 0.0, 2.0, 3).unwrap();
        let ys: Vec<_> = points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn parametric_curve_through_the_registry() {
        let calc = Calculator::new();
        let points = calc
            .sample_parametric("cos(theta)", "sin(theta)", "theta", 0.0, 2.0 * std::f64::consts::PI, 5)
            .unwrap();
        assert_eq!(points.len(), 5);
        assert!(points
            .iter()
            .all(|p| p.defined && (p.x * p.x + p.y * p.y - 1.0).abs() < 1e-6));
    }

    #[test]
    fn calculators_are_independent() {
        let a = Calculator::new();
        let b = Calculator::new();
        a.evaluate("foo = 9").unwrap();
        assert_eq!(a.evaluate("foo").unwrap(), "9");
        assert!(b.evaluate("foo").is_err());
    }
}
