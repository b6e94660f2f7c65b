// ABOUTME: Samples an expression over a numeric range to produce plot series.
// ABOUTME: Exposes the points as a flat C-compatible array the caller frees.

use fend_core::Context;

use crate::error::CalcError;
use crate::handle::{self, CalculatorHandle};
use crate::interrupt::Deadline;
use crate::options::CalculatorOptions;

/// Upper bound on points per series.
pub const MAX_SAMPLE_STEPS: u32 = 10_000;

/// Prefix the engine puts in front of inexact results.
const APPROX_PREFIX: &str = "approx. ";

/// One sampled point. `defined` is false (and `y` NaN) where the expression
/// has no real numeric value.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaideSamplePoint {
    pub x: f64,
    pub y: f64,
    pub defined: bool,
}

/// One point of a parametric curve at parameter `t`. `defined` is false
/// unless both coordinates are real numbers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaideCurvePoint {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub defined: bool,
}

/// Flat parametric curve handed to C callers. Free with `free_curve`.
#[repr(C)]
pub struct ClaideCurveSeries {
    pub points: *mut ClaideCurvePoint,
    pub point_count: u32,
}

/// Flat series handed to C callers. Free with `free_series`.
#[repr(C)]
pub struct ClaideSampleSeries {
    pub points: *mut ClaideSamplePoint,
    pub point_count: u32,
}

/// Range and variable binding for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRequest<'a> {
    pub expression: &'a str,
    pub variable: &'a str,
    pub start: f64,
    pub end: f64,
    pub steps: u32,
}

impl SampleRequest<'_> {
    fn validate(&self) -> Result<(), CalcError> {
        if self.steps == 0 || self.steps > MAX_SAMPLE_STEPS {
            return Err(CalcError::InvalidArgument(format!(
                "steps must be between 1 and {}, got {}",
                MAX_SAMPLE_STEPS, self.steps
            )));
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(CalcError::InvalidArgument("range bounds must be finite".into()));
        }
        if !is_identifier(self.variable) {
            return Err(CalcError::InvalidArgument(format!(
                "`{}` is not a variable name",
                self.variable
            )));
        }
        Ok(())
    }

    /// Evenly spaced x values, both ends included. Interpolates without
    /// forming `end - start`, which overflows for huge finite bounds.
    fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        let last = self.steps.saturating_sub(1).max(1) as f64;
        (0..self.steps).map(move |i| {
            let t = i as f64 / last;
            self.start * (1.0 - t) + self.end * t
        })
    }
}

/// Evaluate `request.expression` at each x. Runs on a copy of the handle's
/// engine state, so the handle's own variables are untouched. The handle's
/// timeout bounds the whole series.
pub fn sample(
    handle: &CalculatorHandle,
    request: &SampleRequest<'_>,
) -> Result<Vec<ClaideSamplePoint>, CalcError> {
    request.validate()?;
    handle.check_length(request.expression)?;

    let options = handle.options();
    let deadline = Deadline::after(options.timeout);
    let base = handle.scratch_context();
    let mut points = Vec::with_capacity(request.steps as usize);

    for x in request.xs() {
        let mut context = base.clone();
        let y = bind(&mut context, request.variable, x, &deadline, &options)
            .and_then(|()| real_at(&mut context, request.expression, &deadline, &options))?;
        points.push(ClaideSamplePoint {
            x,
            y: y.unwrap_or(f64::NAN),
            defined: y.is_some(),
        });
    }

    tracing::debug!(points = points.len(), "sampled expression");
    Ok(points)
}

/// Evaluate a parametric curve `(x(t), y(t))`. `request.expression` gives the
/// x coordinate and `y_expression` the y coordinate; `request.variable` is the
/// parameter. Same state and timeout rules as `sample`.
pub fn sample_parametric(
    handle: &CalculatorHandle,
    request: &SampleRequest<'_>,
    y_expression: &str,
) -> Result<Vec<ClaideCurvePoint>, CalcError> {
    request.validate()?;
    handle.check_length(request.expression)?;
    handle.check_length(y_expression)?;

    let options = handle.options();
    let deadline = Deadline::after(options.timeout);
    let base = handle.scratch_context();
    let mut points = Vec::with_capacity(request.steps as usize);

    for t in request.xs() {
        let mut context = base.clone();
        bind(&mut context, request.variable, t, &deadline, &options)?;
        let x = real_at(&mut context, request.expression, &deadline, &options)?;
        let y = real_at(&mut context, y_expression, &deadline, &options)?;
        points.push(ClaideCurvePoint {
            t,
            x: x.unwrap_or(f64::NAN),
            y: y.unwrap_or(f64::NAN),
            defined: x.is_some() && y.is_some(),
        });
    }

    tracing::debug!(points = points.len(), "sampled parametric curve");
    Ok(points)
}

/// Assign `value` to `variable`. Only a timeout is an error.
fn bind(
    context: &mut Context,
    variable: &str,
    value: f64,
    deadline: &Deadline,
    options: &CalculatorOptions,
) -> Result<(), CalcError> {
    let binding = format!("{} = ({})", variable, value);
    match handle::evaluate_in(context, &binding, deadline, options) {
        Err(err @ CalcError::Timeout(_)) => Err(err),
        _ => Ok(()),
    }
}

/// Real value of `expression`, or `None` where it has none. Only a timeout is an error.
fn real_at(
    context: &mut Context,
    expression: &str,
    deadline: &Deadline,
    options: &CalculatorOptions,
) -> Result<Option<f64>, CalcError> {
    match handle::evaluate_in(context, expression, deadline, options) {
        Ok(text) => Ok(parse_real(&text)),
        Err(err @ CalcError::Timeout(_)) => Err(err),
        Err(_) => Ok(None),
    }
}

/// Hand a series over to C. The allocation is exact so `free_series` can rebuild it.
pub fn into_series(points: Vec<ClaideSamplePoint>) -> ClaideSampleSeries {
    let points = points.into_boxed_slice();
    let point_count = points.len() as u32;
    let points = Box::into_raw(points) as *mut ClaideSamplePoint;
    ClaideSampleSeries {
        points,
        point_count,
    }
}

/// Hand a parametric curve over to C.
pub fn into_curve(points: Vec<ClaideCurvePoint>) -> ClaideCurveSeries {
    let points = points.into_boxed_slice();
    let point_count = points.len() as u32;
    let points = Box::into_raw(points) as *mut ClaideCurvePoint;
    ClaideCurveSeries {
        points,
        point_count,
    }
}

/// Free a curve allocated by `into_curve`.
///
/// # Safety
/// `curve` must come from `Box::into_raw(Box::new(into_curve(..)))`, or be null.
pub unsafe fn free_curve(curve: *mut ClaideCurveSeries) {
    if curve.is_null() {
        return;
    }
    let curve = Box::from_raw(curve);
    if !curve.points.is_null() {
        let count = curve.point_count as usize;
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(curve.points, count)));
    }
}

/// Free a series allocated by `into_series`.
///
/// # Safety
/// `series` must come from `Box::into_raw(Box::new(into_series(..)))`, or be null.
pub unsafe fn free_series(series: *mut ClaideSampleSeries) {
    if series.is_null() {
        return;
    }
    let series = Box::from_raw(series);
    if !series.points.is_null() {
        let count = series.point_count as usize;
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(series.points, count)));
    }
}

/// Parse the engine's printed form of a plain real number.
fn parse_real(text: &str) -> Option<f64> {
    let text = text.trim();
    let text = text.strip_prefix(APPROX_PREFIX).unwrap_or(text);
    text.parse::<f64>().ok().filter(|y| y.is_finite())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn request(expression: &str, start: f64, end: f64, steps: u32) -> SampleRequest<'_> {
        SampleRequest {
            expression,
            variable: "x",
            start,
            end,
            steps,
        }
    }

    #[test]
    fn linear_expression_samples_exactly() {
        let handle = CalculatorHandle::default();
        let points = sample(&handle, &request("x * 2", 0.0, 4.0, 5)).unwrap();
        let pairs: Vec<_> = points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(
            pairs,
            vec![(0.0, 0.0), (1.0, 2.0), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0)]
        );
        assert!(points.iter().all(|p| p.defined));
    }

    #[test]
    fn single_step_samples_start_only() {
        let handle = CalculatorHandle::default();
        let points = sample(&handle, &request("x + 1", -3.0, 3.0, 1)).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].x, -3.0);
        assert_eq!(points[0].y, -2.0);
    }

    #[test]
    fn undefined_points_are_flagged() {
        let handle = CalculatorHandle::default();
        let points = sample(&handle, &request("1 / x", -1.0, 1.0, 3)).unwrap();
        assert_eq!(points[0].y, -1.0);
        assert!(!points[1].defined);
        assert!(points[1].y.is_nan());
        assert_eq!(points[2].y, 1.0);
    }

    #[test]
    fn sampling_leaves_handle_state_alone() {
        let mut handle = CalculatorHandle::default();
        handle.evaluate("x = 100").unwrap();
        sample(&handle, &request("x", 0.0, 1.0, 2)).unwrap();
        assert_eq!(handle.evaluate("x").unwrap(), "100");
    }

    #[test]
    fn rejects_bad_requests() {
        let handle = CalculatorHandle::default();
        assert!(matches!(
            sample(&handle, &request("x", 0.0, 1.0, 0)),
            Err(CalcError::InvalidArgument(_))
        ));
        assert!(matches!(
            sample(&handle, &request("x", f64::NAN, 1.0, 2)),
            Err(CalcError::InvalidArgument(_))
        ));
        assert!(matches!(
            sample(&handle, &request("x", 0.0, 1.0, MAX_SAMPLE_STEPS + 1)),
            Err(CalcError::InvalidArgument(_))
        ));
        let bad_var = SampleRequest {
            variable: "1x",
            ..request("x", 0.0, 1.0, 2)
        };
        assert!(matches!(sample(&handle, &bad_var), Err(CalcError::InvalidArgument(_))));
    }

    #[test]
    fn timeout_aborts_the_series() {
        let handle = CalculatorHandle::new(
            CalculatorOptions::default().with_timeout(std::time::Duration::ZERO),
        );
        assert_eq!(
            sample(&handle, &request("x", 0.0, 1.0, 2)),
            Err(CalcError::Timeout(0))
        );
    }

    #[test]
    fn huge_finite_bounds_interpolate() {
        let req = request("x", -1e308, 1e308, 3);
        let xs: Vec<_> = req.xs().collect();
        assert_eq!(xs, vec![-1e308, 0.0, 1e308]);
    }

    #[test]
    fn unit_circle_is_traced() {
        let handle = CalculatorHandle::default();
        let req = SampleRequest {
            variable: "theta",
            ..request("cos(theta)", 0.0, 2.0 * PI, 9)
        };
        let points = sample_parametric(&handle, &req, "sin(theta)").unwrap();
        assert_eq!(points.len(), 9);
        assert_eq!(points[0].t, 0.0);
        assert_eq!((points[0].x, points[0].y), (1.0, 0.0));
        for p in &points {
            assert!(p.defined, "undefined at t = {}", p.t);
            assert!((p.x * p.x + p.y * p.y - 1.0).abs() < 1e-6, "off circle at t = {}", p.t);
        }
        assert!((points[2].y - 1.0).abs() < 1e-6);
        assert!((points[4].x + 1.0).abs() < 1e-6);
    }

    #[test]
    fn curve_point_needs_both_coordinates() {
        let handle = CalculatorHandle::default();
        let req = request("x", -1.0, 1.0, 3);
        let points = sample_parametric(&handle, &req, "1 / x").unwrap();
        assert!(points[0].defined);
        assert_eq!(points[1].x, 0.0);
        assert!(points[1].y.is_nan());
        assert!(!points[1].defined);
        assert!(points[2].defined);
    }

    #[test]
    fn curve_round_trips_through_raw_parts() {
        let points = vec![ClaideCurvePoint { t: 0.0, x: 1.0, y: 0.0, defined: true }];
        let curve = Box::into_raw(Box::new(into_curve(points)));
        unsafe {
            assert_eq!((*curve).point_count, 1);
            assert_eq!((*(*curve).points).x, 1.0);
            free_curve(curve);
            free_curve(std::ptr::null_mut());
        }
    }

    #[test]
    fn parses_engine_number_formats() {
        assert_eq!(parse_real("4"), Some(4.0));
        assert_eq!(parse_real("-2.5"), Some(-2.5));
        assert_eq!(parse_real("approx. 0.8414709848"), Some(0.8414709848));
        assert_eq!(parse_real("5 kg"), None);
        assert_eq!(parse_real("inf"), None);
    }

    #[test]
    fn series_round_trips_through_raw_parts() {
        let points = vec![
            ClaideSamplePoint { x: 0.0, y: 1.0, defined: true },
            ClaideSamplePoint { x: 1.0, y: f64::NAN, defined: false },
        ];
        let series = Box::into_raw(Box::new(into_series(points)));
        unsafe {
            assert_eq!((*series).point_count, 2);
            assert_eq!((*(*series).points).y, 1.0);
            free_series(series);
            free_series(std::ptr::null_mut());
        }
    }
}
