// ABOUTME: C-compatible FFI functions callable from Swift via the bridging header.
// ABOUTME: Wraps registry-backed calculator handles behind integer IDs and C types.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use libc::size_t;

use crate::error::{CalcError, ClaideCalcStatus};
use crate::handle::CalculatorHandle;
use crate::logging;
use crate::options::{CalculatorOptions, ClaideCalcOptions};
use crate::registry::{global_registry, ClaideCalculatorId};
use crate::sample::{self, ClaideCurveSeries, ClaideSampleSeries, SampleRequest};

/// Run engine code without letting a panic unwind into the host.
fn guarded<T>(f: impl FnOnce() -> Result<T, CalcError>) -> Result<T, CalcError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!("calculator engine panicked");
        Err(CalcError::Evaluation("internal engine failure".into()))
    })
}

unsafe fn read_str<'a>(ptr: *const c_char, name: &'static str) -> Result<&'a str, CalcError> {
    if ptr.is_null() {
        return Err(CalcError::NullPointer(name));
    }
    CStr::from_ptr(ptr).to_str().map_err(|_| CalcError::InvalidUtf8)
}

unsafe fn write_status(out: *mut i32, status: ClaideCalcStatus) {
    if !out.is_null() {
        *out = status as i32;
    }
}

/// Evaluate on the handle, folding engine failures into printed text.
///
/// Returns the text plus `Ok`/`EvaluationFailed`; other errors are boundary failures.
unsafe fn evaluate_text(
    id: ClaideCalculatorId,
    expression: *const c_char,
) -> Result<(String, ClaideCalcStatus), CalcError> {
    let expression = read_str(expression, "expression")?;
    let outcome = guarded(|| global_registry().with_handle(id, |h| h.evaluate(expression))?);
    match outcome {
        Ok(text) => Ok((text, ClaideCalcStatus::Ok)),
        Err(err @ CalcError::Evaluation(_)) => Ok((err.render(), ClaideCalcStatus::EvaluationFailed)),
        Err(err) => Err(err),
    }
}

/// Default options: no timeout, no length limit, persistent engine state.
#[no_mangle]
pub extern "C" fn claide_calculator_default_options() -> ClaideCalcOptions {
    ClaideCalcOptions::default()
}

/// Create a calculator with default options. Never returns 0.
#[no_mangle]
pub extern "C" fn claide_calculator_create() -> ClaideCalculatorId {
    global_registry().insert(CalculatorHandle::new(CalculatorOptions::default()))
}

/// Create a calculator with explicit options. Returns 0 if `options` is null.
///
/// # Safety
/// `options` must point to a valid `ClaideCalcOptions`, or be null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_create_with_options(
    options: *const ClaideCalcOptions,
) -> ClaideCalculatorId {
    if options.is_null() {
        return 0;
    }
    let options = CalculatorOptions::from(*options);
    global_registry().insert(CalculatorHandle::new(options))
}

/// Evaluate an expression and return its printed result.
///
/// Engine failures (syntax errors, division by zero, ...) still return text,
/// of the form `error: <message>`, with status `EvaluationFailed`. Unknown or
/// busy handles, bad input and timeouts return NULL. The returned string is
/// owned by the caller and must be freed with `claide_calculator_string_free`.
///
/// # Safety
/// `expression` must be a valid null-terminated string. `status_out` must be
/// valid for writes, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_evaluate(
    id: ClaideCalculatorId,
    expression: *const c_char,
    status_out: *mut i32,
) -> *mut c_char {
    let (ptr, status) = match evaluate_text(id, expression) {
        Ok((text, status)) => match CString::new(text) {
            Ok(cstr) => (cstr.into_raw(), status),
            Err(_) => (std::ptr::null_mut(), ClaideCalcStatus::InteriorNul),
        },
        Err(err) => (std::ptr::null_mut(), err.status()),
    };
    write_status(status_out, status);
    ptr
}

/// Evaluate an expression into a caller-supplied buffer.
///
/// The bytes needed for the result, including the terminating NUL, are
/// written to `required_out` whenever a result was produced. If `buffer` is
/// null or `capacity` is smaller than that, nothing is written to `buffer`,
/// the engine state is left as it was and `BufferTooSmall` is returned; retry
/// with a larger buffer.
///
/// # Safety
/// `expression` must be a valid null-terminated string. `buffer` must be
/// valid for `capacity` bytes of writes, or null. `required_out` must be
/// valid for writes, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_evaluate_into(
    id: ClaideCalculatorId,
    expression: *const c_char,
    buffer: *mut c_char,
    capacity: size_t,
    required_out: *mut size_t,
) -> i32 {
    let expression = match read_str(expression, "expression") {
        Ok(expression) => expression,
        Err(err) => return err.status() as i32,
    };
    let outcome = guarded(|| {
        global_registry().with_handle(id, |h| {
            let staged = h.stage(expression);
            let (text, status) = match &staged.result {
                Ok(text) => (text.clone(), ClaideCalcStatus::Ok),
                Err(err @ CalcError::Evaluation(_)) => (err.render(), ClaideCalcStatus::EvaluationFailed),
                Err(err) => return Err(err.clone()),
            };
            if text.as_bytes().contains(&0) {
                return Err(CalcError::InteriorNul);
            }
            let required = text.len() + 1;
            if !required_out.is_null() {
                *required_out = required;
            }
            if buffer.is_null() || capacity < required {
                return Err(CalcError::BufferTooSmall { required });
            }
            std::ptr::copy_nonoverlapping(text.as_ptr(), buffer as *mut u8, text.len());
            *buffer.add(text.len()) = 0;
            h.commit(staged);
            Ok(status)
        })?
    });
    match outcome {
        Ok(status) => status as i32,
        Err(err) => err.status() as i32,
    }
}

/// Free a string returned by `claide_calculator_evaluate`.
///
/// # Safety
/// `ptr` must be a pointer returned by `claide_calculator_evaluate`, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Discard variables and other engine state, keeping the handle's options.
#[no_mangle]
pub extern "C" fn claide_calculator_reset(id: ClaideCalculatorId) -> i32 {
    match global_registry().with_handle(id, CalculatorHandle::reset) {
        Ok(()) => {
            tracing::debug!(id, "calculator handle reset");
            ClaideCalcStatus::Ok as i32
        }
        Err(err) => err.status() as i32,
    }
}

/// Destroy a calculator. Reports `InvalidHandle` for unknown or already
/// destroyed IDs and `HandleInUse` while another thread is evaluating on it.
#[no_mangle]
pub extern "C" fn claide_calculator_destroy(id: ClaideCalculatorId) -> i32 {
    match global_registry().remove(id) {
        Ok(()) => ClaideCalcStatus::Ok as i32,
        Err(err) => err.status() as i32,
    }
}

/// Whether `id` refers to a live calculator.
#[no_mangle]
pub extern "C" fn claide_calculator_is_live(id: ClaideCalculatorId) -> bool {
    global_registry().contains(id)
}

/// Number of live calculators in the process.
#[no_mangle]
pub extern "C" fn claide_calculator_live_count() -> u32 {
    u32::try_from(global_registry().len()).unwrap_or(u32::MAX)
}

/// Sample `expression` with `variable` bound to `steps` evenly spaced values
/// from `start` to `end` inclusive. Points where the expression has no real
/// value are marked undefined.
///
/// The returned series must be freed with `claide_calculator_sample_free`.
/// Returns NULL on failure, with the reason in `status_out`.
///
/// # Safety
/// `expression` and `variable` must be valid null-terminated strings.
/// `status_out` must be valid for writes, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_sample(
    id: ClaideCalculatorId,
    expression: *const c_char,
    variable: *const c_char,
    start: f64,
    end: f64,
    steps: u32,
    status_out: *mut i32,
) -> *mut ClaideSampleSeries {
    let outcome = (|| {
        let request = SampleRequest {
            expression: read_str(expression, "expression")?,
            variable: read_str(variable, "variable")?,
            start,
            end,
            steps,
        };
        guarded(|| global_registry().with_handle(id, |h| sample::sample(h, &request))?)
    })();
    match outcome {
        Ok(points) => {
            write_status(status_out, ClaideCalcStatus::Ok);
            Box::into_raw(Box::new(sample::into_series(points)))
        }
        Err(err) => {
            write_status(status_out, err.status());
            std::ptr::null_mut()
        }
    }
}

/// Free a series returned by `claide_calculator_sample`.
///
/// # Safety
/// `series` must be a pointer returned by `claide_calculator_sample`, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_sample_free(series: *mut ClaideSampleSeries) {
    sample::free_series(series);
}

/// Sample a parametric curve: `variable` runs over `steps` evenly spaced
/// values from `start` to `end` inclusive, and each point is
/// `(x_expression, y_expression)` at that value. A point is defined only if
/// both coordinates are real.
///
/// The returned curve must be freed with `claide_calculator_curve_free`.
/// Returns NULL on failure, with the reason in `status_out`.
///
/// # Safety
/// `x_expression`, `y_expression` and `variable` must be valid
/// null-terminated strings. `status_out` must be valid for writes, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_sample_parametric(
    id: ClaideCalculatorId,
    x_expression: *const c_char,
    y_expression: *const c_char,
    variable: *const c_char,
    start: f64,
    end: f64,
    steps: u32,
    status_out: *mut i32,
) -> *mut ClaideCurveSeries {
    let outcome = (|| {
        let request = SampleRequest {
            expression: read_str(x_expression, "x_expression")?,
            variable: read_str(variable, "variable")?,
            start,
            end,
            steps,
        };
        let y_expression = read_str(y_expression, "y_expression")?;
        guarded(|| {
            global_registry().with_handle(id, |h| sample::sample_parametric(h, &request, y_expression))?
        })
    })();
    match outcome {
        Ok(points) => {
            write_status(status_out, ClaideCalcStatus::Ok);
            Box::into_raw(Box::new(sample::into_curve(points)))
        }
        Err(err) => {
            write_status(status_out, err.status());
            std::ptr::null_mut()
        }
    }
}

/// Free a curve returned by `claide_calculator_sample_parametric`.
///
/// # Safety
/// `curve` must be a pointer returned by `claide_calculator_sample_parametric`, or null.
#[no_mangle]
pub unsafe extern "C" fn claide_calculator_curve_free(curve: *mut ClaideCurveSeries) {
    sample::free_curve(curve);
}

/// Static description of a status code. Never NULL; do not free.
#[no_mangle]
pub extern "C" fn claide_calculator_status_message(status: i32) -> *const c_char {
    match ClaideCalcStatus::from_raw(status) {
        Some(status) => status.message().as_ptr(),
        None => c"unknown status".as_ptr(),
    }
}

/// Version string of the wrapped calculator engine. Do not free.
#[no_mangle]
pub extern "C" fn claide_calculator_engine_version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();
    VERSION
        .get_or_init(|| CString::new(fend_core::get_version()).unwrap_or_default())
        .as_ptr()
}

/// Install a stderr log subscriber filtered by `CLAIDE_CALCULATOR_LOG`.
/// Returns false if the process already has one.
#[no_mangle]
pub extern "C" fn claide_calculator_init_logging() -> bool {
    logging::init()
}
