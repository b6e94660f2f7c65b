// ABOUTME: Entry point for the claide-calculator static library.
// ABOUTME: Exposes C FFI functions for expression evaluation from Swift.

pub mod calculator;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod interrupt;
pub mod logging;
pub mod options;
pub mod registry;
pub mod sample;

pub use calculator::Calculator;
pub use error::{CalcError, ClaideCalcStatus};
pub use options::{CalculatorOptions, ClaideCalcOptions};
pub use registry::ClaideCalculatorId;
pub use sample::{ClaideCurvePoint, ClaideSamplePoint};

/// Returns the library version as a packed integer (major * 10000 + minor * 100 + patch).
#[no_mangle]
pub extern "C" fn claide_calculator_version() -> u32 {
    0 * 10000 + 1 * 100 + 0 // 0.1.0
}
