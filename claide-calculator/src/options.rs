// ABOUTME: Per-handle engine configuration, in Rust form and as a C-compatible struct.
// ABOUTME: Options are fixed when a handle is created.

use std::time::Duration;

/// Engine configuration passed across the FFI boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaideCalcOptions {
    /// Evaluation time limit in milliseconds. 0 disables it.
    pub timeout_ms: u32,
    /// Maximum expression length in bytes. 0 means unlimited.
    pub max_expression_len: u32,
    /// Evaluate against a copy of the engine state so assignments don't persist.
    pub isolated: bool,
}

impl Default for ClaideCalcOptions {
    fn default() -> Self {
        CalculatorOptions::default().into()
    }
}

/// Engine configuration used by `CalculatorHandle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalculatorOptions {
    pub timeout: Option<Duration>,
    pub max_expression_len: Option<usize>,
    pub isolated: bool,
}

impl CalculatorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_expression_len(mut self, max: usize) -> Self {
        self.max_expression_len = Some(max);
        self
    }

    pub fn isolated(mut self, isolated: bool) -> Self {
        self.isolated = isolated;
        self
    }

    /// Timeout in whole milliseconds, saturating at `u32::MAX`.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout
            .map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }
}

impl From<ClaideCalcOptions> for CalculatorOptions {
    fn from(raw: ClaideCalcOptions) -> Self {
        Self {
            timeout: (raw.timeout_ms > 0).then(|| Duration::from_millis(u64::from(raw.timeout_ms))),
            max_expression_len: (raw.max_expression_len > 0).then_some(raw.max_expression_len as usize),
            isolated: raw.isolated,
        }
    }
}

impl From<CalculatorOptions> for ClaideCalcOptions {
    fn from(opts: CalculatorOptions) -> Self {
        Self {
            timeout_ms: opts.timeout_ms(),
            max_expression_len: opts
                .max_expression_len
                .map(|m| u32::try_from(m).unwrap_or(u32::MAX))
                .unwrap_or(0),
            isolated: opts.isolated,
        }
    }
}
