// ABOUTME: Error type for calculator operations and its C status code mapping.
// ABOUTME: Every failure that can cross the FFI boundary has a stable numeric status.

use std::ffi::CStr;

/// Errors raised by calculator handles and the registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    /// The engine rejected the expression (syntax error, division by zero, ...).
    #[error("{0}")]
    Evaluation(String),

    #[error("calculator handle {0} is not live")]
    InvalidHandle(u64),

    #[error("calculator handle {0} is busy on another thread")]
    HandleInUse(u64),

    #[error("null pointer passed for `{0}`")]
    NullPointer(&'static str),

    #[error("expression is not valid UTF-8")]
    InvalidUtf8,

    #[error("expression is {len} bytes, limit is {max}")]
    ExpressionTooLong { len: usize, max: usize },

    #[error("evaluation exceeded {0} ms")]
    Timeout(u32),

    /// `required` includes the terminating NUL.
    #[error("output buffer too small, {required} bytes required")]
    BufferTooSmall { required: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("result contains an interior NUL byte")]
    InteriorNul,
}

impl CalcError {
    pub fn status(&self) -> ClaideCalcStatus {
        match self {
            CalcError::Evaluation(_) => ClaideCalcStatus::EvaluationFailed,
            CalcError::InvalidHandle(_) => ClaideCalcStatus::InvalidHandle,
            CalcError::HandleInUse(_) => ClaideCalcStatus::HandleInUse,
            CalcError::NullPointer(_) => ClaideCalcStatus::NullPointer,
            CalcError::InvalidUtf8 => ClaideCalcStatus::InvalidUtf8,
            CalcError::ExpressionTooLong { .. } => ClaideCalcStatus::ExpressionTooLong,
            CalcError::Timeout(_) => ClaideCalcStatus::Timeout,
            CalcError::BufferTooSmall { .. } => ClaideCalcStatus::BufferTooSmall,
            CalcError::InvalidArgument(_) => ClaideCalcStatus::InvalidArgument,
            CalcError::InteriorNul => ClaideCalcStatus::InteriorNul,
        }
    }

    /// Text shown to the caller in place of a result when the engine fails.
    pub fn render(&self) -> String {
        format!("error: {}", self)
    }
}

/// Status codes returned across the C boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaideCalcStatus {
    Ok = 0,
    EvaluationFailed = 1,
    InvalidHandle = 2,
    HandleInUse = 3,
    NullPointer = 4,
    InvalidUtf8 = 5,
    ExpressionTooLong = 6,
    Timeout = 7,
    BufferTooSmall = 8,
    InvalidArgument = 9,
    InteriorNul = 10,
}

impl ClaideCalcStatus {
    /// Map a raw status back to the enum. Unknown values yield `None`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        let status = match raw {
            0 => Self::Ok,
            1 => Self::EvaluationFailed,
            2 => Self::InvalidHandle,
            3 => Self::HandleInUse,
            4 => Self::NullPointer,
            5 => Self::InvalidUtf8,
            6 => Self::ExpressionTooLong,
            7 => Self::Timeout,
            8 => Self::BufferTooSmall,
            9 => Self::InvalidArgument,
            10 => Self::InteriorNul,
            _ => return None,
        };
        Some(status)
    }

    /// Static, NUL-terminated description for hosts.
    pub fn message(self) -> &'static CStr {
        match self {
            Self::Ok => c"ok",
            Self::EvaluationFailed => c"the engine could not evaluate the expression",
            Self::InvalidHandle => c"unknown or destroyed calculator handle",
            Self::HandleInUse => c"calculator handle is in use on another thread",
            Self::NullPointer => c"required pointer argument was null",
            Self::InvalidUtf8 => c"expression is not valid UTF-8",
            Self::ExpressionTooLong => c"expression exceeds the configured length limit",
            Self::Timeout => c"evaluation exceeded the configured time limit",
            Self::BufferTooSmall => c"output buffer is too small",
            Self::InvalidArgument => c"invalid argument",
            Self::InteriorNul => c"result contains an interior NUL byte",
        }
    }
}

impl From<&CalcError> for ClaideCalcStatus {
    fn from(err: &CalcError) -> Self {
        err.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_raw() {
        for raw in 0..=10 {
            let status = ClaideCalcStatus::from_raw(raw).unwrap();
            assert_eq!(status as i32, raw);
        }
        assert_eq!(ClaideCalcStatus::from_raw(11), None);
        assert_eq!(ClaideCalcStatus::from_raw(-1), None);
    }

    #[test]
    fn engine_errors_render_with_prefix() {
        let err = CalcError::Evaluation("division by zero".into());
        assert_eq!(err.render(), "error: division by zero");
        assert_eq!(err.status(), ClaideCalcStatus::EvaluationFailed);
    }

    #[test]
    fn boundary_errors_map_to_distinct_statuses() {
        assert_eq!(CalcError::InvalidHandle(7).status(), ClaideCalcStatus::InvalidHandle);
        assert_eq!(CalcError::HandleInUse(7).status(), ClaideCalcStatus::HandleInUse);
        assert_eq!(
            CalcError::BufferTooSmall { required: 3 }.status(),
            ClaideCalcStatus::BufferTooSmall
        );
        assert_eq!(CalcError::InvalidHandle(7).to_string(), "calculator handle 7 is not live");
    }

    #[test]
    fn every_status_has_a_message() {
        for raw in 0..=10 {
            let status = ClaideCalcStatus::from_raw(raw).unwrap();
            assert!(!status.message().to_bytes().is_empty());
        }
    }
}
