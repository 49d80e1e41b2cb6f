use thiserror::Error;

/// Structural misuse of the public API.
///
/// Numerical hiccups (a seed that fails to converge, an undefined grid cell, a
/// rejected integration step) are absorbed locally and represented as data;
/// only malformed input surfaces as a hard error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("range is degenerate: expected min < max, got [{min}, {max}]")]
    DegenerateRange { min: f64, max: f64 },
    #[error("range bounds must be finite, got [{min}, {max}]")]
    NonFiniteRange { min: f64, max: f64 },
    #[error("need at least {min} samples, got {got}")]
    TooFewSamples { min: usize, got: usize },
    #[error("initial state contains a non-finite component")]
    NonFiniteState,
    #[error("time span is empty: both endpoints are {t}")]
    EmptyTimeSpan { t: f64 },
    #[error("field dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Validates an interval used as a search or sampling range.
pub(crate) fn check_range(min: f64, max: f64) -> Result<(), InputError> {
    if !min.is_finite() || !max.is_finite() {
        return Err(InputError::NonFiniteRange { min, max });
    }
    if min >= max {
        return Err(InputError::DegenerateRange { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_range, InputError};

    #[test]
    fn check_range_accepts_ordered_finite_bounds() {
        assert!(check_range(-5.0, 5.0).is_ok());
    }

    #[test]
    fn check_range_rejects_inverted_and_non_finite_bounds() {
        assert_eq!(
            check_range(2.0, -2.0),
            Err(InputError::DegenerateRange { min: 2.0, max: -2.0 })
        );
        assert!(matches!(
            check_range(f64::NAN, 1.0),
            Err(InputError::NonFiniteRange { .. })
        ));
        assert!(matches!(
            check_range(0.0, f64::INFINITY),
            Err(InputError::NonFiniteRange { .. })
        ));
    }
}
