use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Input rejected at the call boundary, before any computation runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("unsupported periods per year {0}; expected one of 1, 2, 4, 12")]
    UnsupportedCadence(u32),

    #[error("{param} must be finite, got {value}")]
    NonFinite { param: &'static str, value: f64 },

    #[error("{param} {message}, got {value}")]
    OutOfRange {
        param: &'static str,
        message: &'static str,
        value: f64,
    },

    #[error("projected {param} is not representable, got {value}")]
    Overflow { param: &'static str, value: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

pub(crate) fn require_finite(param: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::NonFinite { param, value })
    }
}

pub(crate) fn require_non_negative(param: &'static str, value: f64) -> Result<f64> {
    require_finite(param, value)?;
    if value < 0.0 {
        return Err(EngineError::OutOfRange {
            param,
            message: "must be >= 0",
            value,
        });
    }
    Ok(value)
}

/// Computed totals that ran past `f64` range.
pub(crate) fn require_representable(param: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::Overflow { param, value })
    }
}

/// Rates are decimal ratios; anything below -100% would flip the sign of a balance.
pub(crate) fn require_rate(param: &'static str, value: f64) -> Result<f64> {
    require_finite(param, value)?;
    if value < -1.0 {
        return Err(EngineError::OutOfRange {
            param,
            message: "must be >= -1 (-100%)",
            value,
        });
    }
    Ok(value)
}
