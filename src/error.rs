use thiserror::Error;

/// Rejected input. Never retryable: the caller has to fix the value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidInputError {
    #[error("quality must be an integer between 0 and 5, got {0}")]
    QualityOutOfRange(i64),

    #[error("quality must be an integer between 0 and 5, got {0:?}")]
    QualityNotAnInteger(String),

    #[error("ease factor must be at least 1.3, got {0}")]
    EaseFactorTooLow(f64),

    #[error("interval must be between 1 and 365 days, got {0}")]
    IntervalOutOfRange(u32),

    #[error("tag {0:?} must not contain a comma")]
    TagSeparator(String),

    #[error("{field} must be between {min} and {max} characters, got {len}")]
    FieldLength {
        field: &'static str,
        min: usize,
        max: usize,
        len: usize,
    },
}
