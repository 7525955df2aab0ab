use thiserror::Error;

/// Failures raised by the limiter.
///
/// A rejected admission is not an error: `try_enter` resolves to `false`.
/// Everything here is either a usage-contract violation (a bug in the caller)
/// or bad configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("on_exit called without a matching successful admission")]
    UnbalancedExit,

    #[error("latch result already consumed for this wait cycle")]
    LatchConsumed,

    #[error("latch already holds an unconsumed result")]
    LatchAlreadyCompleted,

    #[error("invalid option '{field}': {reason}")]
    InvalidOptions { field: &'static str, reason: String },

    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, AdmissionError>;
