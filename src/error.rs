//! Error type shared by all configuration APIs.
//!
//! Errors are only produced while the renderer is being (re)configured:
//! adding or removing audio elements, loading HRIR assets, updating object
//! positions. The `process` call itself never returns recoverable errors —
//! shape mismatches there are programmer bugs and panic deterministically.

use thiserror::Error;

/// Errors raised by configuration APIs.
#[derive(Debug, Clone, Error)]
pub enum ObrError {
    /// Element kind mismatch, unknown type, or malformed object metadata.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported sample-rate pair, non-16-bit WAV, or a WAV channel
    /// count that does not match the element order.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The input channel budget would be exceeded.
    #[error("exhausted: {0}")]
    Exhausted(String),

    /// An HRIR asset key could not be resolved.
    #[error("missing asset: {0}")]
    Missing(String),

    /// An operation was invoked in a state that forbids it.
    #[error("failed precondition: {0}")]
    Precondition(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ObrError::Missing("7OA_L".to_string());
        assert!(err.to_string().contains("7OA_L"));
        assert!(err.to_string().contains("missing"));

        let err = ObrError::Exhausted("too many channels".to_string());
        assert!(err.to_string().contains("too many channels"));
    }
}
