//! Crate-wide error type.
use thiserror::Error;

/// Errors produced while building or running a [`crate::scheme::WdfScheme`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WdfError {
    /// Attempted to add an element whose key already exists in a [`crate::netlist::Netlist`].
    #[error("element key '{key}' already present in netlist")]
    DuplicateKey {
        /// The colliding key.
        key: String,
    },
    /// Attempted to get or remove an element by a key that isn't present.
    #[error("element key '{key}' not found in netlist")]
    MissingKey {
        /// The missing key.
        key: String,
    },
    /// The netlist is disconnected, or an element declares fewer than two terminal nodes.
    #[error("invalid netlist topology: {reason}")]
    InvalidTopology {
        /// Human-readable description of the topology problem.
        reason: String,
    },
    /// A dynamic (voltage source / trimmer) element was processed before its sample value
    /// was ever set.
    #[error("dynamic input '{key}' was processed before a sample value was set")]
    UndefinedDynamicInput {
        /// Key of the dynamic element.
        key: String,
    },
    /// The symbolic Thevenin solve for an R-adaptor failed.
    #[error("could not solve R-adaptor scattering matrix: {reason}")]
    RAdaptorSolveError {
        /// Human-readable description of why the solve failed.
        reason: String,
    },
    /// Sample rate is not a positive number.
    #[error("sample rate must be positive, got {samplerate}")]
    SampleRateError {
        /// The offending sample rate.
        samplerate: f64,
    },
    /// Requested output index is out of range of the declared outputs.
    #[error("output index {index} out of range (have {num_outputs} outputs)")]
    PortIndexError {
        /// The out-of-range index.
        index: usize,
        /// Number of declared outputs.
        num_outputs: usize,
    },
}
