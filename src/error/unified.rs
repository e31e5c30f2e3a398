//! Error classification.

/// Broad error category, logged alongside orchestrator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A channel could not be opened or broke mid-call.
    Transport,
    Timeout,
    /// Arguments failed a tool's parameter schema.
    Validation,
    /// A required session field was missing.
    State,
    /// The model API itself failed (HTTP status, auth, network).
    Model,
    Configuration,
    ToolExecution,
    Unknown,
}

