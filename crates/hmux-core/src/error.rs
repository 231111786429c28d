//! Engine-level error type.
//!
//! Transfer outcomes (DNS, connect, TLS, timeout, HTTP) are not errors here:
//! they are reported as data through [`crate::TransferResult`]. `EngineError`
//! covers misuse of the engine and failures of the shared multi handle.

/// Error returned by [`crate::MultiContext`] operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The context was torn down; no further operations are possible.
    #[error("context closed")]
    ContextClosed,
    /// No live transfer has this id (never created, or already released).
    #[error("unknown transfer")]
    UnknownTransfer,
    /// The transfer was already submitted; headers, body and method are fixed.
    #[error("transfer already submitted")]
    AlreadySubmitted,
    /// The result was requested before the completion was reported.
    #[error("transfer has not completed")]
    NotCompleted,
    /// A previous registration failed and the easy handle is gone; reconfigure or release.
    #[error("transfer is unusable after a failed registration")]
    Unusable,
    /// libcurl rejected an option while configuring the transfer.
    #[error("curl setup: {0}")]
    Setup(#[from] curl::Error),
    /// libcurl rejected a multi-handle option while building the context.
    #[error("curl multi setup: {0}")]
    MultiSetup(#[source] curl::MultiError),
    /// The multi handle refused to add the transfer to the active set.
    #[error("curl multi add: {0}")]
    Registration(#[source] curl::MultiError),
    /// Advancing I/O on the multi handle failed.
    #[error("curl multi perform: {0}")]
    Perform(#[source] curl::MultiError),
    /// Waiting for socket activity failed.
    #[error("curl multi wait: {0}")]
    Wait(#[source] curl::MultiError),
}

impl EngineError {
    /// True for failures of the shared I/O step (reported from `poll`).
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, EngineError::Perform(_) | EngineError::Wait(_))
    }
}
