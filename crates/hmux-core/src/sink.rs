//! Completion sink: the host-side handler invoked once per finished transfer.

use crate::error::EngineError;
use crate::registry::Registry;
use crate::transfer::{Method, ResultCode, TransferId, TransferResult};

/// Receives every completed transfer exactly once, synchronously from
/// [`crate::MultiContext::poll`]. Implementations must not block.
pub trait CompletionSink {
    fn on_complete(&mut self, completion: Completion<'_>);
}

impl<F> CompletionSink for F
where
    F: FnMut(Completion<'_>),
{
    fn on_complete(&mut self, completion: Completion<'_>) {
        self(completion)
    }
}

/// A finished transfer handed to the sink. The transfer stays registered
/// until [`Completion::release`] (or `MultiContext::release`) is called.
pub struct Completion<'a> {
    registry: &'a mut Registry,
    id: TransferId,
    code: ResultCode,
}

impl<'a> Completion<'a> {
    pub(crate) fn new(registry: &'a mut Registry, id: TransferId, code: ResultCode) -> Self {
        Self { registry, id, code }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Transport result code (OK or a libcurl error code).
    pub fn code(&self) -> ResultCode {
        self.code
    }

    pub fn is_success(&self) -> bool {
        self.code.is_ok()
    }

    pub fn url(&self) -> Option<&str> {
        self.registry.get(self.id).ok().map(|t| t.url())
    }

    pub fn method(&self) -> Option<Method> {
        self.registry.get(self.id).ok().and_then(|t| t.method())
    }

    pub fn read_result(&self) -> Result<TransferResult<'_>, EngineError> {
        self.registry.get(self.id)?.result()
    }

    pub fn response_headers(&self) -> Result<&[String], EngineError> {
        self.registry.get(self.id)?.response_headers()
    }

    /// Destroy the transfer now; its id becomes invalid.
    pub fn release(self) {
        self.registry.remove(self.id);
    }
}

/// Owned record of a finished transfer, as kept by [`CollectingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub id: TransferId,
    pub url: String,
    pub code: ResultCode,
    pub status: u32,
    /// Present when the transfer succeeded (empty error text).
    pub body: Option<Vec<u8>>,
    /// Present when the transfer failed.
    pub error: Option<String>,
    pub headers: Vec<String>,
}

impl Finished {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn from_completion(c: &Completion<'_>) -> Self {
        let (status, body, error) = match c.read_result() {
            Ok(r) => (
                r.status(),
                r.body().map(<[u8]>::to_vec),
                r.error().map(str::to_string),
            ),
            Err(e) => (0, None, Some(e.to_string())),
        };
        Self {
            id: c.id(),
            url: c.url().unwrap_or_default().to_string(),
            code: c.code(),
            status,
            body,
            error,
            headers: c.response_headers().map(<[String]>::to_vec).unwrap_or_default(),
        }
    }
}

/// Sink that reads each completion into a [`Finished`] record and releases
/// the transfer, keeping records in completion order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    finished: Vec<Finished>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished(&self) -> &[Finished] {
        &self.finished
    }

    pub fn len(&self) -> usize {
        self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty()
    }

    /// Take all records collected so far.
    pub fn drain(&mut self) -> Vec<Finished> {
        std::mem::take(&mut self.finished)
    }
}

impl CompletionSink for CollectingSink {
    fn on_complete(&mut self, completion: Completion<'_>) {
        self.finished.push(Finished::from_completion(&completion));
        completion.release();
    }
}
