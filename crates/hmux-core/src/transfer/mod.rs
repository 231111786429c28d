//! One HTTP request/response exchange tracked by the engine.
//!
//! A transfer owns its easy handle and header lines for its whole lifetime:
//! configuring → active (handle registered with the multi handle) →
//! completed (handle detached, result settled). Releasing a transfer in any
//! state detaches and drops the handle.

mod handler;
mod result;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use curl::easy::{Easy2, List};
use curl::multi::{Easy2Handle, Multi};

use crate::error::EngineError;

pub(crate) use handler::ResponseSink;
pub use result::TransferResult;
pub(crate) use result::Settled;

/// Opaque transfer identity. Also installed as the easy handle's token so
/// completion messages can be matched back to the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub(crate) usize);

impl TransferId {
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request method. PUT and DELETE are sent as custom-request overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Transport result code reported with each completion. 0 is OK; anything
/// else is a libcurl `CURLcode` describing why the transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(i32);

impl ResultCode {
    pub const OK: ResultCode = ResultCode(0);

    pub fn from_outcome(outcome: &Result<(), curl::Error>) -> Self {
        match outcome {
            Ok(()) => ResultCode::OK,
            Err(e) => ResultCode(e.code() as i32),
        }
    }

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn value(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            f.write_str("OK")
        } else {
            write!(f, "curl code {}", self.0)
        }
    }
}

/// Per-transfer transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Total transfer timeout.
    pub timeout: Duration,
    /// Connect timeout; None = half of `timeout`.
    pub connect_timeout: Option<Duration>,
    pub verify_peer: bool,
    pub verify_host: bool,
    pub ca_info: Option<PathBuf>,
    pub follow_redirects: bool,
    pub max_redirections: Option<u32>,
}

impl TransferOptions {
    /// Defaults with the given total timeout: connect = half, no TLS verification, follow redirects.
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            ..Self::default()
        }
    }

    pub fn effective_connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(self.timeout / 2)
    }
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(5000),
            connect_timeout: None,
            verify_peer: false,
            verify_host: false,
            ca_info: None,
            follow_redirects: true,
            max_redirections: None,
        }
    }
}

/// libcurl's `CURLE_BAD_FUNCTION_ARGUMENT`.
const BAD_FUNCTION_ARGUMENT: i32 = 43;

/// Apply destination and transport options to an easy handle. The handle is
/// reset first, so nothing from an earlier configuration or method survives.
fn configure(
    easy: &mut Easy2<ResponseSink>,
    url: &str,
    opts: &TransferOptions,
) -> Result<(), curl::Error> {
    easy.reset();
    easy.url(url)?;
    easy.signal(false)?;
    easy.timeout(opts.timeout)?;
    easy.connect_timeout(opts.effective_connect_timeout())?;
    easy.ssl_verify_peer(opts.verify_peer)?;
    easy.ssl_verify_host(opts.verify_host)?;
    if let Some(ref ca) = opts.ca_info {
        easy.cainfo(ca)?;
    }
    easy.follow_location(opts.follow_redirects)?;
    if let Some(max) = opts.max_redirections {
        easy.max_redirections(max)?;
    }
    easy.get_mut().reset();
    Ok(())
}

/// Set the request method, header list and body just before registration.
fn prepare_request(
    easy: &mut Easy2<ResponseSink>,
    method: Method,
    headers: &[String],
    body: &[u8],
) -> Result<(), curl::Error> {
    match method {
        Method::Get => {}
        Method::Post => easy.post(true)?,
        Method::Put | Method::Delete => easy.custom_request(method.as_str())?,
    }
    if !headers.is_empty() {
        let mut list = List::new();
        for line in headers {
            list.append(line)?;
        }
        easy.http_headers(list)?;
    }
    if !body.is_empty() {
        // Sets the size first, so embedded NULs are sent as-is.
        easy.post_fields_copy(body)?;
    }
    Ok(())
}

enum Stage {
    Configuring(Easy2<ResponseSink>),
    Active(Easy2Handle<ResponseSink>),
    Completed(Settled),
    /// The multi handle rejected registration and consumed the easy handle.
    Unusable,
}

/// A transfer owned by the context's registry.
pub(crate) struct Transfer {
    id: TransferId,
    url: String,
    opts: TransferOptions,
    headers: Vec<String>,
    method: Option<Method>,
    stage: Stage,
    submitted_at: Option<Instant>,
}

impl Transfer {
    pub(crate) fn new(
        id: TransferId,
        url: &str,
        opts: &TransferOptions,
    ) -> Result<Self, EngineError> {
        let mut easy = Easy2::new(ResponseSink::new());
        configure(&mut easy, url, opts)?;
        Ok(Self {
            id,
            url: url.to_string(),
            opts: opts.clone(),
            headers: Vec::new(),
            method: None,
            stage: Stage::Configuring(easy),
            submitted_at: None,
        })
    }

    pub(crate) fn id(&self) -> TransferId {
        self.id
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn method(&self) -> Option<Method> {
        self.method
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.stage, Stage::Active(_))
    }

    /// Re-apply destination and options before submission (last write wins).
    /// A transfer left unusable by a failed registration gets a fresh easy handle.
    pub(crate) fn reconfigure(&mut self, url: &str, opts: &TransferOptions) -> Result<(), EngineError> {
        match self.stage {
            Stage::Configuring(ref mut easy) => configure(easy, url, opts)?,
            Stage::Unusable => {
                let mut easy = Easy2::new(ResponseSink::new());
                configure(&mut easy, url, opts)?;
                self.stage = Stage::Configuring(easy);
                self.method = None;
            }
            Stage::Active(_) | Stage::Completed(_) => return Err(EngineError::AlreadySubmitted),
        }
        self.url = url.to_string();
        self.opts = opts.clone();
        Ok(())
    }

    pub(crate) fn push_header(&mut self, line: &str) -> Result<(), EngineError> {
        match self.stage {
            Stage::Configuring(_) | Stage::Unusable => {
                if line.contains('\0') {
                    return Err(curl::Error::new(BAD_FUNCTION_ARGUMENT as _).into());
                }
                self.headers.push(line.to_string());
                Ok(())
            }
            Stage::Active(_) | Stage::Completed(_) => Err(EngineError::AlreadySubmitted),
        }
    }

    /// Attach method, headers and body, then register with `multi`.
    /// On registration failure the transfer is left unregistered.
    pub(crate) fn submit(
        &mut self,
        multi: &Multi,
        method: Method,
        body: &[u8],
    ) -> Result<(), EngineError> {
        let mut easy = match std::mem::replace(&mut self.stage, Stage::Unusable) {
            Stage::Configuring(easy) => easy,
            Stage::Unusable => return Err(EngineError::Unusable),
            other => {
                self.stage = other;
                return Err(EngineError::AlreadySubmitted);
            }
        };
        if let Err(e) = prepare_request(&mut easy, method, &self.headers, body) {
            // Drop whatever method/header options were applied before the failure.
            let restored = configure(&mut easy, &self.url, &self.opts);
            self.stage = Stage::Configuring(easy);
            restored?;
            return Err(e.into());
        }
        let mut handle = multi.add2(easy).map_err(EngineError::Registration)?;
        if let Err(e) = handle.set_token(self.id.0) {
            // Without a token the completion could never be matched; undo the registration.
            match multi.remove2(handle) {
                Ok(easy) => self.stage = Stage::Configuring(easy),
                Err(re) => tracing::warn!(transfer = %self.id, "curl multi remove: {}", re),
            }
            return Err(e.into());
        }
        self.stage = Stage::Active(handle);
        self.method = Some(method);
        self.submitted_at = Some(Instant::now());
        Ok(())
    }

    /// Detach the finished handle from `multi` and settle its result.
    /// Returns None when the transfer was not active.
    pub(crate) fn complete(
        &mut self,
        multi: &Multi,
        outcome: Result<(), curl::Error>,
    ) -> Option<ResultCode> {
        let handle = match std::mem::replace(&mut self.stage, Stage::Unusable) {
            Stage::Active(handle) => handle,
            other => {
                self.stage = other;
                return None;
            }
        };
        let code = ResultCode::from_outcome(&outcome);
        let settled = match multi.remove2(handle) {
            Ok(easy) => Settled::from_easy(easy, outcome),
            Err(e) => Settled::detached_with_error(code, format!("curl multi remove: {}", e)),
        };
        tracing::debug!(
            transfer = %self.id,
            method = ?self.method,
            code = %code,
            status = settled.status,
            bytes = settled.body.len(),
            elapsed_ms = self.submitted_at.map(|t| t.elapsed().as_millis() as u64),
            "transfer completed"
        );
        self.stage = Stage::Completed(settled);
        Some(code)
    }

    /// Detach from `multi` if still active. Called before the transfer is dropped.
    pub(crate) fn detach(&mut self, multi: Option<&Multi>) {
        match std::mem::replace(&mut self.stage, Stage::Unusable) {
            Stage::Active(handle) => match multi {
                Some(multi) => {
                    if let Err(e) = multi.remove2(handle) {
                        tracing::warn!(transfer = %self.id, "curl multi remove: {}", e);
                    }
                }
                // Dropping the handle detaches it from its multi handle.
                None => drop(handle),
            },
            other => self.stage = other,
        }
    }

    fn settled(&self) -> Result<&Settled, EngineError> {
        match self.stage {
            Stage::Completed(ref s) => Ok(s),
            Stage::Unusable => Err(EngineError::Unusable),
            Stage::Configuring(_) | Stage::Active(_) => Err(EngineError::NotCompleted),
        }
    }

    pub(crate) fn result(&self) -> Result<TransferResult<'_>, EngineError> {
        Ok(self.settled()?.result())
    }

    pub(crate) fn code(&self) -> Option<ResultCode> {
        self.settled().ok().map(|s| s.code)
    }

    pub(crate) fn response_headers(&self) -> Result<&[String], EngineError> {
        Ok(&self.settled()?.headers)
    }
}
