//! Settle a finished Easy2 transfer into its readable result (code, status, body, error text).

use curl::easy::Easy2;

use super::handler::ResponseSink;
use super::ResultCode;

/// Outcome of a completed transfer as seen by the host.
///
/// A non-empty error text always wins: the transfer is a `Failure` even when
/// the server sent a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferResult<'a> {
    Success { body: &'a [u8], status: u32 },
    Failure { status: u32, error: &'a str },
}

impl<'a> TransferResult<'a> {
    /// HTTP status of the final response (0 when none was received).
    pub fn status(&self) -> u32 {
        match *self {
            TransferResult::Success { status, .. } | TransferResult::Failure { status, .. } => {
                status
            }
        }
    }

    /// Response body; absent on failure.
    pub fn body(&self) -> Option<&'a [u8]> {
        match *self {
            TransferResult::Success { body, .. } => Some(body),
            TransferResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&'a str> {
        match *self {
            TransferResult::Success { .. } => None,
            TransferResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }
}

/// Everything kept from a transfer once its easy handle is released.
#[derive(Debug)]
pub(crate) struct Settled {
    pub(crate) code: ResultCode,
    pub(crate) status: u32,
    /// Empty = no error.
    pub(crate) error: String,
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<String>,
}

impl Settled {
    /// Build from the transport outcome and the detached easy handle.
    pub(crate) fn from_easy(
        mut easy: Easy2<ResponseSink>,
        outcome: Result<(), curl::Error>,
    ) -> Self {
        let status = easy.response_code().unwrap_or(0);
        let error = error_text(easy.take_error_buf(), &outcome);
        let sink = easy.get_mut();
        Self {
            code: ResultCode::from_outcome(&outcome),
            status,
            error,
            body: std::mem::take(&mut sink.body),
            headers: std::mem::take(&mut sink.headers),
        }
    }

    /// Used when the handle could not be detached cleanly; the transfer still completes.
    pub(crate) fn detached_with_error(code: ResultCode, error: String) -> Self {
        Self {
            code,
            status: 0,
            error,
            body: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub(crate) fn result(&self) -> TransferResult<'_> {
        if self.error.is_empty() {
            TransferResult::Success {
                body: &self.body,
                status: self.status,
            }
        } else {
            TransferResult::Failure {
                status: self.status,
                error: &self.error,
            }
        }
    }
}

/// Error text for a finished transfer: libcurl's error buffer, else the
/// description of a non-OK result code, else empty.
pub(crate) fn error_text(buffer: Option<String>, outcome: &Result<(), curl::Error>) -> String {
    if let Some(buf) = buffer {
        let buf = buf.trim_end_matches('\0').trim_end();
        if !buf.is_empty() {
            return buf.to_string();
        }
    }
    match outcome {
        Ok(()) => String::new(),
        Err(e) => e
            .extra_description()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| e.description())
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(status: u32, error: &str, body: &[u8]) -> Settled {
        Settled {
            code: ResultCode::OK,
            status,
            error: error.to_string(),
            body: body.to_vec(),
            headers: Vec::new(),
        }
    }

    #[test]
    fn empty_error_yields_body_and_status() {
        let s = settled(200, "", b"pong");
        let r = s.result();
        assert_eq!(r, TransferResult::Success { body: b"pong", status: 200 });
        assert_eq!(r.body(), Some(&b"pong"[..]));
        assert!(r.error().is_none());
    }

    #[test]
    fn error_text_wins_over_status() {
        let s = settled(200, "Recv failure: Connection reset by peer", b"partial");
        let r = s.result();
        assert!(!r.is_success());
        assert_eq!(r.status(), 200);
        assert!(r.body().is_none(), "body is absent whenever error text is set");
        assert_eq!(r.error(), Some("Recv failure: Connection reset by peer"));
    }

    #[test]
    fn http_error_status_without_error_text_is_success() {
        let s = settled(404, "", b"not found");
        assert!(s.result().is_success());
        assert_eq!(s.result().status(), 404);
    }

    #[test]
    fn error_text_prefers_buffer() {
        let out = Err(curl::Error::new(28));
        assert_eq!(
            error_text(Some("Connection timed out after 25 milliseconds".into()), &out),
            "Connection timed out after 25 milliseconds"
        );
    }

    #[test]
    fn error_text_falls_back_to_code_description() {
        let out = Err(curl::Error::new(28));
        let text = error_text(Some(String::new()), &out);
        assert!(!text.is_empty(), "non-OK code always produces error text");
        assert!(!error_text(None, &out).is_empty());
    }

    #[test]
    fn error_text_empty_on_success() {
        assert_eq!(error_text(None, &Ok(())), "");
        assert_eq!(error_text(Some("\0\0".into()), &Ok(())), "");
    }
}
