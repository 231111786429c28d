//! Easy2 Handler accumulating one transfer's response.
//! Keeps the body bytes in arrival order and the header lines of the final response.

use std::str;

/// Response accumulator installed on every transfer's easy handle.
#[derive(Debug, Default)]
pub struct ResponseSink {
    pub(crate) body: Vec<u8>,
    /// Header lines of the most recent response (redirect hops are discarded).
    pub(crate) headers: Vec<String>,
}

impl ResponseSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forget anything received so far (used when a transfer is re-armed).
    pub(crate) fn reset(&mut self) {
        self.body.clear();
        self.headers.clear();
    }
}

impl curl::easy::Handler for ResponseSink {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.headers.clear();
                self.headers.push(line.to_string());
            } else if !line.is_empty() {
                self.headers.push(line.to_string());
            }
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curl::easy::Handler;

    #[test]
    fn write_appends_in_arrival_order() {
        let mut sink = ResponseSink::new();
        assert_eq!(sink.write(b"po").unwrap(), 2);
        assert_eq!(sink.write(b"").unwrap(), 0);
        assert_eq!(sink.write(b"ng\0!").unwrap(), 4);
        assert_eq!(sink.body, b"pong\0!");
    }

    #[test]
    fn header_clears_on_http_status_line() {
        let mut sink = ResponseSink::new();
        sink.header(b"HTTP/1.1 302 Found\r\n");
        sink.header(b"Location: http://other/\r\n");
        sink.header(b"\r\n");
        assert_eq!(sink.headers.len(), 2, "blank terminator line is skipped");
        sink.header(b"HTTP/1.1 200 OK\r\n");
        sink.header(b"Content-Length: 4\r\n");
        assert_eq!(sink.headers, vec!["HTTP/1.1 200 OK", "Content-Length: 4"]);
    }

    #[test]
    fn reset_drops_partial_response() {
        let mut sink = ResponseSink::new();
        sink.header(b"HTTP/1.1 200 OK\r\n");
        sink.write(b"abc").unwrap();
        sink.reset();
        assert!(sink.body.is_empty());
        assert!(sink.headers.is_empty());
    }
}
