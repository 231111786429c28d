//! Multiplex context: one curl multi handle shared by many transfers.
//!
//! Single-threaded and non-blocking. The host calls [`MultiContext::poll`]
//! once per tick; each call drains the completion queue, reports every
//! finished transfer to the sink exactly once, and advances I/O by one
//! `curl_multi_perform` step.

use std::time::Duration;

use curl::multi::Multi;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::Registry;
use crate::sink::{Completion, CompletionSink};
use crate::transfer::{
    Method, ResultCode, Transfer, TransferId, TransferOptions, TransferResult,
};

/// Upper bound for [`MultiContext::wait_for_activity`].
const MAX_WAIT: Duration = Duration::from_millis(100);

pub struct MultiContext<S> {
    /// None once torn down.
    multi: Option<Multi>,
    registry: Registry,
    config: EngineConfig,
    sink: S,
    /// Running handles reported by the last perform.
    running: u32,
}

impl<S: CompletionSink> MultiContext<S> {
    /// Initialize libcurl process state and create the multi handle.
    pub fn new(config: EngineConfig, sink: S) -> Result<Self, EngineError> {
        curl::init();
        let mut multi = Multi::new();
        if let Some(n) = config.max_total_connections {
            multi
                .set_max_total_connections(n)
                .map_err(EngineError::MultiSetup)?;
        }
        if let Some(n) = config.max_host_connections {
            multi
                .set_max_host_connections(n)
                .map_err(EngineError::MultiSetup)?;
        }
        tracing::debug!("multi context opened");
        Ok(Self {
            multi: Some(multi),
            registry: Registry::new(),
            config,
            sink,
            running: 0,
        })
    }

    /// Create a transfer with the configured defaults and the given total timeout.
    pub fn create_transfer(&mut self, url: &str, timeout_ms: u64) -> Result<TransferId, EngineError> {
        let opts = self.config.transfer_options(timeout_ms);
        self.create_transfer_with(url, &opts)
    }

    pub fn create_transfer_with(
        &mut self,
        url: &str,
        opts: &TransferOptions,
    ) -> Result<TransferId, EngineError> {
        self.ensure_open()?;
        let id = self.registry.allocate_id();
        let transfer = Transfer::new(id, url, opts)?;
        self.registry.insert(transfer);
        tracing::debug!(transfer = %id, url, "transfer created");
        Ok(id)
    }

    /// Re-apply destination and options to a transfer that was not submitted yet.
    pub fn reconfigure(
        &mut self,
        id: TransferId,
        url: &str,
        opts: &TransferOptions,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.registry.get_mut(id)?.reconfigure(url, opts)
    }

    /// Append one raw `Name: Value` header line. Rejected after submission.
    pub fn set_header(&mut self, id: TransferId, line: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.registry.get_mut(id)?.push_header(line)
    }

    /// Attach headers and body and add the transfer to the active set.
    /// On error the transfer is not registered and will never be reported.
    pub fn submit(&mut self, id: TransferId, method: Method, body: &[u8]) -> Result<(), EngineError> {
        let multi = self.multi.as_ref().ok_or(EngineError::ContextClosed)?;
        let transfer = self.registry.get_mut(id)?;
        match transfer.submit(multi, method, body) {
            Ok(()) => {
                tracing::debug!(
                    transfer = %id,
                    %method,
                    url = transfer.url(),
                    body_len = body.len(),
                    "transfer submitted"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(transfer = %id, %method, "submit failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn submit_get(&mut self, id: TransferId, body: &[u8]) -> Result<(), EngineError> {
        self.submit(id, Method::Get, body)
    }

    pub fn submit_post(&mut self, id: TransferId, body: &[u8]) -> Result<(), EngineError> {
        self.submit(id, Method::Post, body)
    }

    pub fn submit_put(&mut self, id: TransferId, body: &[u8]) -> Result<(), EngineError> {
        self.submit(id, Method::Put, body)
    }

    pub fn submit_delete(&mut self, id: TransferId, body: &[u8]) -> Result<(), EngineError> {
        self.submit(id, Method::Delete, body)
    }

    /// Result of a completed transfer that the sink did not release.
    pub fn read_result(&self, id: TransferId) -> Result<TransferResult<'_>, EngineError> {
        self.ensure_open()?;
        self.registry.get(id)?.result()
    }

    /// Transport code of a completed transfer.
    pub fn result_code(&self, id: TransferId) -> Result<ResultCode, EngineError> {
        self.ensure_open()?;
        self.registry.get(id)?.code().ok_or(EngineError::NotCompleted)
    }

    pub fn response_headers(&self, id: TransferId) -> Result<&[String], EngineError> {
        self.ensure_open()?;
        self.registry.get(id)?.response_headers()
    }

    /// Destroy a transfer in any state. An in-flight transfer is detached
    /// immediately and will not be reported by any later poll.
    pub fn release(&mut self, id: TransferId) -> Result<(), EngineError> {
        let multi = self.multi.as_ref().ok_or(EngineError::ContextClosed)?;
        let mut transfer = self.registry.remove(id).ok_or(EngineError::UnknownTransfer)?;
        if transfer.is_active() {
            tracing::debug!(transfer = %id, "releasing in-flight transfer");
        }
        transfer.detach(Some(multi));
        Ok(())
    }

    /// One non-blocking step: report every finished transfer to the sink, then
    /// advance I/O once. Returns how many completions were reported.
    ///
    /// A perform failure is returned as [`EngineError::Perform`]; the active
    /// set is left as is and later polls may still drain or make progress.
    pub fn poll(&mut self) -> Result<usize, EngineError> {
        let multi = self.multi.as_ref().ok_or(EngineError::ContextClosed)?;
        let mut reported = 0usize;
        loop {
            let mut finished: Vec<(usize, Result<(), curl::Error>)> = Vec::new();
            multi.messages(|msg| match (msg.token(), msg.result()) {
                (Ok(token), Some(outcome)) => finished.push((token, outcome)),
                (Err(e), Some(_)) => tracing::warn!("completion without token: {}", e),
                _ => {}
            });

            if finished.is_empty() {
                match multi.perform() {
                    Ok(running) => self.running = running,
                    Err(e) if e.is_call_perform() => {}
                    Err(e) => {
                        tracing::error!("curl multi perform failed: {}", e);
                        return Err(EngineError::Perform(e));
                    }
                }
                break;
            }

            for (token, outcome) in finished {
                let id = TransferId(token);
                let code = match self.registry.get_mut(id) {
                    Ok(transfer) => transfer.complete(multi, outcome),
                    Err(_) => None,
                };
                let Some(code) = code else {
                    tracing::warn!(transfer = %id, "completion for a transfer that is not active; skipped");
                    continue;
                };
                reported += 1;
                self.sink.on_complete(Completion::new(&mut self.registry, id, code));
            }
        }
        Ok(reported)
    }

    /// Block until there is socket activity or `max` (capped at 100 ms) elapses.
    /// For hosts without their own tick source; `poll` never waits.
    pub fn wait_for_activity(&self, max: Duration) -> Result<u32, EngineError> {
        let multi = self.multi.as_ref().ok_or(EngineError::ContextClosed)?;
        multi
            .wait(&mut [], max.min(MAX_WAIT))
            .map_err(EngineError::Wait)
    }
}

impl<S> MultiContext<S> {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.multi.is_some() {
            Ok(())
        } else {
            Err(EngineError::ContextClosed)
        }
    }

    /// Release the multi handle and every remaining transfer. Fails with
    /// [`EngineError::ContextClosed`] when called a second time.
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        let multi = self.multi.take().ok_or(EngineError::ContextClosed)?;
        let remaining = self.registry.drain();
        let active = remaining.iter().filter(|t| t.is_active()).count();
        if active > 0 {
            tracing::warn!(active, "teardown with transfers still in flight; releasing them");
        }
        for mut transfer in remaining {
            transfer.detach(Some(&multi));
        }
        drop(multi);
        self.running = 0;
        tracing::debug!("multi context closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.multi.is_none()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Live transfers (created and not yet released), in any state.
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    /// Transfers in the active set (submitted, not yet reported).
    pub fn active_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Running handles as reported by the last perform step.
    pub fn running(&self) -> u32 {
        self.running
    }
}

impl<S> Drop for MultiContext<S> {
    fn drop(&mut self) {
        if self.multi.is_some() {
            let _ = self.teardown();
        }
    }
}
