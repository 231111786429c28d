//! Live transfers keyed by id.
//!
//! Ids come from a monotonically increasing counter, so an id (and the easy
//! handle token derived from it) never aliases a newer transfer after release.

use std::collections::HashMap;

use crate::error::EngineError;
use crate::transfer::{Transfer, TransferId};

pub(crate) struct Registry {
    transfers: HashMap<TransferId, Transfer>,
    next_id: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            transfers: HashMap::new(),
            next_id: 1,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> TransferId {
        let id = TransferId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Insert a transfer under its own id. Ids are never handed out twice.
    pub(crate) fn insert(&mut self, transfer: Transfer) {
        let prev = self.transfers.insert(transfer.id(), transfer);
        debug_assert!(prev.is_none(), "transfer id reused");
    }

    pub(crate) fn get(&self, id: TransferId) -> Result<&Transfer, EngineError> {
        self.transfers.get(&id).ok_or(EngineError::UnknownTransfer)
    }

    pub(crate) fn get_mut(&mut self, id: TransferId) -> Result<&mut Transfer, EngineError> {
        self.transfers.get_mut(&id).ok_or(EngineError::UnknownTransfer)
    }

    pub(crate) fn remove(&mut self, id: TransferId) -> Option<Transfer> {
        self.transfers.remove(&id)
    }

    /// Remove every transfer, e.g. on teardown.
    pub(crate) fn drain(&mut self) -> Vec<Transfer> {
        self.transfers.drain().map(|(_, t)| t).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.transfers.len()
    }

    /// Transfers currently registered with the multi handle.
    pub(crate) fn active_count(&self) -> usize {
        self.transfers.values().filter(|t| t.is_active()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferOptions;

    fn transfer(reg: &mut Registry) -> TransferId {
        let id = reg.allocate_id();
        let t = Transfer::new(id, "http://example.test/", &TransferOptions::default()).unwrap();
        reg.insert(t);
        id
    }

    #[test]
    fn ids_are_unique_and_not_reused_after_remove() {
        let mut reg = Registry::new();
        let a = transfer(&mut reg);
        let b = transfer(&mut reg);
        assert_ne!(a, b);
        assert!(reg.remove(a).is_some());
        let c = transfer(&mut reg);
        assert_ne!(c, a, "released id must not alias a new transfer");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn lookup_of_released_id_fails() {
        let mut reg = Registry::new();
        let a = transfer(&mut reg);
        reg.remove(a);
        assert!(matches!(reg.get(a), Err(EngineError::UnknownTransfer)));
        assert!(matches!(reg.get_mut(a), Err(EngineError::UnknownTransfer)));
        assert!(reg.remove(a).is_none());
    }

    #[test]
    fn unsubmitted_transfers_are_not_active() {
        let mut reg = Registry::new();
        transfer(&mut reg);
        transfer(&mut reg);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.active_count(), 0);
        assert_eq!(reg.drain().len(), 2);
        assert_eq!(reg.len(), 0);
    }
}
