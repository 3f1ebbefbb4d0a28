//! Reported, non-fatal store conditions
//!
//! Unknown types, registry collisions and hot-reload mismatches do not stop
//! the store. They are logged and kept in a bounded log so callers and tests
//! can inspect them.

use super::errors::StoreError;
use crate::metrics;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::{error, warn};

pub(crate) struct Diagnostics {
    entries: Mutex<VecDeque<StoreError>>,
    capacity: usize,
}

impl Diagnostics {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    /// Log and record `err`, handing it back to the caller
    pub(crate) fn report(&self, err: StoreError) -> StoreError {
        match &err {
            StoreError::HotReloadStructuralMismatch { .. } | StoreError::NamespaceNotFound { .. } => {
                warn!(error = %err, "store diagnostic")
            }
            _ => error!(error = %err, "store diagnostic"),
        }
        metrics::record_diagnostic();

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(err.clone());
        err
    }

    pub(crate) fn entries(&self) -> Vec<StoreError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).iter().cloned().collect()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_returns_error() {
        let diagnostics = Diagnostics::new(4);
        let err = diagnostics.report(StoreError::UnknownMutationType("x".to_string()));
        assert_eq!(err, StoreError::UnknownMutationType("x".to_string()));
        assert_eq!(diagnostics.entries(), vec![err]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let diagnostics = Diagnostics::new(2);
        for name in ["a", "b", "c"] {
            diagnostics.report(StoreError::UnknownActionType(name.to_string()));
        }
        assert_eq!(
            diagnostics.entries(),
            vec![
                StoreError::UnknownActionType("b".to_string()),
                StoreError::UnknownActionType("c".to_string()),
            ]
        );

        diagnostics.clear();
        assert!(diagnostics.entries().is_empty());
    }
}
