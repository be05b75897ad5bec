//! The response-id watermark shared by a connection and its turn tasks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Highest response id the connection currently considers authoritative.
///
/// Turns compare their own id against it at every checkpoint and stop
/// producing output once a newer request has been accepted.
#[derive(Debug, Clone, Default)]
pub struct Watermark(Arc<AtomicI64>);

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the watermark to `response_id`. Never lowers it.
    ///
    /// Returns the watermark after the update.
    pub fn advance(&self, response_id: i64) -> i64 {
        self.0.fetch_max(response_id, Ordering::AcqRel).max(response_id)
    }

    pub fn current(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Whether output for `response_id` must be suppressed.
    pub fn is_superseded(&self, response_id: i64) -> bool {
        response_id < self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_forward() {
        let watermark = Watermark::new();
        assert_eq!(watermark.advance(3), 3);
        assert_eq!(watermark.advance(2), 3);
        assert_eq!(watermark.current(), 3);
    }

    #[test]
    fn older_ids_are_superseded() {
        let watermark = Watermark::new();
        let shared = watermark.clone();
        shared.advance(5);

        assert!(watermark.is_superseded(4));
        assert!(!watermark.is_superseded(5));
        assert!(!watermark.is_superseded(6));
    }
}
