//! Blocking-query index tracking.

/// Last accepted scheduler index for a long-poll loop.
///
/// A response is acted on only if its index is strictly greater than the
/// last accepted one; the tracked index never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexGate {
    last: u64,
}

impl IndexGate {
    pub fn new(start: u64) -> Self {
        Self { last: start }
    }

    /// Index to send as the wait index of the next query.
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Accept `index` if it advances past the last accepted index.
    pub fn advance(&mut self, index: u64) -> bool {
        if index > self.last {
            self.last = index;
            true
        } else {
            false
        }
    }
}

impl Default for IndexGate {
    fn default() -> Self {
        Self::new(0)
    }
}
