use std::future::Future;
use std::ops::Range;

/// Default number of files in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const MIN_CONCURRENT: usize = 1;
pub const MAX_CONCURRENT: usize = 10;

/// Upper bound on simultaneously in-flight transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyWindow {
    max_concurrent: usize,
}

impl ConcurrencyWindow {
    /// Creates a window, clamping the requested size into
    /// `MIN_CONCURRENT..=MAX_CONCURRENT`.
    pub fn new(requested: usize) -> Self {
        Self {
            max_concurrent: requested.clamp(MIN_CONCURRENT, MAX_CONCURRENT),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Range of the next chunk to dispatch, or `None` when the queue is drained.
    pub fn next_chunk(&self, cursor: usize, len: usize) -> Option<Range<usize>> {
        (cursor < len).then(|| cursor..(cursor + self.max_concurrent).min(len))
    }

    /// Number of chunks needed for `len` items.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_concurrent)
    }

    /// Runs every unit of a chunk concurrently and waits for all of them.
    ///
    /// Outputs keep dispatch order regardless of completion order.
    pub async fn settle<F>(units: impl IntoIterator<Item = F>) -> Vec<F::Output>
    where
        F: Future,
    {
        futures_util::future::join_all(units).await
    }
}

impl Default for ConcurrencyWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn clamps_requested_size() {
        assert_eq!(ConcurrencyWindow::new(0).max_concurrent(), 1);
        assert_eq!(ConcurrencyWindow::new(4).max_concurrent(), 4);
        assert_eq!(ConcurrencyWindow::new(50).max_concurrent(), 10);
        assert_eq!(ConcurrencyWindow::default().max_concurrent(), 3);
    }

    #[test]
    fn chunks_cover_queue() {
        let w = ConcurrencyWindow::new(3);
        assert_eq!(w.next_chunk(0, 7), Some(0..3));
        assert_eq!(w.next_chunk(3, 7), Some(3..6));
        assert_eq!(w.next_chunk(6, 7), Some(6..7));
        assert_eq!(w.next_chunk(7, 7), None);
        assert_eq!(w.chunk_count(7), 3);
        assert_eq!(w.chunk_count(0), 0);
    }

    #[tokio::test]
    async fn settle_keeps_dispatch_order() {
        let units = [30u64, 5, 15].map(|ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        });
        let out = ConcurrencyWindow::settle(units).await;
        assert_eq!(out, vec![30, 5, 15]);
    }
}
