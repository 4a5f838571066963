//! Timestamp-ordered reorder buffer.
//!
//! Decoders may emit pictures in an order that differs from presentation
//! order. [`ReorderBuffer`] holds up to `depth` items keyed by timestamp and
//! releases the earliest one whenever it overflows, so output follows
//! presentation order as long as the codec never reorders further than
//! `depth` pictures.

use std::collections::BTreeMap;

/// Holds decoded items until their presentation turn.
#[derive(Debug)]
pub(crate) struct ReorderBuffer<T> {
    /// Keyed by `(timestamp, arrival)` so equal timestamps keep arrival order.
    pending: BTreeMap<(i64, u64), T>,
    depth: usize,
    arrivals: u64,
    /// Timestamp of the most recently released item.
    watermark: Option<i64>,
}

impl<T> ReorderBuffer<T> {
    /// Create a buffer that holds at most `depth` items (minimum 1).
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            depth: depth.max(1),
            arrivals: 0,
            watermark: None,
        }
    }

    /// Add an item, returning the item released by this push, if any.
    ///
    /// An item older than everything already released cannot be placed in
    /// order any more; it is handed straight back.
    pub(crate) fn push(&mut self, timestamp: i64, item: T) -> Option<(i64, T)> {
        if self.watermark.is_some_and(|watermark| timestamp < watermark) {
            log::trace!("Late frame at {timestamp} released out of order");
            return Some((timestamp, item));
        }

        self.pending.insert((timestamp, self.arrivals), item);
        self.arrivals += 1;

        if self.pending.len() > self.depth {
            return self.pop_earliest();
        }
        None
    }

    /// Release everything still held, earliest first.
    pub(crate) fn drain(&mut self) -> Vec<(i64, T)> {
        let mut released = Vec::with_capacity(self.pending.len());
        while let Some(item) = self.pop_earliest() {
            released.push(item);
        }
        released
    }

    /// Drop ordering history, e.g. after a seek.
    pub(crate) fn reset(&mut self) -> Vec<(i64, T)> {
        let held = self.drain();
        self.watermark = None;
        held
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn pop_earliest(&mut self) -> Option<(i64, T)> {
        let ((timestamp, _), item) = self.pending.pop_first()?;
        self.watermark = Some(timestamp);
        Some((timestamp, item))
    }
}
