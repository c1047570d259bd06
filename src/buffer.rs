//! Concurrency-safe staging area for [`LogRecord`]s awaiting delivery.
//!
//! The buffer keeps records in append order together with the sum of
//! their encoded sizes, so a sink can cut batches by byte budget without
//! re-encoding the whole queue. Every read and every mutation goes
//! through the same lock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::record::LogRecord;

#[derive(Debug, Default)]
struct Inner {
    records: VecDeque<LogRecord>,
    size: u64,
    unsized_records: u64,
    closed: bool,
}

/// Ordered, mutex-guarded queue of [`LogRecord`]s with a running byte total.
///
/// Capacity is unbounded; the owner is expected to drain it periodically.
/// Once [`LogBuffer::close`] has been called, appends are refused while
/// draining keeps working, so a final drain after closing sees every
/// record the buffer will ever accept.
#[derive(Debug, Default)]
pub struct LogBuffer {
    inner: Mutex<Inner>,
}

/// Size a record contributes to the running total.
///
/// A record that cannot be encoded counts as zero both when it is added
/// and when it is removed, which keeps the total consistent with the
/// records actually held.
fn accounted_size(record: &LogRecord) -> Option<u64> {
    record.size().ok().map(|len| len as u64)
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The queue is never left half-updated across a panic point, so a
        // poisoned lock still guards consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `record` at the tail and add its encoded size to the total.
    ///
    /// Returns `false`, dropping the record, if the buffer is closed.
    pub fn append(&self, record: LogRecord) -> bool {
        let size = accounted_size(&record);
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        match size {
            Some(size) => inner.size += size,
            None => inner.unsized_records += 1,
        }
        inner.records.push_back(record);
        true
    }

    /// Refuse all further appends. Records already held stay drainable.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Sum of the encoded sizes of all buffered records, in bytes.
    pub fn size(&self) -> u64 {
        self.lock().size
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Number of records appended so far whose size could not be computed.
    pub fn unsized_records(&self) -> u64 {
        self.lock().unsized_records
    }

    /// Remove and return the first `min(n, len())` records in append order.
    ///
    /// The running total is decreased by the recomputed size of every
    /// removed record.
    pub fn drain(&self, n: usize) -> Vec<LogRecord> {
        let mut inner = self.lock();
        let n = n.min(inner.records.len());
        let drained: Vec<LogRecord> = inner.records.drain(..n).collect();
        for record in &drained {
            if let Some(size) = accounted_size(record) {
                inner.size -= size;
            }
        }
        drained
    }

    /// Remove the longest prefix whose encoded size fits in `max_bytes`.
    ///
    /// At least one record is returned whenever the buffer is not empty, so
    /// a single record larger than `max_bytes` is still handed out on its
    /// own instead of blocking everything queued behind it.
    pub fn drain_bytes(&self, max_bytes: u64) -> Vec<LogRecord> {
        let mut inner = self.lock();
        let mut taken = 0usize;
        let mut total = 0u64;
        for record in inner.records.iter() {
            let size = accounted_size(record).unwrap_or(0);
            if taken > 0 && total + size > max_bytes {
                break;
            }
            total += size;
            taken += 1;
        }
        let drained: Vec<LogRecord> = inner.records.drain(..taken).collect();
        inner.size -= total;
        drained
    }
}
