//! Latency measurements
//!
//! Per-operation counters a benchmark run reports from, and [`MeasuredDb`],
//! a [`Db`] wrapper that times every call.
//!
//! Two backends, picked by [`create_measurements`] from the
//! `measurementtype` property:
//! - `basic`: lock-free count / min / max / average
//! - `hdrhistogram`: full latency histograms with percentiles
//!
//! Latencies are recorded in nanoseconds and printed in microseconds.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use crossbeam::utils::CachePadded;
use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::config::{Properties, PROP_MEASUREMENT_TYPE};
use crate::db::{Db, Status};
use crate::error::{BTreeDbError, Result};
use crate::row::{Field, Row};

/// Operation kinds, successful and failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Read,
    Update,
    Scan,
    ReadModifyWrite,
    Delete,
    InsertFailed,
    ReadFailed,
    UpdateFailed,
    ScanFailed,
    ReadModifyWriteFailed,
    DeleteFailed,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::Insert,
        Operation::Read,
        Operation::Update,
        Operation::Scan,
        Operation::ReadModifyWrite,
        Operation::Delete,
        Operation::InsertFailed,
        Operation::ReadFailed,
        Operation::UpdateFailed,
        Operation::ScanFailed,
        Operation::ReadModifyWriteFailed,
        Operation::DeleteFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Scan => "SCAN",
            Operation::ReadModifyWrite => "READMODIFYWRITE",
            Operation::Delete => "DELETE",
            Operation::InsertFailed => "INSERT-FAILED",
            Operation::ReadFailed => "READ-FAILED",
            Operation::UpdateFailed => "UPDATE-FAILED",
            Operation::ScanFailed => "SCAN-FAILED",
            Operation::ReadModifyWriteFailed => "READMODIFYWRITE-FAILED",
            Operation::DeleteFailed => "DELETE-FAILED",
        }
    }

    /// The kind a call of this operation is counted under: anything but
    /// `Status::Ok` (a read miss included) counts as failed
    pub fn with_status(self, status: Status) -> Operation {
        if status.is_ok() {
            self
        } else {
            self.failed()
        }
    }

    /// The `*Failed` counterpart of a successful kind
    pub fn failed(self) -> Operation {
        match self {
            Operation::Insert => Operation::InsertFailed,
            Operation::Read => Operation::ReadFailed,
            Operation::Update => Operation::UpdateFailed,
            Operation::Scan => Operation::ScanFailed,
            Operation::ReadModifyWrite => Operation::ReadModifyWriteFailed,
            Operation::Delete => Operation::DeleteFailed,
            failed => failed,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Sink for per-operation latencies
pub trait Measurements: Send + Sync {
    /// Record one call of `op` that took `latency_ns`
    fn report(&self, op: Operation, latency_ns: u64);

    /// One-line summary of everything recorded so far
    fn status_msg(&self) -> String;

    fn reset(&self);
}

#[derive(Debug)]
struct OpStats {
    count: AtomicU64,
    latency_sum: AtomicU64,
    latency_min: AtomicU64,
    latency_max: AtomicU64,
}

impl OpStats {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            latency_sum: AtomicU64::new(0),
            latency_min: AtomicU64::new(u64::MAX),
            latency_max: AtomicU64::new(0),
        }
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
        self.latency_sum.store(0, Ordering::Relaxed);
        self.latency_min.store(u64::MAX, Ordering::Relaxed);
        self.latency_max.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of one operation's counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpSummary {
    pub count: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    pub avg_ns: f64,
}

/// Lock-free count / sum / min / max per operation kind
#[derive(Debug)]
pub struct BasicMeasurements {
    stats: Vec<CachePadded<OpStats>>,
}

impl BasicMeasurements {
    pub fn new() -> Self {
        Self {
            stats: Operation::ALL
                .iter()
                .map(|_| CachePadded::new(OpStats::new()))
                .collect(),
        }
    }

    pub fn count(&self, op: Operation) -> u64 {
        self.stats[op.index()].count.load(Ordering::Relaxed)
    }

    /// Counters of `op`, or `None` if it was never reported
    pub fn summary(&self, op: Operation) -> Option<OpSummary> {
        let stats = &self.stats[op.index()];
        let count = stats.count.load(Ordering::Relaxed);
        if count == 0 {
            return None;
        }
        Some(OpSummary {
            count,
            min_ns: stats.latency_min.load(Ordering::Relaxed),
            max_ns: stats.latency_max.load(Ordering::Relaxed),
            avg_ns: stats.latency_sum.load(Ordering::Relaxed) as f64 / count as f64,
        })
    }
}

impl Default for BasicMeasurements {
    fn default() -> Self {
        Self::new()
    }
}

impl Measurements for BasicMeasurements {
    fn report(&self, op: Operation, latency_ns: u64) {
        let stats = &self.stats[op.index()];
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats.latency_sum.fetch_add(latency_ns, Ordering::Relaxed);
        stats.latency_min.fetch_min(latency_ns, Ordering::Relaxed);
        stats.latency_max.fetch_max(latency_ns, Ordering::Relaxed);
    }

    /// `<total> operations; [READ: Count=.. Max=.. Min=.. Avg=..] ...`
    fn status_msg(&self) -> String {
        let mut total = 0;
        let mut msg = String::from(" operations;");
        for op in Operation::ALL {
            let Some(s) = self.summary(op) else {
                continue;
            };
            let _ = write!(
                msg,
                " [{}: Count={} Max={:.2} Min={:.2} Avg={:.2}]",
                op.as_str(),
                s.count,
                s.max_ns as f64 / 1000.0,
                s.min_ns as f64 / 1000.0,
                s.avg_ns / 1000.0
            );
            total += s.count;
        }
        format!("{}{}", total, msg)
    }

    fn reset(&self) {
        for stats in &self.stats {
            stats.reset();
        }
    }
}

// =============================================================================
// Histograms
// =============================================================================

/// Highest latency a histogram tracks (one hour); longer calls saturate
const MAX_TRACKABLE_NS: u64 = 3_600_000_000_000;

/// Percentiles printed by [`HdrHistogramMeasurements::status_msg`]
const REPORTED_PERCENTILES: [(&str, f64); 4] =
    [("90", 0.90), ("99", 0.99), ("99.9", 0.999), ("99.99", 0.9999)];

/// One latency histogram per operation kind
pub struct HdrHistogramMeasurements {
    histograms: Vec<Mutex<Histogram<u64>>>,
}

impl HdrHistogramMeasurements {
    pub fn new() -> Result<Self> {
        let histograms = Operation::ALL
            .iter()
            .map(|_| {
                Histogram::<u64>::new_with_bounds(1, MAX_TRACKABLE_NS, 3)
                    .map(Mutex::new)
                    .map_err(|e| BTreeDbError::Config(format!("latency histogram: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { histograms })
    }

    pub fn count(&self, op: Operation) -> u64 {
        self.histograms[op.index()].lock().len()
    }

    /// Latency at quantile `q` (0.0 to 1.0), or `None` if `op` was never
    /// reported
    pub fn value_at_quantile(&self, op: Operation, q: f64) -> Option<u64> {
        let histogram = self.histograms[op.index()].lock();
        if histogram.is_empty() {
            return None;
        }
        Some(histogram.value_at_quantile(q))
    }
}

impl Measurements for HdrHistogramMeasurements {
    fn report(&self, op: Operation, latency_ns: u64) {
        self.histograms[op.index()]
            .lock()
            .saturating_record(latency_ns);
    }

    /// Like the basic summary, plus `90= 99= 99.9= 99.99=` percentiles
    fn status_msg(&self) -> String {
        let mut total = 0;
        let mut msg = String::from(" operations;");
        for op in Operation::ALL {
            let histogram = self.histograms[op.index()].lock();
            if histogram.is_empty() {
                continue;
            }
            let _ = write!(
                msg,
                " [{}: Count={} Max={:.2} Min={:.2} Avg={:.2}",
                op.as_str(),
                histogram.len(),
                histogram.max() as f64 / 1000.0,
                histogram.min() as f64 / 1000.0,
                histogram.mean() / 1000.0
            );
            for (label, q) in REPORTED_PERCENTILES {
                let _ = write!(
                    msg,
                    " {}={:.2}",
                    label,
                    histogram.value_at_quantile(q) as f64 / 1000.0
                );
            }
            msg.push(']');
            total += histogram.len();
        }
        format!("{}{}", total, msg)
    }

    fn reset(&self) {
        for histogram in &self.histograms {
            histogram.lock().reset();
        }
    }
}

/// Build the backend named by the `measurementtype` property (default
/// `basic`)
pub fn create_measurements(props: &Properties) -> Result<Arc<dyn Measurements>> {
    match props.get_or(PROP_MEASUREMENT_TYPE, "basic") {
        "basic" => Ok(Arc::new(BasicMeasurements::new())),
        "hdrhistogram" => Ok(Arc::new(HdrHistogramMeasurements::new()?)),
        other => Err(BTreeDbError::Config(format!(
            "unknown {}: {:?}",
            PROP_MEASUREMENT_TYPE, other
        ))),
    }
}

// =============================================================================
// Timing Wrapper
// =============================================================================

/// Times every call of the wrapped [`Db`] and reports it
pub struct MeasuredDb {
    inner: Box<dyn Db>,
    measurements: Arc<dyn Measurements>,
}

impl MeasuredDb {
    pub fn new(inner: Box<dyn Db>, measurements: Arc<dyn Measurements>) -> Self {
        Self {
            inner,
            measurements,
        }
    }

    fn record(&self, op: Operation, status: Status, started: Instant) {
        let latency = started.elapsed().as_nanos().min(u64::MAX as u128) as u64;
        self.measurements.report(op.with_status(status), latency);
    }
}

impl Db for MeasuredDb {
    fn read(&self, table: &str, key: &str, fields: Option<&[Bytes]>) -> Result<Option<Row>> {
        let started = Instant::now();
        let result = self.inner.read(table, key, fields);
        self.record(Operation::Read, Status::of_lookup(&result), started);
        result
    }

    fn scan(
        &self,
        table: &str,
        start_key: &str,
        count: usize,
        fields: Option<&[Bytes]>,
    ) -> Result<Vec<Row>> {
        let started = Instant::now();
        let result = self.inner.scan(table, start_key, count, fields);
        self.record(Operation::Scan, Status::of(&result), started);
        result
    }

    fn update(&self, table: &str, key: &str, values: &[Field]) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.update(table, key, values);
        self.record(Operation::Update, Status::of(&result), started);
        result
    }

    fn insert(&self, table: &str, key: &str, values: &[Field]) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.insert(table, key, values);
        self.record(Operation::Insert, Status::of(&result), started);
        result
    }

    fn delete(&self, table: &str, key: &str) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.delete(table, key);
        self.record(Operation::Delete, Status::of(&result), started);
        result
    }

    fn cleanup(self: Box<Self>) -> Result<()> {
        self.inner.cleanup()
    }
}
