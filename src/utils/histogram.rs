//! Histogram used to tally how many reads carry a given number of mutations.
//!
//! # Overview
//!
//! Bins are the discrete values `[0, 1, 2, ..., n]`, where `n` is the capacity
//! given to the constructor. Zero is always a bin: for mutation counts it is
//! usually the largest one.
//!
//! ```
//! use maple::utils::histogram::Histogram;
//! let mut hist = Histogram::zero_based_with_capacity(10);
//!
//! // One read without substitutions, forty-two with a single one.
//! hist.increment(0).unwrap();
//! hist.increment_by(1, 42).unwrap();
//!
//! assert_eq!(hist.get(0), 1);
//! assert_eq!(hist.get(1), 42);
//! assert_eq!(hist.sum(), 43);
//! ```
//!
//! Incrementing a bin outside of the range is an error:
//!
//! ```
//! use maple::utils::histogram::BinOutOfBoundsError;
//! use maple::utils::histogram::Histogram;
//! let mut hist = Histogram::zero_based_with_capacity(10);
//!
//! assert_eq!(hist.increment(11).unwrap_err(), BinOutOfBoundsError(11));
//! assert!(hist.in_range(10));
//! ```

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// A zero-based histogram over discrete bins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    // Vec-backed value store for the histogram.
    values: Vec<usize>,
    // Ending range for the histogram.
    range_stop: usize,
}

/// An attempt to increment a bin outside of the histogram's range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("bin {0} is out of bounds for the histogram")]
pub struct BinOutOfBoundsError(pub usize);

impl Histogram {
    /// Creates a zero-based histogram with bins `0..=capacity`.
    pub fn zero_based_with_capacity(capacity: usize) -> Self {
        Self {
            values: vec![0; capacity + 1],
            range_stop: capacity,
        }
    }

    /// Increments a particular bin in the histogram by one.
    pub fn increment(&mut self, bin: usize) -> Result<(), BinOutOfBoundsError> {
        self.increment_by(bin, 1)
    }

    /// Increments a particular bin in the histogram by the specified value.
    pub fn increment_by(&mut self, bin: usize, value: usize) -> Result<(), BinOutOfBoundsError> {
        match self.values.get_mut(bin) {
            Some(count) => {
                *count += value;
                Ok(())
            }
            None => Err(BinOutOfBoundsError(bin)),
        }
    }

    /// Gets the value of a bin, or zero for bins outside of the range.
    pub fn get(&self, bin: usize) -> usize {
        self.values.get(bin).copied().unwrap_or(0)
    }

    /// The values of every bin, in order.
    pub fn values(&self) -> &[usize] {
        self.values.as_ref()
    }

    /// The largest bin.
    pub fn range_stop(&self) -> usize {
        self.range_stop
    }

    /// Indicates whether a particular value falls within the range of the histogram.
    pub fn in_range(&self, value: usize) -> bool {
        value <= self.range_stop
    }

    /// Computes the sum of the values within the distribution.
    pub fn sum(&self) -> usize {
        self.values.iter().sum()
    }

    /// Computes the mean bin, weighted by count. Empty histograms have a mean
    /// of zero.
    pub fn mean(&self) -> f64 {
        let total = self.sum();
        if total == 0 {
            return 0.0;
        }

        let weighted: usize = self.values.iter().enumerate().map(|(i, v)| i * v).sum();
        weighted as f64 / total as f64
    }
}
